//! Erased-signature bridge methods.
//!
//! A bridge takes the erased signature a supertype declares, adapts every
//! argument to the implementation's types (checked casts, box/unbox, numeric
//! widening), forwards through one virtual call, adapts the result back, and
//! returns.

use crate::error::{Error, Result};
use crate::frame::Local;
use crate::insn::{Insn, MethodRef};
use crate::model::{ClassDef, MethodDef};
use crate::types::{Signature, Type, VOID};

/// Synthesizes the bridge for `method` with the erased signature `target`.
/// The implementation is located by name on the class and must be unique.
pub fn synthesize_bridge(
    def: &ClassDef,
    method: &str,
    target: &Signature,
) -> Result<(MethodDef, Vec<Insn>)> {
    let implementation = def.find_override_target(method)?;
    if target.params.len() != implementation.signature.params.len() {
        return Err(Error::OverrideArityMismatch {
            method: method.to_string(),
            target: target.params.len(),
            implementation: implementation.signature.params.len(),
        });
    }

    let mut body = vec![Insn::Load(Local::at(0))];
    for (i, (from, to)) in target
        .params
        .iter()
        .zip(&implementation.signature.params)
        .enumerate()
    {
        body.push(Insn::Load(Local::at(i + 1)));
        body.extend(adapt(from, to)?);
    }
    body.push(Insn::Invoke(MethodRef::virtual_(
        def.self_type(),
        method,
        implementation.signature.clone(),
    )));
    body.extend(adapt_return(&implementation.signature.ret, &target.ret)?);
    body.push(Insn::Ret);

    let shape = MethodDef {
        name: method.to_string(),
        signature: target.clone(),
        is_static: false,
        is_bridge: true,
    };
    Ok((shape, body))
}

/// Instructions converting a stack value of type `from` into `to`.
fn adapt(from: &Type, to: &Type) -> Result<Vec<Insn>> {
    if from == to {
        return Ok(vec![]);
    }
    Ok(match (from.primitive(), to.primitive()) {
        (None, Some(p)) => {
            let wrapper = p
                .wrapper_class()
                .ok_or_else(|| Error::IllegalCoercion {
                    from: from.clone(),
                    to: to.clone(),
                    reason: "no wrapper type".to_string(),
                })?;
            vec![Insn::CheckCast(Type::class(wrapper)), Insn::Unbox]
        }
        (Some(_), None) => vec![Insn::Box_],
        _ => vec![Insn::Cast(to.clone())],
    })
}

fn adapt_return(from: &Type, to: &Type) -> Result<Vec<Insn>> {
    if *to == VOID {
        if *from == VOID {
            return Ok(vec![]);
        }
        return Ok(vec![Insn::Pop]);
    }
    adapt(from, to)
}
