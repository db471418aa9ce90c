//! Structural `toString` bodies built on a `StringBuilder` append chain.
//!
//! Output shape: `Name(a=1, b="x", c=[1, 2])`. String fields are rendered
//! quoted, arrays through `Arrays.toString`/`deepToString`, and a selection
//! folding the superclass in gets a trailing `@super=` segment rendered by
//! the parent's `toString`.

use crate::error::Result;
use crate::frame::Local;
use crate::insn::{Insn, MethodRef, Value};
use crate::model::{ClassDef, FieldDef, MethodDef};
use crate::synth::{FieldSelection, arrays_unary, load_own_field};
use crate::types::{Primitive, Signature, Type};

const BUILDER: &str = "java/lang/StringBuilder";

pub fn synthesize_to_string(
    def: &ClassDef,
    selection: &FieldSelection,
) -> Result<(MethodDef, Vec<Insn>)> {
    let shape = MethodDef {
        name: "toString".to_string(),
        signature: Signature::new(vec![], Type::string()),
        is_static: false,
        is_bridge: false,
    };

    let fields = selection.pick(def)?;
    let simple_name = def.name.rsplit('/').next().unwrap_or(&def.name);
    let mut body = vec![Insn::New {
        class: Type::class(BUILDER),
        ctor: Signature::new(vec![], crate::types::VOID),
        args: vec![],
    }];

    let mut first = true;
    for field in &fields {
        let prefix = if first {
            format!("{simple_name}({}=", field.name)
        } else {
            format!(", {}=", field.name)
        };
        first = false;
        body.extend(append_literal(&prefix));
        body.extend(append_field(def, field));
    }
    if first {
        body.extend(append_literal(&format!("{simple_name}(")));
    }

    if selection.include_super() {
        let prefix = if fields.is_empty() { "@super=" } else { ", @super=" };
        body.extend(append_literal(prefix));
        body.push(Insn::Load(Local::at(0)));
        body.push(Insn::Invoke(MethodRef::special(
            Type::class(&def.super_class),
            "toString",
            Signature::new(vec![], Type::string()),
        )));
        body.push(Insn::Invoke(append_of(Type::string())));
    }

    body.extend(append_literal(")"));
    body.push(Insn::Invoke(MethodRef::virtual_(
        Type::class(BUILDER),
        "toString",
        Signature::new(vec![], Type::string()),
    )));
    body.push(Insn::Ret);
    Ok((shape, body))
}

fn append_literal(text: &str) -> Vec<Insn> {
    vec![
        Insn::Const(Value::Str(text.to_string())),
        Insn::Invoke(append_of(Type::string())),
    ]
}

/// Pushes and appends one field's rendering; the builder stays on the stack.
fn append_field(def: &ClassDef, field: &FieldDef) -> Vec<Insn> {
    let mut insns = Vec::new();
    if field.ty == Type::string() {
        insns.extend(append_literal("\""));
        insns.extend(load_own_field(def, field));
        insns.push(Insn::Invoke(append_of(Type::string())));
        insns.extend(append_literal("\""));
        return insns;
    }

    insns.extend(load_own_field(def, field));
    if field.ty.is_array() {
        insns.push(Insn::Invoke(arrays_unary(
            &field.ty,
            "toString",
            "deepToString",
            Type::string(),
        )));
        insns.push(Insn::Invoke(append_of(Type::string())));
    } else {
        insns.push(Insn::Invoke(append_of(append_param(&field.ty))));
    }
    insns
}

/// The `StringBuilder.append` overload parameter for a value type: exact for
/// the kinds the class overloads on, `int` for the narrow ints, `Object`
/// for every other reference.
fn append_param(ty: &Type) -> Type {
    match ty.primitive() {
        Some(Primitive::Boolean) => crate::types::BOOLEAN,
        Some(Primitive::Char) => crate::types::CHAR,
        Some(Primitive::I64) => crate::types::I64,
        Some(Primitive::F32) => crate::types::F32,
        Some(Primitive::F64) => crate::types::F64,
        Some(_) => crate::types::I32,
        None => Type::object(),
    }
}

fn append_of(param: Type) -> MethodRef {
    MethodRef::virtual_(
        Type::class(BUILDER),
        "append",
        Signature::new(vec![param], Type::class(BUILDER)),
    )
}
