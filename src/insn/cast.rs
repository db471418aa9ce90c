//! Numeric coercions, checked reference casts, and box/unbox lowering.
//!
//! Numeric casts follow a fixed pairwise table. Narrowing to a sub-int kind
//! goes through int first when the source is wide (`l2i` + `i2b` and so on),
//! matching what javac emits for the same source-level cast.

use crate::error::{Error, Result};
use crate::method::MethodCx;
use crate::types::{Primitive, Type};
use ristretto_classfile::attributes::Instruction;

pub(crate) fn lower_cast(cx: &mut MethodCx, to: &Type) -> Result<()> {
    let from = cx.frame.pop()?;
    if from == *to {
        return cx.frame.push(from);
    }
    match (from.primitive(), to.primitive()) {
        (Some(src), Some(dst)) => {
            for instruction in numeric_steps(&from, src, to, dst)? {
                cx.sink.push(instruction);
            }
            cx.frame.push(to.clone())
        }
        (None, None) => {
            let name = checked_name(to)?;
            let index = cx.sink.class_ref(&name)?;
            cx.sink.push(Instruction::Checkcast(index));
            cx.frame.push(to.clone())
        }
        (Some(_), None) => Err(Error::IllegalCoercion {
            from,
            to: to.clone(),
            reason: "primitive to reference requires boxing".to_string(),
        }),
        (None, Some(_)) => Err(Error::IllegalCoercion {
            from,
            to: to.clone(),
            reason: "reference to primitive requires unboxing".to_string(),
        }),
    }
}

fn numeric_steps(
    from: &Type,
    src: Primitive,
    to: &Type,
    dst: Primitive,
) -> Result<Vec<Instruction>> {
    use Instruction::*;
    let illegal = |reason: &str| Error::IllegalCoercion {
        from: from.clone(),
        to: to.clone(),
        reason: reason.to_string(),
    };
    if src == Primitive::Void || dst == Primitive::Void {
        return Err(illegal("void has no value"));
    }
    if src == Primitive::Boolean || dst == Primitive::Boolean {
        return Err(illegal("boolean does not convert numerically"));
    }

    let narrow = |p: Primitive| -> Option<Instruction> {
        match p {
            Primitive::I8 => Some(I2b),
            Primitive::I16 => Some(I2s),
            Primitive::Char => Some(I2c),
            _ => None,
        }
    };

    let steps = if src.is_int_like() {
        match dst {
            Primitive::I64 => vec![I2l],
            Primitive::F32 => vec![I2f],
            Primitive::F64 => vec![I2d],
            Primitive::I32 => vec![],
            other => match narrow(other) {
                Some(step) => vec![step],
                None => return Err(illegal("no conversion")),
            },
        }
    } else {
        let (to_int, widenings): (Instruction, [(Primitive, Instruction); 3]) = match src {
            Primitive::I64 => (L2i, [(Primitive::I64, Nop), (Primitive::F32, L2f), (Primitive::F64, L2d)]),
            Primitive::F32 => (F2i, [(Primitive::I64, F2l), (Primitive::F32, Nop), (Primitive::F64, F2d)]),
            Primitive::F64 => (D2i, [(Primitive::I64, D2l), (Primitive::F32, D2f), (Primitive::F64, Nop)]),
            _ => return Err(illegal("no conversion")),
        };
        if dst.is_int_like() {
            let mut steps = vec![to_int];
            if let Some(step) = narrow(dst) {
                steps.push(step);
            }
            steps
        } else {
            match widenings.iter().find(|(p, _)| *p == dst) {
                Some((_, step)) => vec![step.clone()],
                None => return Err(illegal("no conversion")),
            }
        }
    };
    Ok(steps)
}

fn checked_name(to: &Type) -> Result<String> {
    to.erasure()
        .internal_or_descriptor()
        .ok_or_else(|| Error::UnrepresentableType {
            ty: to.clone(),
            context: "checked cast".to_string(),
        })
}

pub(crate) fn lower_check_cast(cx: &mut MethodCx, to: &Type) -> Result<()> {
    let from = cx.frame.pop()?;
    if !from.is_reference() {
        return Err(Error::IllegalCoercion {
            from,
            to: to.clone(),
            reason: "checkcast applies to references".to_string(),
        });
    }
    let name = checked_name(to)?;
    let index = cx.sink.class_ref(&name)?;
    cx.sink.push(Instruction::Checkcast(index));
    cx.frame.push(to.clone())
}

/// Boxes the primitive on top of the stack with the wrapper's `valueOf`.
pub(crate) fn lower_box(cx: &mut MethodCx) -> Result<()> {
    let value = cx.frame.pop()?;
    let primitive = match value.primitive() {
        Some(p) if p != Primitive::Void => p,
        _ => {
            return Err(Error::IllegalCoercion {
                from: value,
                to: Type::object(),
                reason: "only primitives box".to_string(),
            });
        }
    };
    let (wrapper, descriptor) = match (primitive.wrapper_class(), primitive.value_of_descriptor())
    {
        (Some(w), Some(d)) => (w, d),
        _ => {
            return Err(Error::IllegalCoercion {
                from: value,
                to: Type::object(),
                reason: "no wrapper class".to_string(),
            });
        }
    };
    let index = cx.sink.method_ref(wrapper, "valueOf", &descriptor)?;
    cx.sink.push(Instruction::Invokestatic(index));
    cx.frame.push(Type::class(wrapper))
}

/// Unboxes the wrapper on top of the stack with its value accessor
/// (`intValue`, `doubleValue`, ...).
pub(crate) fn lower_unbox(cx: &mut MethodCx) -> Result<()> {
    let value = cx.frame.pop()?;
    let primitive = match value.unboxed_primitive() {
        Some(p) => p,
        None => {
            return Err(Error::IllegalCoercion {
                from: value.clone(),
                to: value,
                reason: "not a wrapper type".to_string(),
            });
        }
    };
    let (wrapper, (method, descriptor)) =
        match (primitive.wrapper_class(), primitive.value_method()) {
            (Some(w), Some(m)) => (w, m),
            _ => {
                return Err(Error::IllegalCoercion {
                    from: value.clone(),
                    to: value,
                    reason: "no value accessor".to_string(),
                });
            }
        };
    let index = cx.sink.method_ref(wrapper, method, &descriptor)?;
    cx.sink.push(Instruction::Invokevirtual(index));
    cx.frame.push(Type::Primitive(primitive))
}
