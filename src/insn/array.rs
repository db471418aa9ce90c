//! Array allocation and element access.
//!
//! Element opcodes are selected from the array type sitting on the tracked
//! stack, so callers never name the component twice.

use crate::error::{Error, Result};
use crate::method::MethodCx;
use crate::types::{I32, Type};
use ristretto_classfile::attributes::Instruction;

pub(crate) fn lower_new_array(cx: &mut MethodCx, component: &Type) -> Result<()> {
    let length = cx.frame.pop()?;
    if !matches!(length.primitive(), Some(p) if p.is_int_like()) {
        return Err(Error::StackMismatch {
            context: "array length".to_string(),
            expected: vec![I32],
            found: vec![length],
        });
    }
    cx.sink.new_array(component)?;
    cx.frame.push(component.array_of(1))
}

fn array_component(context: &str, array: &Type) -> Result<Type> {
    array.component().ok_or_else(|| Error::StackMismatch {
        context: context.to_string(),
        expected: vec![Type::object().array_of(1)],
        found: vec![array.clone()],
    })
}

pub(crate) fn lower_array_load(cx: &mut MethodCx) -> Result<()> {
    cx.frame.require("array load", 2)?;
    let index = cx.frame.pop()?;
    if !matches!(index.primitive(), Some(p) if p.is_int_like()) {
        return Err(Error::StackMismatch {
            context: "array index".to_string(),
            expected: vec![I32],
            found: vec![index],
        });
    }
    let array = cx.frame.pop()?;
    let component = array_component("array load", &array)?;
    cx.sink.array_load(&component)?;
    cx.frame.push(component)
}

pub(crate) fn lower_array_store(cx: &mut MethodCx) -> Result<()> {
    cx.frame.require("array store", 3)?;
    cx.frame.pop()?;
    let index = cx.frame.pop()?;
    if !matches!(index.primitive(), Some(p) if p.is_int_like()) {
        return Err(Error::StackMismatch {
            context: "array index".to_string(),
            expected: vec![I32],
            found: vec![index],
        });
    }
    let array = cx.frame.pop()?;
    let component = array_component("array store", &array)?;
    cx.sink.array_store(&component)
}

pub(crate) fn lower_array_length(cx: &mut MethodCx) -> Result<()> {
    let array = cx.frame.pop()?;
    if !array.is_array() {
        return Err(Error::StackMismatch {
            context: "array length".to_string(),
            expected: vec![Type::object().array_of(1)],
            found: vec![array],
        });
    }
    cx.sink.push(Instruction::Arraylength);
    cx.frame.push(I32)
}
