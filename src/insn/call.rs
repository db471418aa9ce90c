//! Field access, method invocation, allocation, and type tests.

use crate::error::{Error, Result};
use crate::insn::{FieldRef, Insn, InvokeKind, MethodRef};
use crate::method::MethodCx;
use crate::types::{BOOLEAN, Signature, Type, VOID};
use ristretto_classfile::attributes::Instruction;

pub(crate) fn lower_get_field(cx: &mut MethodCx, field: &FieldRef) -> Result<()> {
    let receiver = cx.frame.pop()?;
    if !receiver.is_reference() {
        return Err(Error::UnrepresentableType {
            ty: receiver,
            context: "field receiver".to_string(),
        });
    }
    let index = field_index(cx, field)?;
    cx.sink.push(Instruction::Getfield(index));
    cx.frame.push(field.ty.clone())
}

pub(crate) fn lower_put_field(cx: &mut MethodCx, field: &FieldRef) -> Result<()> {
    cx.frame.require("field store", 2)?;
    cx.frame.pop()?;
    let receiver = cx.frame.pop()?;
    if !receiver.is_reference() {
        return Err(Error::UnrepresentableType {
            ty: receiver,
            context: "field receiver".to_string(),
        });
    }
    let index = field_index(cx, field)?;
    cx.sink.push(Instruction::Putfield(index));
    Ok(())
}

pub(crate) fn lower_get_static(cx: &mut MethodCx, field: &FieldRef) -> Result<()> {
    let index = field_index(cx, field)?;
    cx.sink.push(Instruction::Getstatic(index));
    cx.frame.push(field.ty.clone())
}

pub(crate) fn lower_put_static(cx: &mut MethodCx, field: &FieldRef) -> Result<()> {
    cx.frame.pop()?;
    let index = field_index(cx, field)?;
    cx.sink.push(Instruction::Putstatic(index));
    Ok(())
}

fn field_index(cx: &mut MethodCx, field: &FieldRef) -> Result<u16> {
    let owner = field.owner_name()?;
    cx.sink.field_ref(&owner, &field.name, &field.ty.descriptor())
}

pub(crate) fn lower_invoke(cx: &mut MethodCx, method: &MethodRef) -> Result<()> {
    let arg_count = method.signature.params.len();
    let popped = if method.kind == InvokeKind::Static {
        arg_count
    } else {
        arg_count + 1
    };
    cx.frame.require("invocation", popped)?;
    for _ in 0..popped {
        cx.frame.pop()?;
    }

    let owner = method.owner_name()?;
    let descriptor = method.signature.to_string();
    let instruction = match method.kind {
        InvokeKind::Virtual => {
            let index = cx.sink.method_ref(&owner, &method.name, &descriptor)?;
            Instruction::Invokevirtual(index)
        }
        InvokeKind::Static => {
            let index = cx.sink.method_ref(&owner, &method.name, &descriptor)?;
            Instruction::Invokestatic(index)
        }
        InvokeKind::Special => {
            let index = cx.sink.method_ref(&owner, &method.name, &descriptor)?;
            Instruction::Invokespecial(index)
        }
        InvokeKind::Interface => {
            let index = cx.sink.interface_method_ref(&owner, &method.name, &descriptor)?;
            // Count operand covers the receiver plus every argument slot.
            Instruction::Invokeinterface(index, (method.signature.param_slots() + 1) as u8)
        }
    };
    cx.sink.push(instruction);

    if method.signature.ret != VOID {
        cx.frame.push(method.signature.ret.clone())?;
    }
    Ok(())
}

/// `new` / `dup` / argument evaluation / `invokespecial <init>`, leaving the
/// constructed reference on the stack.
pub(crate) fn lower_new(
    cx: &mut MethodCx,
    class: &Type,
    ctor: &Signature,
    args: &[Insn],
) -> Result<()> {
    if ctor.ret != VOID {
        return Err(Error::UnrepresentableType {
            ty: ctor.ret.clone(),
            context: "constructor return".to_string(),
        });
    }
    let name = class
        .internal_or_descriptor()
        .ok_or_else(|| Error::UnrepresentableType {
            ty: class.clone(),
            context: "allocation".to_string(),
        })?;
    let class_index = cx.sink.class_ref(&name)?;
    cx.sink.push(Instruction::New(class_index));
    cx.sink.push(Instruction::Dup);
    cx.frame.push(class.clone())?;
    cx.frame.push(class.clone())?;

    cx.compile_all(args)?;

    cx.frame.require("constructor call", ctor.params.len() + 1)?;
    for _ in 0..=ctor.params.len() {
        cx.frame.pop()?;
    }
    let index = cx.sink.method_ref(&name, "<init>", &ctor.to_string())?;
    cx.sink.push(Instruction::Invokespecial(index));
    Ok(())
}

pub(crate) fn lower_instance_of(cx: &mut MethodCx, of: &Type) -> Result<()> {
    let value = cx.frame.pop()?;
    if !value.is_reference() {
        return Err(Error::UnrepresentableType {
            ty: value,
            context: "instanceof".to_string(),
        });
    }
    let name = of
        .erasure()
        .internal_or_descriptor()
        .ok_or_else(|| Error::UnrepresentableType {
            ty: of.clone(),
            context: "instanceof".to_string(),
        })?;
    let index = cx.sink.class_ref(&name)?;
    cx.sink.push(Instruction::Instanceof(index));
    cx.frame.push(BOOLEAN)
}
