//! Arithmetic, bitwise, shift, and three-way comparison lowering.
//!
//! Operand checks are strict: both entries of a binary operation must carry
//! the same type, and the opcode family is selected by that type alone.
//! Narrow int kinds compute with the int opcodes and keep their kind marker
//! on the stack.

use crate::error::{Error, Result};
use crate::method::MethodCx;
use crate::types::{I32, Primitive, Type};
use ristretto_classfile::attributes::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    /// Three-way comparison of two wide-numeric operands; pushes an int.
    Cmp,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Rem => "rem",
            ArithOp::Neg => "neg",
            ArithOp::And => "and",
            ArithOp::Or => "or",
            ArithOp::Xor => "xor",
            ArithOp::Shl => "shl",
            ArithOp::Shr => "shr",
            ArithOp::Ushr => "ushr",
            ArithOp::Cmp => "cmp",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NumKind {
    Int,
    Long,
    Float,
    Double,
}

fn num_kind(op: ArithOp, ty: &Type) -> Result<NumKind> {
    match ty.primitive() {
        Some(p) if p.is_int_like() => Ok(NumKind::Int),
        Some(Primitive::I64) => Ok(NumKind::Long),
        Some(Primitive::F32) => Ok(NumKind::Float),
        Some(Primitive::F64) => Ok(NumKind::Double),
        _ => Err(Error::UnrepresentableType {
            ty: ty.clone(),
            context: op.name().to_string(),
        }),
    }
}

pub(crate) fn lower(cx: &mut MethodCx, op: ArithOp) -> Result<()> {
    match op {
        ArithOp::Neg => lower_neg(cx),
        ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr => lower_shift(cx, op),
        ArithOp::Cmp => lower_cmp(cx),
        _ => lower_binary(cx, op),
    }
}

fn lower_binary(cx: &mut MethodCx, op: ArithOp) -> Result<()> {
    cx.frame.require(op.name(), 2)?;
    let rhs = cx.frame.pop()?;
    let lhs = cx.frame.pop()?;
    if lhs != rhs {
        return Err(Error::StackMismatch {
            context: op.name().to_string(),
            expected: vec![lhs.clone(), lhs],
            found: vec![rhs.clone(), rhs],
        });
    }
    let kind = num_kind(op, &lhs)?;
    let instruction = match op {
        ArithOp::Add => match kind {
            NumKind::Int => Instruction::Iadd,
            NumKind::Long => Instruction::Ladd,
            NumKind::Float => Instruction::Fadd,
            NumKind::Double => Instruction::Dadd,
        },
        ArithOp::Sub => match kind {
            NumKind::Int => Instruction::Isub,
            NumKind::Long => Instruction::Lsub,
            NumKind::Float => Instruction::Fsub,
            NumKind::Double => Instruction::Dsub,
        },
        ArithOp::Mul => match kind {
            NumKind::Int => Instruction::Imul,
            NumKind::Long => Instruction::Lmul,
            NumKind::Float => Instruction::Fmul,
            NumKind::Double => Instruction::Dmul,
        },
        ArithOp::Div => match kind {
            NumKind::Int => Instruction::Idiv,
            NumKind::Long => Instruction::Ldiv,
            NumKind::Float => Instruction::Fdiv,
            NumKind::Double => Instruction::Ddiv,
        },
        ArithOp::Rem => match kind {
            NumKind::Int => Instruction::Irem,
            NumKind::Long => Instruction::Lrem,
            NumKind::Float => Instruction::Frem,
            NumKind::Double => Instruction::Drem,
        },
        ArithOp::And => match kind {
            NumKind::Int => Instruction::Iand,
            NumKind::Long => Instruction::Land,
            _ => {
                return Err(Error::UnrepresentableType {
                    ty: lhs,
                    context: op.name().to_string(),
                });
            }
        },
        ArithOp::Or => match kind {
            NumKind::Int => Instruction::Ior,
            NumKind::Long => Instruction::Lor,
            _ => {
                return Err(Error::UnrepresentableType {
                    ty: lhs,
                    context: op.name().to_string(),
                });
            }
        },
        ArithOp::Xor => match kind {
            NumKind::Int => Instruction::Ixor,
            NumKind::Long => Instruction::Lxor,
            _ => {
                return Err(Error::UnrepresentableType {
                    ty: lhs,
                    context: op.name().to_string(),
                });
            }
        },
        ArithOp::Neg | ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr | ArithOp::Cmp => {
            unreachable!("dispatched separately")
        }
    };
    cx.sink.push(instruction);
    cx.frame.push(lhs)
}

fn lower_neg(cx: &mut MethodCx) -> Result<()> {
    let value = cx.frame.pop()?;
    let instruction = match num_kind(ArithOp::Neg, &value)? {
        NumKind::Int => Instruction::Ineg,
        NumKind::Long => Instruction::Lneg,
        NumKind::Float => Instruction::Fneg,
        NumKind::Double => Instruction::Dneg,
    };
    cx.sink.push(instruction);
    cx.frame.push(value)
}

/// Shift amount is always an int on top of the stack; the result keeps the
/// shifted value's type.
fn lower_shift(cx: &mut MethodCx, op: ArithOp) -> Result<()> {
    cx.frame.require(op.name(), 2)?;
    let amount = cx.frame.pop()?;
    if num_kind(op, &amount)? != NumKind::Int {
        return Err(Error::StackMismatch {
            context: op.name().to_string(),
            expected: vec![I32],
            found: vec![amount],
        });
    }
    let value = cx.frame.pop()?;
    let instruction = match (op, num_kind(op, &value)?) {
        (ArithOp::Shl, NumKind::Int) => Instruction::Ishl,
        (ArithOp::Shl, NumKind::Long) => Instruction::Lshl,
        (ArithOp::Shr, NumKind::Int) => Instruction::Ishr,
        (ArithOp::Shr, NumKind::Long) => Instruction::Lshr,
        (ArithOp::Ushr, NumKind::Int) => Instruction::Iushr,
        (ArithOp::Ushr, NumKind::Long) => Instruction::Lushr,
        _ => {
            return Err(Error::UnrepresentableType {
                ty: value,
                context: op.name().to_string(),
            });
        }
    };
    cx.sink.push(instruction);
    cx.frame.push(value)
}

fn lower_cmp(cx: &mut MethodCx) -> Result<()> {
    cx.frame.require("cmp", 2)?;
    let rhs = cx.frame.pop()?;
    let lhs = cx.frame.pop()?;
    if lhs != rhs {
        return Err(Error::StackMismatch {
            context: "cmp".to_string(),
            expected: vec![lhs.clone(), lhs],
            found: vec![rhs.clone(), rhs],
        });
    }
    let instruction = match num_kind(ArithOp::Cmp, &lhs)? {
        NumKind::Long => Instruction::Lcmp,
        NumKind::Float => Instruction::Fcmpl,
        NumKind::Double => Instruction::Dcmpl,
        NumKind::Int => {
            return Err(Error::UnrepresentableType {
                ty: lhs,
                context: "cmp".to_string(),
            });
        }
    };
    cx.sink.push(instruction);
    cx.frame.push(I32)
}
