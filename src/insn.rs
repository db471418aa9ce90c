//! The typed instruction vocabulary and its per-instruction lowering rules.
//!
//! `Insn` is a closed sum over every abstract instruction the engine
//! understands; lowering is one exhaustive match, so adding a variant forces
//! a rule. Instruction lists compose into trees (construct bodies are
//! ordered lists themselves) and are flattened by the single lowering walk.

use crate::control::{ForEach, IntSwitch, StrSwitch};
use crate::error::{Error, Result};
use crate::frame::Local;
use crate::method::MethodCx;
use crate::pos::Label;
use crate::sink::JumpKind;
use crate::types::{Primitive, Signature, Type};
use ristretto_classfile::attributes::Instruction;

mod arith;
mod array;
mod call;
mod cast;

pub use arith::ArithOp;

/// A constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    /// A loadable `java/lang/Class` reference by internal name.
    ClassRef(String),
    Null,
}

/// Comparison shape for conditional jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    /// Pops two operands of one comparable type.
    Cmp(CmpOp),
    /// Pops one int-like operand, compares against zero.
    CmpZero(CmpOp),
    /// Pops one reference.
    Null,
    NonNull,
    /// Pops two references, identity comparison.
    RefEq,
    RefNe,
}

/// How a method call dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Static,
    Special,
    Interface,
}

/// A fully bound field reference.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub owner: Type,
    pub name: String,
    pub ty: Type,
}

impl FieldRef {
    pub fn new(owner: Type, name: impl Into<String>, ty: Type) -> FieldRef {
        FieldRef {
            owner,
            name: name.into(),
            ty,
        }
    }

    pub fn builder() -> FieldRefBuilder {
        FieldRefBuilder::default()
    }

    fn owner_name(&self) -> Result<String> {
        self.owner
            .internal_or_descriptor()
            .ok_or_else(|| Error::UnrepresentableType {
                ty: self.owner.clone(),
                context: "field owner".to_string(),
            })
    }
}

/// Two-step builder for field references; finalizing without the owner or
/// the field type is a design-time error.
#[derive(Debug, Default)]
pub struct FieldRefBuilder {
    owner: Option<Type>,
    name: Option<String>,
    ty: Option<Type>,
}

impl FieldRefBuilder {
    pub fn owner(mut self, owner: Type) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ty(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn build(self) -> Result<FieldRef> {
        let unbound = |what| Error::UnboundInstructionField {
            builder: "FieldRef",
            what,
        };
        Ok(FieldRef {
            owner: self.owner.ok_or_else(|| unbound("owner"))?,
            name: self.name.ok_or_else(|| unbound("name"))?,
            ty: self.ty.ok_or_else(|| unbound("type"))?,
        })
    }
}

/// A fully bound method reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    pub kind: InvokeKind,
    pub owner: Type,
    pub name: String,
    pub signature: Signature,
}

impl MethodRef {
    pub fn virtual_(owner: Type, name: impl Into<String>, signature: Signature) -> MethodRef {
        MethodRef {
            kind: InvokeKind::Virtual,
            owner,
            name: name.into(),
            signature,
        }
    }

    pub fn static_(owner: Type, name: impl Into<String>, signature: Signature) -> MethodRef {
        MethodRef {
            kind: InvokeKind::Static,
            owner,
            name: name.into(),
            signature,
        }
    }

    pub fn special(owner: Type, name: impl Into<String>, signature: Signature) -> MethodRef {
        MethodRef {
            kind: InvokeKind::Special,
            owner,
            name: name.into(),
            signature,
        }
    }

    pub fn interface(owner: Type, name: impl Into<String>, signature: Signature) -> MethodRef {
        MethodRef {
            kind: InvokeKind::Interface,
            owner,
            name: name.into(),
            signature,
        }
    }

    pub fn builder(kind: InvokeKind) -> MethodRefBuilder {
        MethodRefBuilder {
            kind,
            owner: None,
            name: None,
            signature: None,
        }
    }

    fn owner_name(&self) -> Result<String> {
        self.owner
            .internal_or_descriptor()
            .ok_or_else(|| Error::UnrepresentableType {
                ty: self.owner.clone(),
                context: "method owner".to_string(),
            })
    }
}

#[derive(Debug)]
pub struct MethodRefBuilder {
    kind: InvokeKind,
    owner: Option<Type>,
    name: Option<String>,
    signature: Option<Signature>,
}

impl MethodRefBuilder {
    pub fn owner(mut self, owner: Type) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn build(self) -> Result<MethodRef> {
        let unbound = |what| Error::UnboundInstructionField {
            builder: "MethodRef",
            what,
        };
        Ok(MethodRef {
            kind: self.kind,
            owner: self.owner.ok_or_else(|| unbound("owner"))?,
            name: self.name.ok_or_else(|| unbound("name"))?,
            signature: self.signature.ok_or_else(|| unbound("signature"))?,
        })
    }
}

/// One abstract instruction.
#[derive(Debug, Clone)]
pub enum Insn {
    Const(Value),
    /// Pushes an existing local.
    Load(Local),
    /// Pops into an existing local, retyping the slot if the value's type
    /// differs (shifting later slot offsets).
    Store(Local),
    /// Pops into a freshly allocated local of the given type.
    StoreNew(Type),
    /// Increments an int-like local in place.
    Inc(Local, i16),
    Dup,
    DupX1,
    Pop,
    Swap,
    Arith(ArithOp),
    /// Numeric or checked reference cast, per the pairwise coercion rules.
    Cast(Type),
    CheckCast(Type),
    InstanceOf(Type),
    /// Boxes the primitive on top of the stack via the wrapper `valueOf`.
    Box_,
    /// Unboxes the wrapper on top of the stack via its value accessor.
    Unbox,
    GetField(FieldRef),
    PutField(FieldRef),
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    Invoke(MethodRef),
    /// Allocates, evaluates the argument list, and invokes the constructor.
    New {
        class: Type,
        ctor: Signature,
        args: Vec<Insn>,
    },
    /// Pops a length, allocates a one-dimensional array of the component.
    NewArray(Type),
    ArrayLoad,
    ArrayStore,
    ArrayLength,
    Mark(Label),
    Jump(Label),
    JumpIf(Cond, Label),
    /// Returns per the method's declared return type.
    Ret,
    Throw,
    ForEach(Box<ForEach>),
    IntSwitch(IntSwitch),
    StrSwitch(StrSwitch),
    /// Jumps to the break target of the Nth enclosing loop (0 = innermost).
    Break(usize),
    /// Jumps to the continue target of the Nth enclosing loop.
    Continue(usize),
    /// Pushes the current element of the Nth enclosing loop.
    Element(usize),
    /// Pushes the iteration counter of the Nth enclosing loop.
    Counter(usize),
    /// Pushes the cached source length of the Nth enclosing array loop.
    Length(usize),
}

impl Insn {
    pub fn compile(&self, cx: &mut MethodCx) -> Result<()> {
        match self {
            Insn::Const(value) => lower_const(cx, value),
            Insn::Load(local) => lower_load(cx, *local),
            Insn::Store(local) => lower_store(cx, *local),
            Insn::StoreNew(ty) => lower_store_new(cx, ty),
            Insn::Inc(local, delta) => lower_inc(cx, *local, *delta),
            Insn::Dup => lower_dup(cx),
            Insn::DupX1 => lower_dup_x1(cx),
            Insn::Pop => lower_pop(cx),
            Insn::Swap => lower_swap(cx),
            Insn::Arith(op) => arith::lower(cx, *op),
            Insn::Cast(to) => cast::lower_cast(cx, to),
            Insn::CheckCast(to) => cast::lower_check_cast(cx, to),
            Insn::InstanceOf(of) => call::lower_instance_of(cx, of),
            Insn::Box_ => cast::lower_box(cx),
            Insn::Unbox => cast::lower_unbox(cx),
            Insn::GetField(field) => call::lower_get_field(cx, field),
            Insn::PutField(field) => call::lower_put_field(cx, field),
            Insn::GetStatic(field) => call::lower_get_static(cx, field),
            Insn::PutStatic(field) => call::lower_put_static(cx, field),
            Insn::Invoke(method) => call::lower_invoke(cx, method),
            Insn::New { class, ctor, args } => call::lower_new(cx, class, ctor, args),
            Insn::NewArray(component) => array::lower_new_array(cx, component),
            Insn::ArrayLoad => array::lower_array_load(cx),
            Insn::ArrayStore => array::lower_array_store(cx),
            Insn::ArrayLength => array::lower_array_length(cx),
            Insn::Mark(label) => cx.sink.bind(label),
            Insn::Jump(label) => {
                cx.sink.jump(label);
                Ok(())
            }
            Insn::JumpIf(cond, label) => lower_jump_if(cx, *cond, label),
            Insn::Ret => lower_return(cx),
            Insn::Throw => lower_throw(cx),
            Insn::ForEach(for_each) => for_each.compile(cx),
            Insn::IntSwitch(switch) => switch.compile(cx),
            Insn::StrSwitch(switch) => switch.compile(cx),
            Insn::Break(depth) => {
                let label = cx.loop_at_depth(*depth)?.break_label.clone();
                cx.sink.jump(&label);
                Ok(())
            }
            Insn::Continue(depth) => {
                let label = cx.loop_at_depth(*depth)?.continue_label.clone();
                cx.sink.jump(&label);
                Ok(())
            }
            Insn::Element(depth) => {
                let local = cx
                    .loop_at_depth(*depth)?
                    .element
                    .ok_or(Error::NoLoopVariable { depth: *depth })?;
                lower_load(cx, local)
            }
            Insn::Counter(depth) => {
                let local = cx
                    .loop_at_depth(*depth)?
                    .counter
                    .ok_or(Error::NoLoopVariable { depth: *depth })?;
                lower_load(cx, local)
            }
            Insn::Length(depth) => {
                let local = cx
                    .loop_at_depth(*depth)?
                    .length
                    .ok_or(Error::NoLoopVariable { depth: *depth })?;
                lower_load(cx, local)
            }
        }
    }
}

fn lower_const(cx: &mut MethodCx, value: &Value) -> Result<()> {
    match value {
        Value::Int(v) => {
            cx.sink.push_int(*v)?;
            cx.frame.push(crate::types::I32)
        }
        Value::Long(v) => {
            cx.sink.push_long(*v)?;
            cx.frame.push(crate::types::I64)
        }
        Value::Float(v) => {
            cx.sink.push_float(*v)?;
            cx.frame.push(crate::types::F32)
        }
        Value::Double(v) => {
            cx.sink.push_double(*v)?;
            cx.frame.push(crate::types::F64)
        }
        Value::Str(s) => {
            cx.sink.push_string(s)?;
            cx.frame.push(Type::string())
        }
        Value::ClassRef(name) => {
            cx.sink.push_class(name)?;
            cx.frame.push(Type::class("java/lang/Class"))
        }
        Value::Null => {
            cx.sink.push_null();
            cx.frame.push(Type::object())
        }
    }
}

fn lower_load(cx: &mut MethodCx, local: Local) -> Result<()> {
    let slot = cx.frame.local(local.index())?.clone();
    cx.sink.load_local(&slot.ty, slot.offset)?;
    cx.frame.push(slot.ty)
}

fn lower_store(cx: &mut MethodCx, local: Local) -> Result<()> {
    let value = cx.frame.pop()?;
    if cx.frame.local(local.index())?.ty != value {
        cx.frame.replace_local(local.index(), value.clone())?;
    }
    let offset = cx.frame.local(local.index())?.offset;
    cx.sink.store_local(&value, offset)
}

fn lower_store_new(cx: &mut MethodCx, ty: &Type) -> Result<()> {
    cx.frame.pop()?;
    let local = cx.frame.push_local(ty.clone())?;
    let offset = cx.frame.local(local.index())?.offset;
    cx.sink.store_local(ty, offset)
}

fn lower_inc(cx: &mut MethodCx, local: Local, delta: i16) -> Result<()> {
    let slot = cx.frame.local(local.index())?.clone();
    match slot.ty.primitive() {
        Some(p) if p.is_int_like() => {
            cx.sink.iinc(slot.offset, delta);
            Ok(())
        }
        _ => Err(Error::UnrepresentableType {
            ty: slot.ty,
            context: "local increment".to_string(),
        }),
    }
}

fn lower_dup(cx: &mut MethodCx) -> Result<()> {
    let top = cx
        .frame
        .top()
        .cloned()
        .ok_or_else(|| Error::underflow("dup"))?;
    if top.slot_width() == 2 {
        cx.sink.push(Instruction::Dup2);
    } else {
        cx.sink.push(Instruction::Dup);
    }
    cx.frame.push(top)
}

fn lower_dup_x1(cx: &mut MethodCx) -> Result<()> {
    let pair = cx.frame.peek(2)?;
    if pair[0].slot_width() == 2 || pair[1].slot_width() == 2 {
        return Err(Error::StackMismatch {
            context: "dup_x1".to_string(),
            expected: vec![crate::types::I32, crate::types::I32],
            found: pair.to_vec(),
        });
    }
    let top = cx.frame.pop()?;
    let under = cx.frame.pop()?;
    cx.sink.push(Instruction::Dup_x1);
    cx.frame.push(top.clone())?;
    cx.frame.push(under)?;
    cx.frame.push(top)
}

fn lower_pop(cx: &mut MethodCx) -> Result<()> {
    let top = cx.frame.pop()?;
    if top.slot_width() == 2 {
        cx.sink.push(Instruction::Pop2);
    } else {
        cx.sink.push(Instruction::Pop);
    }
    Ok(())
}

fn lower_swap(cx: &mut MethodCx) -> Result<()> {
    let pair = cx.frame.peek(2)?;
    if pair[0].slot_width() == 2 || pair[1].slot_width() == 2 {
        return Err(Error::StackMismatch {
            context: "swap".to_string(),
            expected: vec![crate::types::I32, crate::types::I32],
            found: pair.to_vec(),
        });
    }
    let top = cx.frame.pop()?;
    let under = cx.frame.pop()?;
    cx.sink.push(Instruction::Swap);
    cx.frame.push(top)?;
    cx.frame.push(under)
}

fn pop_reference(cx: &mut MethodCx, context: &str) -> Result<()> {
    let top = cx.frame.pop()?;
    if !top.is_reference() {
        return Err(Error::StackMismatch {
            context: context.to_string(),
            expected: vec![Type::object()],
            found: vec![top],
        });
    }
    Ok(())
}

fn cmp_zero_kind(op: CmpOp) -> JumpKind {
    match op {
        CmpOp::Eq => JumpKind::Ifeq,
        CmpOp::Ne => JumpKind::Ifne,
        CmpOp::Lt => JumpKind::Iflt,
        CmpOp::Ge => JumpKind::Ifge,
        CmpOp::Gt => JumpKind::Ifgt,
        CmpOp::Le => JumpKind::Ifle,
    }
}

fn lower_jump_if(cx: &mut MethodCx, cond: Cond, label: &Label) -> Result<()> {
    match cond {
        Cond::Cmp(op) => {
            cx.frame.require("conditional jump", 2)?;
            let rhs = cx.frame.pop()?;
            let lhs = cx.frame.pop()?;
            if lhs != rhs {
                return Err(Error::StackMismatch {
                    context: "conditional jump".to_string(),
                    expected: vec![lhs.clone(), lhs],
                    found: vec![rhs.clone(), rhs],
                });
            }
            match lhs.primitive() {
                Some(p) if p.is_int_like() => {
                    let kind = match op {
                        CmpOp::Eq => JumpKind::IfIcmpEq,
                        CmpOp::Ne => JumpKind::IfIcmpNe,
                        CmpOp::Lt => JumpKind::IfIcmpLt,
                        CmpOp::Ge => JumpKind::IfIcmpGe,
                        CmpOp::Gt => JumpKind::IfIcmpGt,
                        CmpOp::Le => JumpKind::IfIcmpLe,
                    };
                    cx.sink.jump_kind(kind, label);
                }
                Some(Primitive::I64) => {
                    cx.sink.push(Instruction::Lcmp);
                    cx.sink.jump_kind(cmp_zero_kind(op), label);
                }
                Some(Primitive::F32) => {
                    cx.sink.push(Instruction::Fcmpl);
                    cx.sink.jump_kind(cmp_zero_kind(op), label);
                }
                Some(Primitive::F64) => {
                    cx.sink.push(Instruction::Dcmpl);
                    cx.sink.jump_kind(cmp_zero_kind(op), label);
                }
                Some(_) | None => {
                    return Err(Error::UnrepresentableType {
                        ty: lhs,
                        context: "ordered comparison".to_string(),
                    });
                }
            }
            Ok(())
        }
        Cond::CmpZero(op) => {
            let top = cx.frame.pop()?;
            if !top.primitive().is_some_and(Primitive::is_int_like) {
                return Err(Error::StackMismatch {
                    context: "zero comparison".to_string(),
                    expected: vec![crate::types::I32],
                    found: vec![top],
                });
            }
            cx.sink.jump_kind(cmp_zero_kind(op), label);
            Ok(())
        }
        Cond::Null => {
            pop_reference(cx, "null check")?;
            cx.sink.jump_kind(JumpKind::IfNull, label);
            Ok(())
        }
        Cond::NonNull => {
            pop_reference(cx, "null check")?;
            cx.sink.jump_kind(JumpKind::IfNonNull, label);
            Ok(())
        }
        Cond::RefEq => {
            cx.frame.require("reference comparison", 2)?;
            pop_reference(cx, "reference comparison")?;
            pop_reference(cx, "reference comparison")?;
            cx.sink.jump_kind(JumpKind::IfAcmpEq, label);
            Ok(())
        }
        Cond::RefNe => {
            cx.frame.require("reference comparison", 2)?;
            pop_reference(cx, "reference comparison")?;
            pop_reference(cx, "reference comparison")?;
            cx.sink.jump_kind(JumpKind::IfAcmpNe, label);
            Ok(())
        }
    }
}

fn lower_return(cx: &mut MethodCx) -> Result<()> {
    let ret = cx.shape.signature.ret.clone();
    let instruction = match ret.primitive() {
        Some(Primitive::Void) => Instruction::Return,
        Some(Primitive::I64) => {
            cx.frame.pop()?;
            Instruction::Lreturn
        }
        Some(Primitive::F32) => {
            cx.frame.pop()?;
            Instruction::Freturn
        }
        Some(Primitive::F64) => {
            cx.frame.pop()?;
            Instruction::Dreturn
        }
        Some(_) => {
            cx.frame.pop()?;
            Instruction::Ireturn
        }
        None => {
            cx.frame.pop()?;
            Instruction::Areturn
        }
    };
    cx.sink.push(instruction);
    Ok(())
}

fn lower_throw(cx: &mut MethodCx) -> Result<()> {
    let thrown = cx.frame.pop()?;
    if !thrown.is_reference() {
        return Err(Error::UnrepresentableType {
            ty: thrown,
            context: "throw".to_string(),
        });
    }
    cx.sink.push(Instruction::Athrow);
    Ok(())
}
