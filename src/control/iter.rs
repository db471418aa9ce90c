//! Element-wise iteration over arrays and `Iterable` sources.
//!
//! Arrays get the cursor/length shape (`i < arr.length` with an indexed
//! element fetch); everything else goes through `iterator()` / `hasNext()` /
//! `next()`. Both shapes surface the element (and, when present, a zero-based
//! counter) to the body through the enclosing loop scope.

use crate::error::{Error, Result};
use crate::insn::{CmpOp, Cond, Insn, MethodRef, Value};
use crate::method::{LoopScope, MethodCx};
use crate::pos::Label;
use crate::types::{I32, Signature, Type};

const ITERABLE: &str = "java/lang/Iterable";
const ITERATOR: &str = "java/util/Iterator";

/// A for-each loop. `subject` pushes the source; the element is cast to
/// `element` before each body run.
#[derive(Debug, Clone)]
pub struct ForEach {
    pub subject: Vec<Insn>,
    pub element: Type,
    /// Maintain a zero-based iteration counter. Array loops expose their
    /// cursor as the counter whether or not this is set.
    pub with_counter: bool,
    pub body: Vec<Insn>,
}

impl ForEach {
    pub fn new(subject: Vec<Insn>, element: Type, body: Vec<Insn>) -> ForEach {
        ForEach {
            subject,
            element,
            with_counter: false,
            body,
        }
    }

    /// Iteration with the element left as `java/lang/Object`.
    pub fn untyped(subject: Vec<Insn>, body: Vec<Insn>) -> ForEach {
        ForEach::new(subject, Type::object(), body)
    }

    pub fn counted(mut self) -> ForEach {
        self.with_counter = true;
        self
    }

    /// Converts a fetched `Object` element to the declared element type:
    /// checked cast for references, checked cast to the wrapper plus an
    /// unbox for primitives.
    fn element_conversion(&self) -> Result<Vec<Insn>> {
        match self.element.primitive() {
            None => Ok(vec![Insn::Cast(self.element.clone())]),
            Some(p) => {
                let wrapper =
                    p.wrapper_class()
                        .ok_or_else(|| Error::UnrepresentableType {
                            ty: self.element.clone(),
                            context: "loop element".to_string(),
                        })?;
                Ok(vec![
                    Insn::CheckCast(Type::class(wrapper)),
                    Insn::Unbox,
                ])
            }
        }
    }

    pub fn compile(&self, cx: &mut MethodCx) -> Result<()> {
        cx.compile_all(&self.subject)?;
        let source = cx
            .frame
            .top()
            .cloned()
            .ok_or_else(|| Error::underflow("loop source"))?;
        if source.is_array() {
            self.compile_array(cx, &source)
        } else {
            self.compile_iterable(cx, &source)
        }
    }

    fn compile_array(&self, cx: &mut MethodCx, source: &Type) -> Result<()> {
        let array = cx.frame.push_local(source.clone())?;
        Insn::Store(array).compile(cx)?;
        let cursor = cx.frame.push_local(I32)?;
        cx.compile_all(&[Insn::Const(Value::Int(0)), Insn::Store(cursor)])?;
        let length = cx.frame.push_local(I32)?;
        cx.compile_all(&[Insn::Load(array), Insn::ArrayLength, Insn::Store(length)])?;
        let element = cx.frame.push_local(self.element.clone())?;

        let head = Label::new();
        let continue_label = Label::new();
        let break_label = Label::new();

        cx.compile_all(&[
            Insn::Mark(head.clone()),
            Insn::Load(cursor),
            Insn::Load(length),
            Insn::JumpIf(Cond::Cmp(CmpOp::Ge), break_label.clone()),
            Insn::Load(array),
            Insn::Load(cursor),
            Insn::ArrayLoad,
            Insn::Cast(self.element.clone()),
            Insn::Store(element),
        ])?;

        cx.loops.push(LoopScope {
            continue_label: continue_label.clone(),
            break_label: break_label.clone(),
            element: Some(element),
            counter: Some(cursor),
            length: Some(length),
        });
        let walked = cx.compile_all(&self.body);
        cx.loops.pop();
        walked?;

        cx.compile_all(&[
            Insn::Mark(continue_label),
            Insn::Inc(cursor, 1),
            Insn::Jump(head),
            Insn::Mark(break_label),
        ])?;

        for _ in 0..4 {
            cx.frame.pop_local()?;
        }
        Ok(())
    }

    fn compile_iterable(&self, cx: &mut MethodCx, source: &Type) -> Result<()> {
        if !source.is_reference() {
            return Err(Error::UnrepresentableType {
                ty: source.clone(),
                context: "loop source".to_string(),
            });
        }

        let iterator_call = MethodRef::interface(
            Type::class(ITERABLE),
            "iterator",
            Signature::new(vec![], Type::class(ITERATOR)),
        );
        cx.compile_all(&[
            Insn::Cast(Type::class(ITERABLE)),
            Insn::Invoke(iterator_call),
        ])?;

        let iterator = cx.frame.push_local(Type::class(ITERATOR))?;
        Insn::Store(iterator).compile(cx)?;
        let counter = if self.with_counter {
            let counter = cx.frame.push_local(I32)?;
            cx.compile_all(&[Insn::Const(Value::Int(0)), Insn::Store(counter)])?;
            Some(counter)
        } else {
            None
        };
        let element = cx.frame.push_local(self.element.clone())?;

        let head = Label::new();
        let continue_label = Label::new();
        let break_label = Label::new();

        let has_next = MethodRef::interface(
            Type::class(ITERATOR),
            "hasNext",
            Signature::new(vec![], crate::types::BOOLEAN),
        );
        let next = MethodRef::interface(
            Type::class(ITERATOR),
            "next",
            Signature::new(vec![], Type::object()),
        );
        cx.compile_all(&[
            Insn::Mark(head.clone()),
            Insn::Load(iterator),
            Insn::Invoke(has_next),
            Insn::JumpIf(Cond::CmpZero(CmpOp::Eq), break_label.clone()),
            Insn::Load(iterator),
            Insn::Invoke(next),
        ])?;
        cx.compile_all(&self.element_conversion()?)?;
        Insn::Store(element).compile(cx)?;

        cx.loops.push(LoopScope {
            continue_label: continue_label.clone(),
            break_label: break_label.clone(),
            element: Some(element),
            counter,
            length: None,
        });
        let walked = cx.compile_all(&self.body);
        cx.loops.pop();
        walked?;

        cx.compile_all(&[Insn::Mark(continue_label)])?;
        if let Some(counter) = counter {
            Insn::Inc(counter, 1).compile(cx)?;
        }
        cx.compile_all(&[Insn::Jump(head), Insn::Mark(break_label)])?;

        let owned = if self.with_counter { 3 } else { 2 };
        for _ in 0..owned {
            cx.frame.pop_local()?;
        }
        Ok(())
    }
}
