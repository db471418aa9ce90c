//! Per-method operand-stack and local-slot bookkeeping.
//!
//! Exactly one `Frame` exists per method being lowered. It is mutated in
//! place for the whole pass and never shared. The running and peak widths it
//! tracks (in slots, wide primitives counting two) become the method's
//! declared max stack / max locals.

use crate::error::{Error, Result};
use crate::types::Type;

/// One addressable local storage unit: its type and slot offset.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSlot {
    pub ty: Type,
    pub offset: u16,
}

/// Caller-holdable handle to a local. Carries the logical index; the slot
/// offset is resolved against the frame at lowering time, so retype shifts
/// never invalidate a held handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local(pub(crate) usize);

impl Local {
    /// Handle for the local at the given logical index.
    pub fn at(index: usize) -> Local {
        Local(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Frame {
    stack: Vec<Type>,
    stack_width: u16,
    max_stack: u16,
    locals: Vec<LocalSlot>,
    local_width: u16,
    max_locals: u16,
}

impl Frame {
    pub fn new() -> Frame {
        Frame::default()
    }

    // --- operand stack ---

    pub fn push(&mut self, ty: Type) -> Result<()> {
        let width = ty.slot_width();
        if width == 0 {
            return Err(Error::UnrepresentableType {
                ty,
                context: "operand stack push".to_string(),
            });
        }
        self.stack_width += width;
        self.max_stack = self.max_stack.max(self.stack_width);
        self.stack.push(ty);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Type> {
        let ty = self
            .stack
            .pop()
            .ok_or_else(|| Error::underflow("operand stack pop"))?;
        self.stack_width -= ty.slot_width();
        Ok(ty)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top(&self) -> Option<&Type> {
        self.stack.last()
    }

    /// Top `n` entries, deepest first.
    pub fn peek(&self, n: usize) -> Result<&[Type]> {
        if self.stack.len() < n {
            return Err(Error::InsufficientStack {
                context: "operand stack peek".to_string(),
                needed: n,
                depth: self.stack.len(),
            });
        }
        Ok(&self.stack[self.stack.len() - n..])
    }

    /// Requires at least `expected.len()` entries on the stack.
    pub fn require(&self, context: &str, expected_len: usize) -> Result<()> {
        if self.stack.len() < expected_len {
            return Err(Error::InsufficientStack {
                context: context.to_string(),
                needed: expected_len,
                depth: self.stack.len(),
            });
        }
        Ok(())
    }

    /// Requires the top entries to equal `expected` exactly, in order
    /// (deepest first). Used before instructions with type-sensitive
    /// encodings.
    pub fn require_strict(&self, context: &str, expected: &[Type]) -> Result<()> {
        self.require(context, expected.len())?;
        let found = &self.stack[self.stack.len() - expected.len()..];
        if found != expected {
            return Err(Error::StackMismatch {
                context: context.to_string(),
                expected: expected.to_vec(),
                found: found.to_vec(),
            });
        }
        Ok(())
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    // --- local table ---

    /// Allocates a fresh local at the frontier.
    pub fn push_local(&mut self, ty: Type) -> Result<Local> {
        let width = ty.slot_width();
        if width == 0 {
            return Err(Error::UnrepresentableType {
                ty,
                context: "local slot".to_string(),
            });
        }
        let offset = self.local_width;
        self.locals.push(LocalSlot { ty, offset });
        self.local_width += width;
        self.max_locals = self.max_locals.max(self.local_width);
        Ok(Local(self.locals.len() - 1))
    }

    /// Allocates at an explicit logical index: the frontier appends, an
    /// existing index retypes in place.
    pub fn push_local_at(&mut self, index: usize, ty: Type) -> Result<Local> {
        if index == self.locals.len() {
            self.push_local(ty)
        } else if index < self.locals.len() {
            self.replace_local(index, ty)
        } else {
            Err(Error::NoSuchLocal {
                index,
                len: self.locals.len(),
            })
        }
    }

    /// Deallocates the last local. Strict LIFO, never random access.
    pub fn pop_local(&mut self) -> Result<()> {
        let slot = self
            .locals
            .pop()
            .ok_or_else(|| Error::LocalUnderflow {
                context: "local pop".to_string(),
            })?;
        self.local_width -= slot.ty.slot_width();
        Ok(())
    }

    /// Retypes an existing slot in place. A width change shifts the offsets
    /// of every later slot and widens the running maximum.
    pub fn replace_local(&mut self, index: usize, ty: Type) -> Result<Local> {
        let len = self.locals.len();
        let slot = self
            .locals
            .get_mut(index)
            .ok_or(Error::NoSuchLocal { index, len })?;
        let width = ty.slot_width();
        if width == 0 {
            return Err(Error::UnrepresentableType {
                ty,
                context: "local slot".to_string(),
            });
        }
        slot.ty = ty;
        let mut offset = slot.offset + width;
        for later in &mut self.locals[index + 1..] {
            later.offset = offset;
            offset += later.ty.slot_width();
        }
        self.local_width = offset;
        self.max_locals = self.max_locals.max(self.local_width);
        Ok(Local(index))
    }

    pub fn local(&self, index: usize) -> Result<&LocalSlot> {
        self.locals.get(index).ok_or(Error::NoSuchLocal {
            index,
            len: self.locals.len(),
        })
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }
}
