//! The per-method lowering pass: one frame, one sink, one walk over the
//! caller's instruction list.

use crate::error::{Error, Result};
use crate::frame::{Frame, Local};
use crate::insn::Insn;
use crate::pos::Label;
use crate::sink::CodeSink;
use crate::types::{Signature, Type};
use ristretto_classfile::ConstantPool;
use ristretto_classfile::attributes::Instruction;

/// What the lowering layer needs to know about the method it is emitting:
/// declaring type, name, static/instance-ness and the declared signature.
#[derive(Debug, Clone)]
pub struct MethodShape {
    pub owner: String,
    pub name: String,
    pub signature: Signature,
    pub is_static: bool,
}

impl MethodShape {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        signature: Signature,
        is_static: bool,
    ) -> MethodShape {
        MethodShape {
            owner: owner.into(),
            name: name.into(),
            signature,
            is_static,
        }
    }

    pub fn receiver_type(&self) -> Type {
        Type::class(&self.owner)
    }

    /// Logical index of parameter `i`, accounting for the receiver slot.
    pub fn param_local(&self, i: usize) -> Local {
        if self.is_static { Local(i) } else { Local(i + 1) }
    }
}

pub(crate) struct LoopScope {
    pub continue_label: Label,
    pub break_label: Label,
    /// Local holding the current element, when the loop walks a source.
    pub element: Option<Local>,
    /// Zero-based iteration counter, when the loop maintains one.
    pub counter: Option<Local>,
    /// Cached source length, for array-shaped loops.
    pub length: Option<Local>,
}

/// Mutable state for one method's lowering pass.
pub struct MethodCx<'a, 'cp> {
    pub shape: &'a MethodShape,
    pub frame: Frame,
    pub sink: CodeSink<'cp>,
    pub(crate) loops: Vec<LoopScope>,
}

impl<'a, 'cp> MethodCx<'a, 'cp> {
    /// Seeds the frame from the method shape: instance methods reserve
    /// slot 0 for the receiver, then one local per declared parameter.
    pub fn new(shape: &'a MethodShape, cp: &'cp mut ConstantPool) -> Result<MethodCx<'a, 'cp>> {
        let mut frame = Frame::new();
        if !shape.is_static {
            frame.push_local(shape.receiver_type())?;
        }
        for param in &shape.signature.params {
            frame.push_local(param.clone())?;
        }
        Ok(MethodCx {
            shape,
            frame,
            sink: CodeSink::new(cp),
            loops: Vec::new(),
        })
    }

    pub fn compile_all(&mut self, insns: &[Insn]) -> Result<()> {
        for insn in insns {
            insn.compile(self)?;
        }
        Ok(())
    }

    /// Resolves the Nth enclosing loop, 0 being the innermost.
    pub(crate) fn loop_at_depth(&self, depth: usize) -> Result<&LoopScope> {
        let nesting = self.loops.len();
        if depth >= nesting {
            return Err(Error::InvalidLoopDepth {
                requested: depth,
                nesting,
            });
        }
        Ok(&self.loops[nesting - 1 - depth])
    }
}

/// The lowered form of one method body plus the capacity it must declare.
#[derive(Debug)]
pub struct CompiledBody {
    pub code: Vec<Instruction>,
    pub max_stack: u16,
    pub max_locals: u16,
}

/// Lowers an ordered instruction list into a concrete stream, walking it
/// once and flattening nested construct bodies along the way.
pub fn compile_body(
    shape: &MethodShape,
    insns: &[Insn],
    cp: &mut ConstantPool,
) -> Result<CompiledBody> {
    breadcrumbs::log!(
        breadcrumbs::LogLevel::Info,
        "codegen",
        format!("lowering {}.{}{}", shape.owner, shape.name, shape.signature)
    );
    let mut cx = MethodCx::new(shape, cp)?;
    cx.compile_all(insns)?;
    let MethodCx { frame, sink, .. } = cx;
    Ok(CompiledBody {
        code: sink.finish()?,
        max_stack: frame.max_stack(),
        max_locals: frame.max_locals(),
    })
}
