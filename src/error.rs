//! Design-time failure classes surfaced while lowering a method body.
//!
//! Every variant is a programmer error in the caller's instruction graph, not
//! a runtime data error: generation either fully succeeds or the enclosing
//! class build is abandoned.

use crate::types::Type;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pop was requested on an empty operand stack.
    #[error("operand stack underflow in {context}")]
    StackUnderflow { context: String },

    /// The operand stack holds fewer entries than an instruction assumed.
    #[error("insufficient operand stack in {context}: need {needed}, have {depth}")]
    InsufficientStack {
        context: String,
        needed: usize,
        depth: usize,
    },

    /// The top stack entries exist but their types disagree with the
    /// instruction's expectation.
    #[error("operand stack mismatch in {context}: expected {expected:?}, found {found:?}")]
    StackMismatch {
        context: String,
        expected: Vec<Type>,
        found: Vec<Type>,
    },

    /// Cast or box/unbox between incompatible kinds.
    #[error("illegal coercion: {from:?} -> {to:?} ({reason})")]
    IllegalCoercion {
        from: Type,
        to: Type,
        reason: String,
    },

    /// A field/method reference builder was finalized before its owner or
    /// type was supplied.
    #[error("unbound instruction field: {what} missing on {builder}")]
    UnboundInstructionField {
        builder: &'static str,
        what: &'static str,
    },

    /// Bridge synthesis against a target whose parameter count disagrees
    /// with the implementation.
    #[error("override arity mismatch for {method}: target takes {target}, implementation takes {implementation}")]
    OverrideArityMismatch {
        method: String,
        target: usize,
        implementation: usize,
    },

    #[error("no override target named {method} on {owner}")]
    NoSuchOverrideTarget { owner: String, method: String },

    /// A structural-method field selection named a field the class does not
    /// declare (or declares only statically).
    #[error("no instance field named {field} on {owner}")]
    NoSuchField { owner: String, field: String },

    #[error("ambiguous override target {method} on {owner}: {candidates} candidates")]
    AmbiguousOverrideTarget {
        owner: String,
        method: String,
        candidates: usize,
    },

    /// break/continue addressed a loop deeper than the current nesting.
    #[error("invalid loop depth {requested}: only {nesting} loops are open")]
    InvalidLoopDepth { requested: usize, nesting: usize },

    /// A switch or loop-source builder was finalized with nothing registered.
    #[error("empty branch set for {construct}")]
    EmptyBranchSet { construct: &'static str },

    /// Two switch branches claimed the same key.
    #[error("duplicate {construct} key {key}")]
    DuplicateSwitchKey {
        construct: &'static str,
        key: String,
    },

    /// A loop-variable instruction referenced a loop without that variable.
    #[error("loop at depth {depth} does not carry the requested variable")]
    NoLoopVariable { depth: usize },

    /// A position was bound to an instruction offset twice.
    #[error("label already bound at {bound_at}, rebound at {rebound_at}")]
    LabelRebound { bound_at: u16, rebound_at: u16 },

    /// A jump targeted a position that was never bound before emission ended.
    #[error("unbound label referenced at instruction {referenced_at}")]
    LabelUnbound { referenced_at: usize },

    /// A local-table operation addressed a slot that does not exist.
    #[error("no local at index {index} (table holds {len})")]
    NoSuchLocal { index: usize, len: usize },

    /// Attempted to pop a local from an empty table.
    #[error("local table underflow in {context}")]
    LocalUnderflow { context: String },

    /// A type with no JVM value representation reached a value position.
    #[error("type {ty:?} cannot be used as a value in {context}")]
    UnrepresentableType { ty: Type, context: String },

    #[error(transparent)]
    ClassFile(#[from] ristretto_classfile::Error),
}

impl Error {
    pub(crate) fn underflow(context: impl Into<String>) -> Self {
        Error::StackUnderflow {
            context: context.into(),
        }
    }
}
