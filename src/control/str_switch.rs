//! String selector dispatch via `hashCode` bucketing.
//!
//! Hash collisions are broken by `equals` chains inside each bucket. The
//! two-phase shape matches javac: the first switch maps the string to a
//! dense branch ordinal held in a scratch local, and a second switch
//! dispatches on that ordinal. The single-phase shape jumps from the
//! equality chain straight into the branch body, trading javac fidelity for
//! one fewer dispatch.

use std::collections::BTreeMap;

use crate::control::int_switch::{IntSwitch, dispatch_int, is_terminated};
use crate::error::{Error, Result};
use crate::insn::{CmpOp, Cond, Insn, MethodRef, Value};
use crate::method::MethodCx;
use crate::pos::Label;
use crate::types::{BOOLEAN, I32, Signature, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrSwitchStrategy {
    #[default]
    TwoPhase,
    SinglePhase,
}

/// A multi-way branch on a string selector. Each branch may claim several
/// literals; bodies do not fall through.
#[derive(Debug, Clone)]
pub struct StrSwitch {
    pub selector: Vec<Insn>,
    pub branches: Vec<(Vec<String>, Vec<Insn>)>,
    pub default: Option<Vec<Insn>>,
    pub strategy: StrSwitchStrategy,
}

impl StrSwitch {
    pub fn new(selector: Vec<Insn>) -> StrSwitch {
        StrSwitch {
            selector,
            branches: Vec::new(),
            default: None,
            strategy: StrSwitchStrategy::default(),
        }
    }

    pub fn branch(mut self, literals: Vec<String>, body: Vec<Insn>) -> StrSwitch {
        self.branches.push((literals, body));
        self
    }

    pub fn default_branch(mut self, body: Vec<Insn>) -> StrSwitch {
        self.default = Some(body);
        self
    }

    pub fn strategy(mut self, strategy: StrSwitchStrategy) -> StrSwitch {
        self.strategy = strategy;
        self
    }

    pub fn compile(&self, cx: &mut MethodCx) -> Result<()> {
        if self.branches.is_empty() {
            return Err(Error::EmptyBranchSet {
                construct: "string switch",
            });
        }
        let buckets = self.buckets()?;

        cx.compile_all(&self.selector)?;
        let selector = cx.frame.pop()?;
        if !selector.is_reference() {
            return Err(Error::StackMismatch {
                context: "switch selector".to_string(),
                expected: vec![Type::string()],
                found: vec![selector],
            });
        }
        cx.frame.push(Type::string())?;
        let subject = cx.frame.push_local(Type::string())?;
        Insn::Store(subject).compile(cx)?;

        breadcrumbs::log!(
            breadcrumbs::LogLevel::Info,
            "codegen",
            format!(
                "string dispatch over {} buckets: {}",
                buckets.len(),
                match self.strategy {
                    StrSwitchStrategy::TwoPhase => "two-phase",
                    StrSwitchStrategy::SinglePhase => "single-phase",
                }
            )
        );
        match self.strategy {
            StrSwitchStrategy::TwoPhase => self.compile_two_phase(cx, subject, &buckets),
            StrSwitchStrategy::SinglePhase => self.compile_single_phase(cx, subject, &buckets),
        }
    }

    /// Hash buckets in key order; each entry keeps its branch ordinal.
    fn buckets(&self) -> Result<BTreeMap<i32, Vec<(String, usize)>>> {
        let mut buckets: BTreeMap<i32, Vec<(String, usize)>> = BTreeMap::new();
        let mut seen: Vec<&str> = Vec::new();
        for (ordinal, (literals, _)) in self.branches.iter().enumerate() {
            for literal in literals {
                if seen.contains(&literal.as_str()) {
                    return Err(Error::DuplicateSwitchKey {
                        construct: "string switch",
                        key: literal.clone(),
                    });
                }
                seen.push(literal);
                buckets
                    .entry(java_string_hash(literal))
                    .or_default()
                    .push((literal.clone(), ordinal));
            }
        }
        if buckets.is_empty() {
            return Err(Error::EmptyBranchSet {
                construct: "string switch",
            });
        }
        Ok(buckets)
    }

    fn compile_two_phase(
        &self,
        cx: &mut MethodCx,
        subject: crate::frame::Local,
        buckets: &BTreeMap<i32, Vec<(String, usize)>>,
    ) -> Result<()> {
        let ordinal_local = cx.frame.push_local(I32)?;
        cx.compile_all(&[Insn::Const(Value::Int(-1)), Insn::Store(ordinal_local)])?;

        let resolve = Label::new();
        let bucket_labels: Vec<Label> = buckets.iter().map(|_| Label::new()).collect();
        let pairs: Vec<(i32, Label)> = buckets
            .keys()
            .copied()
            .zip(bucket_labels.iter().cloned())
            .collect();

        cx.compile_all(&[Insn::Load(subject), Insn::Invoke(hash_code())])?;
        cx.frame.pop()?;
        dispatch_int(&mut cx.sink, &resolve, &pairs);

        for (entries, label) in buckets.values().zip(&bucket_labels) {
            cx.sink.bind(label)?;
            for (literal, ordinal) in entries {
                let next = Label::new();
                cx.compile_all(&[
                    Insn::Load(subject),
                    Insn::Const(Value::Str(literal.clone())),
                    Insn::Invoke(equals()),
                    Insn::JumpIf(Cond::CmpZero(CmpOp::Eq), next.clone()),
                    Insn::Const(Value::Int(*ordinal as i32)),
                    Insn::Store(ordinal_local),
                    Insn::Jump(resolve.clone()),
                    Insn::Mark(next),
                ])?;
            }
            cx.sink.jump(&resolve);
        }

        cx.sink.bind(&resolve)?;
        let mut second = IntSwitch::new(vec![Insn::Load(ordinal_local)]);
        for (ordinal, (_, body)) in self.branches.iter().enumerate() {
            second = second.branch(vec![ordinal as i32], body.clone());
        }
        if let Some(body) = &self.default {
            second = second.default_branch(body.clone());
        }
        second.compile(cx)?;

        cx.frame.pop_local()?;
        cx.frame.pop_local()
    }

    fn compile_single_phase(
        &self,
        cx: &mut MethodCx,
        subject: crate::frame::Local,
        buckets: &BTreeMap<i32, Vec<(String, usize)>>,
    ) -> Result<()> {
        let default_label = Label::new();
        let end = Label::new();
        let branch_labels: Vec<Label> = self.branches.iter().map(|_| Label::new()).collect();
        let bucket_labels: Vec<Label> = buckets.iter().map(|_| Label::new()).collect();
        let pairs: Vec<(i32, Label)> = buckets
            .keys()
            .copied()
            .zip(bucket_labels.iter().cloned())
            .collect();

        cx.compile_all(&[Insn::Load(subject), Insn::Invoke(hash_code())])?;
        cx.frame.pop()?;
        dispatch_int(&mut cx.sink, &default_label, &pairs);

        for (entries, label) in buckets.values().zip(&bucket_labels) {
            cx.sink.bind(label)?;
            for (literal, ordinal) in entries {
                cx.compile_all(&[
                    Insn::Load(subject),
                    Insn::Const(Value::Str(literal.clone())),
                    Insn::Invoke(equals()),
                    Insn::JumpIf(Cond::CmpZero(CmpOp::Ne), branch_labels[*ordinal].clone()),
                ])?;
            }
            cx.sink.jump(&default_label);
        }

        let entry_depth = cx.frame.depth();
        let entry_types = cx.frame.peek(entry_depth)?.to_vec();
        for ((_, body), label) in self.branches.iter().zip(&branch_labels) {
            cx.sink.bind(label)?;
            cx.compile_all(body)?;
            if cx.frame.depth() != entry_depth {
                let depth = cx.frame.depth();
                return Err(Error::StackMismatch {
                    context: "switch branch".to_string(),
                    expected: entry_types,
                    found: cx.frame.peek(depth)?.to_vec(),
                });
            }
            if !is_terminated(body) {
                cx.sink.jump(&end);
            }
        }

        cx.sink.bind(&default_label)?;
        if let Some(body) = &self.default {
            cx.compile_all(body)?;
        }
        cx.sink.bind(&end)?;

        cx.frame.pop_local()
    }
}

fn hash_code() -> MethodRef {
    MethodRef::virtual_(
        Type::string(),
        "hashCode",
        Signature::new(vec![], I32),
    )
}

fn equals() -> MethodRef {
    MethodRef::virtual_(
        Type::string(),
        "equals",
        Signature::new(vec![Type::object()], BOOLEAN),
    )
}

/// `java.lang.String.hashCode`: a base-31 polynomial over UTF-16 units.
pub(crate) fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_the_jdk() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("a"), 97);
        assert_eq!(java_string_hash("Hello"), 69609650);
        assert_eq!(java_string_hash("polygenelubricants"), -2147483648);
    }

    #[test]
    fn colliding_literals_share_a_bucket() {
        // A classic collision pair under the base-31 polynomial.
        assert_eq!(java_string_hash("Aa"), java_string_hash("BB"));
    }
}
