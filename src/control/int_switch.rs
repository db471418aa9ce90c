//! Integer selector dispatch with javac's table/lookup cost model.
//!
//! Shape selection weighs table space (4 words plus one per covered value)
//! against lookup space (3 words plus two per case), with time weighted
//! three to one, so a run of near-contiguous keys compiles to `tableswitch`
//! and anything sparse to `lookupswitch`.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::insn::Insn;
use crate::method::MethodCx;
use crate::pos::Label;
use crate::sink::CodeSink;

/// A multi-way branch on an int selector. Each branch may claim several
/// keys; bodies do not fall through.
#[derive(Debug, Clone)]
pub struct IntSwitch {
    pub selector: Vec<Insn>,
    pub branches: Vec<(Vec<i32>, Vec<Insn>)>,
    pub default: Option<Vec<Insn>>,
}

impl IntSwitch {
    pub fn new(selector: Vec<Insn>) -> IntSwitch {
        IntSwitch {
            selector,
            branches: Vec::new(),
            default: None,
        }
    }

    pub fn branch(mut self, keys: Vec<i32>, body: Vec<Insn>) -> IntSwitch {
        self.branches.push((keys, body));
        self
    }

    pub fn default_branch(mut self, body: Vec<Insn>) -> IntSwitch {
        self.default = Some(body);
        self
    }

    pub fn compile(&self, cx: &mut MethodCx) -> Result<()> {
        if self.branches.is_empty() {
            return Err(Error::EmptyBranchSet {
                construct: "int switch",
            });
        }

        let labels: Vec<Label> = self.branches.iter().map(|_| Label::new()).collect();
        let mut keyed: BTreeMap<i32, Label> = BTreeMap::new();
        for ((keys, _), label) in self.branches.iter().zip(&labels) {
            for key in keys {
                if keyed.insert(*key, label.clone()).is_some() {
                    return Err(Error::DuplicateSwitchKey {
                        construct: "int switch",
                        key: key.to_string(),
                    });
                }
            }
        }
        if keyed.is_empty() {
            return Err(Error::EmptyBranchSet {
                construct: "int switch",
            });
        }

        cx.compile_all(&self.selector)?;
        let selector = cx.frame.pop()?;
        if !matches!(selector.primitive(), Some(p) if p.is_int_like()) {
            return Err(Error::StackMismatch {
                context: "switch selector".to_string(),
                expected: vec![crate::types::I32],
                found: vec![selector],
            });
        }

        let default_label = Label::new();
        let end = Label::new();
        let pairs: Vec<(i32, Label)> = keyed.into_iter().collect();
        dispatch_int(&mut cx.sink, &default_label, &pairs);

        let entry_depth = cx.frame.depth();
        let entry_types = cx.frame.peek(entry_depth)?.to_vec();
        for ((_, body), label) in self.branches.iter().zip(&labels) {
            cx.sink.bind(label)?;
            cx.compile_all(body)?;
            balance(cx, entry_depth, &entry_types)?;
            if !is_terminated(body) {
                cx.sink.jump(&end);
            }
        }

        cx.sink.bind(&default_label)?;
        if let Some(body) = &self.default {
            cx.compile_all(body)?;
            balance(cx, entry_depth, &entry_types)?;
        }
        cx.sink.bind(&end)
    }
}

/// Branch bodies must leave the operand stack at its dispatch depth.
fn balance(cx: &mut MethodCx, entry_depth: usize, entry_types: &[crate::types::Type]) -> Result<()> {
    if cx.frame.depth() != entry_depth {
        let depth = cx.frame.depth();
        let found = cx.frame.peek(depth)?.to_vec();
        return Err(Error::StackMismatch {
            context: "switch branch".to_string(),
            expected: entry_types.to_vec(),
            found,
        });
    }
    Ok(())
}

pub(crate) fn is_terminated(body: &[Insn]) -> bool {
    matches!(
        body.last(),
        Some(Insn::Ret | Insn::Throw | Insn::Jump(_) | Insn::Break(_) | Insn::Continue(_))
    )
}

/// Emits the dispatch instruction for sorted, distinct key/target pairs.
/// The int selector must already sit on top of the operand stack.
pub(crate) fn dispatch_int(sink: &mut CodeSink, default: &Label, pairs: &[(i32, Label)]) {
    let lo = i64::from(pairs[0].0);
    let hi = i64::from(pairs[pairs.len() - 1].0);
    let dense = use_table(lo, hi, pairs.len() as i64);
    breadcrumbs::log!(
        breadcrumbs::LogLevel::Info,
        "codegen",
        format!(
            "int dispatch over {} keys in [{lo}, {hi}]: {}",
            pairs.len(),
            if dense { "tableswitch" } else { "lookupswitch" }
        )
    );
    if dense {
        let mut targets: Vec<Option<Label>> = vec![None; (hi - lo + 1) as usize];
        for (key, label) in pairs {
            targets[(i64::from(*key) - lo) as usize] = Some(label.clone());
        }
        sink.table_switch(default, lo as i32, targets);
    } else {
        sink.lookup_switch(default, pairs.to_vec());
    }
}

fn use_table(lo: i64, hi: i64, count: i64) -> bool {
    let table_space = 4 + (hi - lo + 1);
    let table_time = 3;
    let lookup_space = 3 + 2 * count;
    let lookup_time = count;
    table_space + 3 * table_time <= lookup_space + 3 * lookup_time
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_keys_pick_a_table() {
        assert!(use_table(0, 9, 10));
    }

    #[test]
    fn sparse_keys_pick_a_lookup() {
        assert!(!use_table(0, 1_000_000, 3));
    }

    #[test]
    fn single_key_picks_a_lookup() {
        // 4 + 1 + 9 = 14 vs 3 + 2 + 3 = 8.
        assert!(!use_table(7, 7, 1));
    }

    #[test]
    fn small_gaps_still_pick_a_table() {
        // Keys 0..=9 with three holes: 4 + 10 + 9 = 23 vs 3 + 14 + 21 = 38.
        assert!(use_table(0, 9, 7));
    }
}
