//! Jump targets bound to physical instruction offsets at emission time.

use crate::error::{Error, Result};
use std::cell::Cell;
use std::rc::Rc;

/// An opaque forward/backward jump target. Created unbound, bound to a
/// concrete instruction index exactly once, shared by reference with every
/// jump that targets it.
#[derive(Debug, Clone, Default)]
pub struct Label {
    offset: Rc<Cell<Option<u16>>>,
}

impl Label {
    pub fn new() -> Label {
        Label::default()
    }

    pub fn is_bound(&self) -> bool {
        self.offset.get().is_some()
    }

    pub fn offset(&self) -> Option<u16> {
        self.offset.get()
    }

    /// Binds the label to an instruction index. Binding twice is a
    /// design-time error.
    pub(crate) fn bind(&self, at: u16) -> Result<()> {
        if let Some(bound_at) = self.offset.get() {
            return Err(Error::LabelRebound {
                bound_at,
                rebound_at: at,
            });
        }
        self.offset.set(Some(at));
        Ok(())
    }

    /// Two labels are the same target iff they share the binding cell.
    pub fn same_target(&self, other: &Label) -> bool {
        Rc::ptr_eq(&self.offset, &other.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_once() {
        let label = Label::new();
        assert!(!label.is_bound());
        label.bind(7).expect("first bind");
        assert_eq!(label.offset(), Some(7));
        assert!(matches!(
            label.bind(9),
            Err(Error::LabelRebound {
                bound_at: 7,
                rebound_at: 9
            })
        ));
    }

    #[test]
    fn clones_share_the_target() {
        let label = Label::new();
        let alias = label.clone();
        label.bind(3).expect("bind");
        assert_eq!(alias.offset(), Some(3));
        assert!(label.same_target(&alias));
        assert!(!label.same_target(&Label::new()));
    }
}
