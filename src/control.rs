//! Structured control constructs, lowered onto the flat label/jump substrate.
//!
//! Each construct is plain data holding nested instruction lists; lowering
//! synthesizes the scaffolding (locals, labels, dispatch tables) and compiles
//! the nested lists in place.

mod int_switch;
mod iter;
mod str_switch;

pub use int_switch::IntSwitch;
pub use iter::ForEach;
pub use str_switch::{StrSwitch, StrSwitchStrategy};
