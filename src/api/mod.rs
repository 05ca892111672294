//! Control-loop facing API
//!
//! [`NavigationCore`] bundles one tick worth of operations; [`callback`]
//! routes hardware callbacks into the core without global state.

pub mod core;
pub mod callback;

pub use self::core::NavigationCore;
pub use callback::{CallbackHandle, CallbackScanner, ReadingSink};
