//! Terminal output
//!
//! Spinners and styled step lines when attached to a terminal, plain
//! prefixed lines otherwise (CI, pipes).

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, key_value_status, section, step_info, step_ok, step_warn};
pub use progress::TaskSpinner;
