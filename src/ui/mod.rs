//! Terminal output for the `precache` host
//!
//! Uses `cliclack` when attached to a terminal and falls back to plain
//! tagged lines (`[OK]`, `[WARN]`, ...) in pipes and CI.

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, remark, section, step_error, step_info,
    step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, PrecacheTheme};
