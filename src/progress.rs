//! A console progress bar over the steps of a run.
//!
//! Only one progress bar can be active at a time; initializing a second one replaces the
//! first. Log messages printed while the bar is shown clear the line first (see
//! [`crate::log`]).
//!
//! ```ignore
//! init_step_progress_bar(config.steps);
//! for _ in 0..config.steps {
//!     world.update(&mut rng);
//!     increment_step_progress();
//! }
//! finish_step_progress();
//! ```

use crate::log::trace;
use progress_bar::{
    finalize_progress_bar, inc_progress_bar, init_progress_bar, set_progress_bar_action, Color,
    Style,
};

const STEP_LABEL: &str = "Steps";

/// Shows a progress bar that completes after `total_steps` calls to
/// [`increment_step_progress`].
pub fn init_step_progress_bar(total_steps: usize) {
    trace!("initializing step progress bar with {total_steps} steps");
    init_progress_bar(total_steps);
    set_progress_bar_action(STEP_LABEL, Color::Blue, Style::Bold);
}

pub fn increment_step_progress() {
    inc_progress_bar();
}

/// Completes the bar and moves the cursor past it.
pub fn finish_step_progress() {
    finalize_progress_bar();
}
