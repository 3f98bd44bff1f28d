//! A progress bar for runs, behind the `progress_bar` feature.
//!
//! A run has no fixed end time, so the bar tracks the number of affected people against the
//! stop threshold instead. Only one progress bar can be active at a time; creating a second
//! observer replaces the first bar.
//!
//! ```ignore
//! use epi_kernels::progress::ProgressBarObserver;
//!
//! let mut observer = ProgressBarObserver::new("Affected", threshold);
//! let summary = engine.run_with_observer(&mut observer)?;
//! ```
use progress_bar::{
    finalize_progress_bar, init_progress_bar, set_progress_bar_action,
    set_progress_bar_progress, Color, Style,
};

use crate::engine::{ProgressObserver, RunSummary};
use crate::log::trace;

pub struct ProgressBarObserver {
    max_value: usize,
    last_value: usize,
}

impl ProgressBarObserver {
    /// Initializes a progress bar with the given label and max value.
    #[must_use]
    pub fn new(label: &str, max_value: usize) -> Self {
        trace!("initializing progress bar with label {label} and max value {max_value}");
        init_progress_bar(max_value);
        set_progress_bar_action(label, Color::Blue, Style::Bold);
        ProgressBarObserver {
            max_value,
            last_value: 0,
        }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_event(&mut self, _current_time: f64, affected_people: usize) {
        let value = affected_people.min(self.max_value);
        // Most events do not infect anyone.
        if value != self.last_value {
            set_progress_bar_progress(value);
            self.last_value = value;
        }
    }

    fn on_finish(&mut self, summary: &RunSummary) {
        set_progress_bar_progress(summary.affected_people.min(self.max_value));
        finalize_progress_bar();
    }
}
