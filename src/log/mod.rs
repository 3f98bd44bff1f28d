//! The `log` module defines an interface to the engine's logging facilities. Logging messages
//! describe the internal behavior of a run (setup, seeding, dropped events). This is not to be
//! confused with _reporting_, see `crate::report`, which records the epidemic itself.
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`, `info!`, `debug!` and
//! `trace!` where `error!` represents the highest-priority log messages and `trace!` the lowest.
//!
//! ```rust
//! use epi_kernels::log::info;
//!
//! pub fn do_a_thing() {
//!     info!("A thing is being done.");
//! }
//! ```
//!
//! Logging is _disabled_ by default. Logging can be enabled/disabled from code using the
//! functions:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only log messages with priority at least `level`
//!
//! In addition, per-module filtering of messages can be configured using `set_module_filter()` /
//! `set_module_filters()` and `remove_module_filter()`:
//!
//! ```rust
//! use epi_kernels::log::{set_module_filter, set_log_level, LevelFilter};
//!
//! pub fn setup_logging() {
//!     // Enable `info` log messages globally.
//!     set_log_level(LevelFilter::Info);
//!     // Show every dropped candidate exposure.
//!     set_module_filter("epi_kernels::engine", LevelFilter::Trace);
//! }
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(all(feature = "logging", feature = "progress_bar"))]
mod progress_bar_encoder;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};

use std::collections::BTreeMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

#[cfg(feature = "logging")]
use log4rs::Handle;

// Logging disabled
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;
// One line per queue insertion is too much even at `trace`.
const DEFAULT_MODULE_FILTERS: [(&str, LevelFilter); 1] =
    [("epi_kernels::plan", LevelFilter::Debug)];

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// The global level and the per-module level filters, keyed by module path (e.g.
/// `"epi_kernels::kernels"`). Loggers are installed process-wide, so there is exactly one of
/// these, behind the free functions below.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for modules without their own filter. `LevelFilter::Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    /// Sorted, so the installed logger config does not depend on insertion order.
    pub(in crate::log) module_filters: BTreeMap<String, LevelFilter>,

    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_filters: DEFAULT_MODULE_FILTERS
                .iter()
                .map(|(module, level)| ((*module).to_string(), *level))
                .collect(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    /// Applies `filters` and reinstalls the logger if anything changed.
    fn update_module_filters(&mut self, filters: &[(&str, LevelFilter)]) {
        let mut changed = false;
        for (module, level) in filters {
            changed |= self.module_filters.insert((*module).to_string(), *level) != Some(*level);
        }
        if changed {
            self.set_config();
        }
    }
}

/// Turns on every log message. Same as `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Turns off every log message. Same as `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the level for modules without their own filter.
pub fn set_log_level(level: LevelFilter) {
    let mut configuration = get_log_configuration();
    configuration.global_log_level = level;
    configuration.set_config();
}

/// Sets a level filter for one module path.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    get_log_configuration().update_module_filters(&[(module_path, level)]);
}

/// Sets several module filters at once, reinstalling the logger only once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    get_log_configuration().update_module_filters(module_filters);
}

/// Removes the filter for `module_path`, which falls back to the global level.
pub fn remove_module_filter(module_path: &str) {
    let mut configuration = get_log_configuration();
    if configuration.module_filters.remove(module_path).is_some() {
        configuration.set_config();
    }
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION.lock().expect("Mutex poisoned")
}
