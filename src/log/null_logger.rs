//! Backend used when the `logging` feature is off: no logger is installed, but the public API
//! still works and the `log` macros respect the configured level.

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}
