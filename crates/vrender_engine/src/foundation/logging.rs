//! Logging setup

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system.
///
/// Safe to call more than once (tests and examples may race to initialize);
/// only the first call installs the logger.
pub fn init() {
    let _ = env_logger::try_init();
}
