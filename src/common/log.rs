//! Logging helpers
//!
//! `RUST_LOG` wins over the configured level when both are present.

/// Initialize the global logger
///
/// # Parameters
///
/// * `level` - Default log level when `RUST_LOG` is not set
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    // A second initialisation (tests, embedding) is not an error worth surfacing
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_twice() {
        init_logger("debug");
        init_logger("info");
    }
}
