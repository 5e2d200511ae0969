use std::io::Write;

/// Initialize the process logger. `RUST_LOG` overrides `level` when set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init();
}

/// Parse a CLI/Python log level name, falling back to info.
pub fn parse_level(level: &str) -> log::LevelFilter {
    level.parse().unwrap_or(log::LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), log::LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), log::LevelFilter::Warn);
        assert_eq!(parse_level("bogus"), log::LevelFilter::Info);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(log::LevelFilter::Debug);
        init_logging(log::LevelFilter::Info);
        log::debug!("logger initialized");
    }
}
