use super::*;

#[test]
fn test_default_filter_scopes_our_crates() {
    let filter = default_filter(LogLevel::Debug);
    assert!(filter.starts_with("vesselharbor=debug,vesselharbor_lib=debug"));
    assert!(filter.contains("reqwest=warn"));
    assert!(filter.ends_with(",debug"));
}

#[test]
fn test_default_filter_parses() {
    for level in [LogLevel::Error, LogLevel::Info, LogLevel::Trace] {
        let directive = default_filter(level);
        assert!(EnvFilter::try_new(&directive).is_ok(), "{directive}");
    }
}

#[test]
fn test_ensure_tolerates_repeated_initialization() {
    let config = LoggerConfig {
        level: LogLevel::Error,
        format: LogFormat::Text,
        output: LogOutput::Stderr,
        color: false,
    };
    // Another test may already own the global subscriber.
    assert!(Logger::ensure(config.clone()).is_ok() || Logger::is_initialized());
    assert!(Logger::ensure(config).is_ok() || Logger::is_initialized());
}
