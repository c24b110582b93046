use crate::primitives::*;
use std::sync::OnceLock;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Global logger instance - ensures single initialization
static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Crates whose chatter stays at warn regardless of the requested level
const QUIET_CRATES: &[&str] = &["reqwest", "hyper", "hyper_util", "h2", "rustls", "want", "mio"];

/// Process-wide tracing subscriber with indicatif-aware writers
#[derive(Debug)]
pub struct Logger {
    config: LoggerConfig,
}

impl Logger {
    /// Install the global subscriber.
    ///
    /// `RUST_LOG` wins over the configured level when it is set.
    pub fn init(config: LoggerConfig) -> Result<&'static Self, LoggerError> {
        if GLOBAL_LOGGER.get().is_some() {
            return Err(LoggerError::AlreadyInitialized);
        }

        let indicatif_layer = IndicatifLayer::new();

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(config.level)));

        let fmt_layer = match config.output {
            LogOutput::Stderr => {
                format_layer(indicatif_layer.get_stderr_writer(), config.format, config.color)
            }
            LogOutput::Stdout => {
                format_layer(indicatif_layer.get_stdout_writer(), config.format, config.color)
            }
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(indicatif_layer)
            .try_init()
            .map_err(|e| LoggerError::InitializationFailed {
                reason: e.to_string(),
            })?;

        let logger = GLOBAL_LOGGER.get_or_init(|| Logger {
            config: config.clone(),
        });

        tracing::debug!(
            level = ?config.level,
            format = ?config.format,
            output = ?config.output,
            color = config.color,
            "logger initialized"
        );

        Ok(logger)
    }

    /// Initialize unless a subscriber is already installed.
    ///
    /// Tests and embedders construct several sessions per process, so a
    /// second initialization is not an error here.
    pub fn ensure(config: LoggerConfig) -> Result<(), LoggerError> {
        match Self::init(config) {
            Ok(_) => Ok(()),
            Err(LoggerError::AlreadyInitialized) => {
                if let Some(active) = GLOBAL_LOGGER.get() {
                    tracing::trace!(level = ?active.config().level, "logger already installed");
                }
                Ok(())
            }
            Err(_) if tracing::dispatcher::has_been_set() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn is_initialized() -> bool {
        GLOBAL_LOGGER.get().is_some()
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }
}

/// Filter directive: our crates at `level`, noisy transport crates at warn
pub fn default_filter(level: LogLevel) -> String {
    let level = level.as_filter();
    let mut directives = vec![
        format!("vesselharbor={level}"),
        format!("vesselharbor_lib={level}"),
    ];
    directives.extend(QUIET_CRATES.iter().map(|krate| format!("{krate}=warn")));
    directives.push(level.to_string());
    directives.join(",")
}

fn format_layer<S, W>(
    writer: W,
    format: LogFormat,
    color: bool,
) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_ansi(color)
            .with_target(false)
            .compact()
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(color)
            .pretty()
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
