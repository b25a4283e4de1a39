use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins; otherwise the configured level applies to this crate and
/// the OPC UA stack is kept at warn.
pub fn default_directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.level.to_ascii_lowercase()
    };
    format!("sawmill_sim={level},opcua=warn,info")
}

pub fn init_logger(config: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config, verbose)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match config.format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init(),
    }
}
