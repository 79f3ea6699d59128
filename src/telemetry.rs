//! Tracing initialization.

use crate::{config::Config, util};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber (fmt layer to stderr with an `EnvFilter`)
/// and log the build and effective configuration.
pub fn init_tracing(cfg: &Config) {
    init_subscriber(&cfg.log_filter, cfg.verbose);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        // Use option_env! for git sha to avoid build errors outside git repo
        git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        build_ts = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        "tapmeter starting"
    );

    info!(threshold_ms = cfg.threshold_ms,
        button = %cfg.button.as_deref().unwrap_or("<all>"),
        device = %cfg.device_label(),
        trigger_threshold = cfg.trigger_threshold,
        log_presses = cfg.log_presses,
        log_interval = %util::format_duration(cfg.log_interval),
        stats_json = cfg.stats_json,
        summary_json = cfg.summary_json,
        verbose = cfg.verbose,
        log_filter = %cfg.log_filter,
        "Configuration loaded");
}

/// Installs the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_subscriber(log_filter: &str, verbose: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true);

    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|e| {
        eprintln!("Warning: Invalid RUST_LOG '{log_filter}': {e}");
        EnvFilter::new(crate::config::DEFAULT_LOG_FILTER)
    });

    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init();
}
