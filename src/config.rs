use crate::cli::MonitorArgs;
use crate::event::DeviceSelection;
use std::time::Duration;

/// Default hold-duration goal in milliseconds.
pub const DEFAULT_THRESHOLD_MS: f64 = 50.0;
/// Poll timestamps kept for rate and latency figures.
pub const POLL_CAPACITY: usize = crate::latency::DEFAULT_CAPACITY;
/// Capture-thread pause after a transient read error.
pub const RETRY_DELAY: Duration = Duration::from_millis(10);
/// How long `Monitor::stop` waits for the capture thread.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);
/// Longest a reader waits for the recorder to answer a query.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(1);
/// Filter used when RUST_LOG is unset.
pub const DEFAULT_LOG_FILTER: &str = "tapmeter=info";

/// Runtime configuration for the `monitor` command, derived from CLI arguments.
#[derive(Clone, Debug)]
pub struct Config {
    pub threshold_ms: f64,
    pub button: Option<String>,
    pub device: DeviceSelection,
    pub trigger_threshold: i32,
    pub log_presses: bool,
    pub log_interval: Duration,
    pub stats_json: bool,
    pub summary_json: bool,
    pub verbose: bool,
    pub log_filter: String,
}

impl Config {
    /// Periodic status interval, `None` when disabled.
    pub fn status_interval(&self) -> Option<Duration> {
        (!self.log_interval.is_zero()).then_some(self.log_interval)
    }

    /// Human-readable description of the input, for logs.
    pub fn device_label(&self) -> String {
        match &self.device {
            DeviceSelection::Auto => "auto".to_string(),
            DeviceSelection::Path(path) => path.display().to_string(),
            DeviceSelection::Stdin(name) => format!("stdin ({name})"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            threshold_ms: DEFAULT_THRESHOLD_MS,
            button: None,
            device: DeviceSelection::Auto,
            trigger_threshold: crate::classify::DEFAULT_TRIGGER_THRESHOLD,
            log_presses: false,
            log_interval: Duration::ZERO,
            stats_json: false,
            summary_json: false,
            verbose: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl From<&MonitorArgs> for Config {
    fn from(a: &MonitorArgs) -> Self {
        let device = if a.stdin {
            DeviceSelection::Stdin(a.device_name.clone())
        } else if let Some(path) = &a.device {
            DeviceSelection::Path(path.clone())
        } else {
            DeviceSelection::Auto
        };

        Self {
            threshold_ms: a.threshold,
            button: a.button.clone(),
            device,
            trigger_threshold: a.trigger_threshold,
            log_presses: a.log_presses,
            log_interval: a.log_interval,
            stats_json: a.stats_json,
            summary_json: a.summary_json,
            verbose: a.verbose,
            log_filter: log_filter(a.verbose),
        }
    }
}

/// RUST_LOG if set, otherwise the default filter (debug-level when verbose).
pub fn log_filter(verbose: bool) -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "tapmeter=debug".to_string()
        } else {
            DEFAULT_LOG_FILTER.to_string()
        }
    })
}
