use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Measures how long gamepad buttons are held, scores each press against a
/// threshold, and reports poll-rate, latency and jitter diagnostics.
///
/// Events are read as raw Linux `input_event` structs, either straight from a
/// `/dev/input` device or from stdin (e.g. an Interception Tools `intercept`
/// pipe or a recorded capture).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Track presses from a controller until interrupted or disconnected.
    Monitor(MonitorArgs),
    /// Compare previously recorded session summaries.
    Report(ReportArgs),
    /// List the button names accepted by `monitor --button`.
    Buttons,
}

#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Hold-duration goal in milliseconds. Presses at or under it count as successes.
    /// Values below 1 are raised to 1.
    #[arg(short, long, default_value_t = crate::config::DEFAULT_THRESHOLD_MS, value_name = "MS")]
    pub threshold: f64,

    /// Track only this button (see `tapmeter buttons`). Accepts canonical
    /// names case-insensitively or evdev code names such as BTN_SOUTH.
    #[arg(short, long, value_parser = parse_button)]
    pub button: Option<String>,

    /// Device node to read (default: first /dev/input/by-id/*-event-joystick).
    #[arg(short, long, value_name = "PATH", conflicts_with = "stdin")]
    pub device: Option<PathBuf>,

    /// Read raw input_event structs from stdin instead of a device.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stdin: bool,

    /// Device name reported for stdin input. Also decides the connection type.
    #[arg(long, default_value = "stdin", value_name = "NAME")]
    pub device_name: String,

    /// Analog trigger level above which a trigger counts as pressed.
    #[arg(long, default_value_t = crate::classify::DEFAULT_TRIGGER_THRESHOLD, value_name = "LEVEL")]
    pub trigger_threshold: i32,

    /// Log every completed press to stderr.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub log_presses: bool,

    /// Print status to stderr periodically (e.g., "30s", "1m"). 0 disables.
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    pub log_interval: Duration,

    /// Print status reports in JSON instead of human-readable text.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stats_json: bool,

    /// On exit, print a one-line JSON session summary to stdout.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub summary_json: bool,

    /// Enable verbose logging (module targets, debug-level crate logs).
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// List available joystick devices and exit.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub list_devices: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// File of session summaries, one JSON object per line (as written by `monitor --summary-json`).
    #[arg(short, long, value_name = "FILE")]
    pub sessions: PathBuf,

    /// Print the report as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
}

fn parse_button(s: &str) -> Result<String, String> {
    crate::classify::controls::resolve_button(s)
        .map(str::to_string)
        .ok_or_else(|| {
            format!(
                "unknown button '{s}' (expected one of: {})",
                crate::classify::controls::available_buttons().join(", ")
            )
        })
}

/// Parses command line arguments using clap.
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn monitor_defaults() {
        let cli = Cli::try_parse_from(["tapmeter", "monitor", "--stdin"]).unwrap();
        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.threshold, 50.0);
        assert_eq!(args.trigger_threshold, 128);
        assert_eq!(args.log_interval, Duration::ZERO);
        assert!(args.button.is_none());
        assert_eq!(args.device_name, "stdin");
    }

    #[test]
    fn button_is_canonicalized() {
        let cli = Cli::try_parse_from(["tapmeter", "monitor", "--button", "btn_south"]).unwrap();
        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(args.button.as_deref(), Some("A"));
        assert!(Cli::try_parse_from(["tapmeter", "monitor", "--button", "Turbo"]).is_err());
    }

    #[test]
    fn device_conflicts_with_stdin() {
        assert!(Cli::try_parse_from(["tapmeter", "monitor", "--stdin", "--device", "/dev/input/event3"]).is_err());
    }
}
