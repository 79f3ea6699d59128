// Main application entry point.
// Dispatches subcommands; for `monitor` it starts the capture/recorder pair,
// waits for a signal or a disconnect, then prints the final statistics.

use colored::*;
use crossbeam_channel::{bounded, RecvTimeoutError};
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use std::io::{self, Write};
use std::process::exit;
use std::time::Duration;
use tapmeter::cli::{self, Command, MonitorArgs, ReportArgs};
use tapmeter::config::{self, Config};
use tapmeter::event::{list_input_devices, EvdevProvider};
use tapmeter::report::HistoryReport;
use tapmeter::{diagnostics, telemetry, Monitor};
use tracing::{error, info};

fn main() -> io::Result<()> {
    let cli = cli::parse_args();
    match cli.command {
        Command::Monitor(args) => run_monitor(&args),
        Command::Report(args) => run_report(&args),
        Command::Buttons => {
            let mut out = io::stdout().lock();
            for name in tapmeter::available_buttons() {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }
    }
}

fn run_monitor(args: &MonitorArgs) -> io::Result<()> {
    // --- Device Listing Mode ---
    if args.list_devices {
        eprintln!(
            "{}",
            "Scanning joystick devices (requires read access to /dev/input/by-id)..."
                .on_bright_black()
                .bold()
                .bright_cyan()
        );
        if let Err(e) = list_input_devices() {
            eprintln!("{} {}", "Error listing devices:".on_bright_black().red().bold(), e);
            exit(2);
        }
        return Ok(());
    }

    let cfg = Config::from(args);
    telemetry::init_tracing(&cfg);

    let mut monitor = Monitor::from_config(&cfg);
    let mut provider = EvdevProvider::new(cfg.device.clone());
    if !monitor.start(&mut provider) {
        eprintln!(
            "{} {}",
            "No controller found:".on_bright_black().red().bold(),
            cfg.device_label()
        );
        eprintln!(
            "{}",
            "Note: Reading input devices typically requires root or membership in the 'input' group."
                .on_bright_black()
                .yellow()
        );
        exit(3);
    }

    // Forward termination signals to the main thread so it can shut down in order.
    let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])?;
    let (sig_tx, sig_rx) = bounded(1);
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let _ = sig_tx.send(sig);
        }
    });

    let received = loop {
        match sig_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(sig) => break Some(sig),
            Err(RecvTimeoutError::Timeout) if monitor.is_running() => continue,
            Err(_) => break None,
        }
    };

    if let Some(sig) = received {
        eprintln!(
            "\n{} {}",
            "Received signal, printing final stats and exiting:".on_bright_black().yellow().bold(),
            sig
        );
    }

    monitor.stop();
    print_final_report(&monitor, &cfg)?;

    match received {
        Some(sig) => exit(128 + sig),
        None => Ok(()),
    }
}

fn print_final_report(monitor: &Monitor, cfg: &Config) -> io::Result<()> {
    match monitor.status() {
        Some(report) if cfg.stats_json => report.print_stats_json("Cumulative", io::stderr()),
        Some(report) => report.print_stats_to_stderr("Cumulative"),
        None => error!("Session state unavailable, no final statistics"),
    }

    if cfg.summary_json {
        let summary = monitor.summary();
        let mut out = io::stdout().lock();
        serde_json::to_writer(&mut out, &summary)?;
        writeln!(out)?;
    }
    Ok(())
}

fn run_report(args: &ReportArgs) -> io::Result<()> {
    telemetry::init_subscriber(&config::log_filter(false), false);

    let input = match std::fs::read_to_string(&args.sessions) {
        Ok(input) => input,
        Err(e) => {
            eprintln!(
                "{} {}: {}",
                "Cannot read session history".on_bright_black().red().bold(),
                args.sessions.display(),
                e
            );
            exit(4);
        }
    };
    let sessions = match diagnostics::parse_summaries(&input) {
        Ok(sessions) => sessions,
        Err(e) => {
            eprintln!(
                "{} {}: {}",
                "Malformed session history".on_bright_black().red().bold(),
                args.sessions.display(),
                e
            );
            exit(4);
        }
    };
    info!(sessions = sessions.len(), path = %args.sessions.display(), "Loaded session history");

    let report = match HistoryReport::build(&sessions) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", format!("Nothing to report: {e}").yellow());
            return Ok(());
        }
    };

    let out = io::stdout().lock();
    if args.json {
        report.write_json(out)
    } else {
        report.write_human(out)
    }
}
