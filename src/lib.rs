// Module declarations for the library crate.

pub mod classify;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod event;
pub mod latency;
pub mod monitor;
pub mod recorder;
pub mod report;
pub mod session;
pub mod stats;
pub mod telemetry;
pub mod tracker;
pub mod util;

// Re-exports for the types most callers need.
pub use classify::controls::available_buttons;
pub use monitor::Monitor;
pub use session::{Session, Settings};
pub use tracker::PressEvent;
