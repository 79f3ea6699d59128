// Input sources: the abstract batch interface the capture thread reads from,
// and the concrete evdev implementation over a device node or stdin.

use crate::classify::controls;
use input_linux_sys::{input_event, EV_SYN};
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SYN_REPORT: u16 = 0;
const SYN_DROPPED: u16 = 3;

/// Directory scanned for stable gamepad device links.
pub const BY_ID_DIR: &str = "/dev/input/by-id";
const JOYSTICK_SUFFIX: &str = "-event-joystick";

/// One raw state change: a symbolic code name and its integer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub code: &'static str,
    pub state: i32,
}

/// All state changes delivered by one poll of the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Poll time in seconds.
    pub timestamp: f64,
    pub events: Vec<RawEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The device is gone; no further batches will arrive.
    #[error("input device disconnected")]
    Disconnected,
    /// The read failed but the device may still be usable.
    #[error("transient read error: {0}")]
    Transient(#[source] io::Error),
}

/// A blocking producer of event batches.
pub trait InputSource: Send {
    fn next_batch(&mut self) -> Result<Batch, SourceError>;
    fn device_name(&self) -> &str;
}

/// Locates the controller to monitor.
pub trait DeviceProvider {
    fn detect(&mut self) -> Option<Box<dyn InputSource>>;
}

/// Reads a single `input_event` from the reader. Returns Ok(None) on EOF.
pub fn read_event(reader: &mut impl Read) -> io::Result<Option<input_event>> {
    let mut buf = [0u8; size_of::<input_event>()];
    match reader.read_exact(&mut buf) {
        Ok(()) => {
            // SAFETY: input_event is plain old data and buf holds exactly one.
            let event: input_event = unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const _) };
            Ok(Some(event))
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Writes a single input_event to the writer.
pub fn write_event(writer: &mut impl Write, event: &input_event) -> io::Result<()> {
    // SAFETY: Views the event as its raw bytes for the duration of the write.
    let buf: &[u8] = unsafe {
        std::slice::from_raw_parts(event as *const _ as *const u8, size_of::<input_event>())
    };
    writer.write_all(buf)
}

/// Event timestamp in seconds from its timeval.
#[inline]
pub fn event_seconds(event: &input_event) -> f64 {
    event.time.tv_sec as f64 + event.time.tv_usec as f64 / 1_000_000.0
}

/// Batches raw `input_event`s from any byte stream, splitting at `SYN_REPORT`.
pub struct EvdevSource<R> {
    reader: R,
    name: String,
    pending: Vec<RawEvent>,
}

impl<R: Read + Send> EvdevSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        EvdevSource {
            reader,
            name: name.into(),
            pending: Vec::with_capacity(16),
        }
    }
}

impl EvdevSource<File> {
    /// Opens a device node such as `/dev/input/event5` or a by-id link.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(EvdevSource::new(file, device_name_for(path)))
    }
}

impl EvdevSource<io::Stdin> {
    pub fn stdin(name: impl Into<String>) -> Self {
        EvdevSource::new(io::stdin(), name)
    }
}

fn map_read_error(e: io::Error) -> SourceError {
    if e.raw_os_error() == Some(libc::ENODEV) {
        SourceError::Disconnected
    } else {
        SourceError::Transient(e)
    }
}

impl<R: Read + Send> InputSource for EvdevSource<R> {
    /// Reads up to and including the next `SYN_REPORT`. The report's kernel
    /// timestamp is the poll time. A partial report at end of stream is dropped.
    fn next_batch(&mut self) -> Result<Batch, SourceError> {
        loop {
            let event = match read_event(&mut self.reader) {
                Ok(Some(event)) => event,
                Ok(None) => return Err(SourceError::Disconnected),
                Err(e) => return Err(map_read_error(e)),
            };

            if i32::from(event.type_) == EV_SYN {
                match event.code {
                    SYN_REPORT => {
                        return Ok(Batch {
                            timestamp: event_seconds(&event),
                            events: std::mem::take(&mut self.pending),
                        });
                    }
                    SYN_DROPPED => {
                        warn!(discarded = self.pending.len(), "Kernel dropped input events, discarding partial report");
                        self.pending.clear();
                    }
                    _ => {}
                }
                continue;
            }

            match controls::code_name(event.type_, event.code) {
                Some(code) => self.pending.push(RawEvent { code, state: event.value }),
                None => debug!(
                    event_type = controls::get_event_type_name(event.type_),
                    code = event.code,
                    "Skipping unmapped event"
                ),
            }
        }
    }

    fn device_name(&self) -> &str {
        &self.name
    }
}

/// Returns every `*-event-joystick` link under `/dev/input/by-id`, sorted.
pub fn find_joystick_devices() -> io::Result<Vec<PathBuf>> {
    let mut devices: Vec<PathBuf> = std::fs::read_dir(BY_ID_DIR)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(JOYSTICK_SUFFIX))
        })
        .collect();
    devices.sort();
    Ok(devices)
}

/// Human-readable device name from sysfs, falling back to the path's file name.
pub fn device_name_for(path: &Path) -> String {
    let sysfs_name = path
        .canonicalize()
        .ok()
        .and_then(|node| node.file_name().map(|n| n.to_os_string()))
        .and_then(|node| {
            let sys = Path::new("/sys/class/input").join(node).join("device/name");
            std::fs::read_to_string(sys).ok()
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    sysfs_name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    })
}

/// Prints the joystick devices found to stderr, one per line.
pub fn list_input_devices() -> io::Result<()> {
    let devices = find_joystick_devices()?;
    if devices.is_empty() {
        eprintln!("No joystick devices found under {BY_ID_DIR}");
        return Ok(());
    }
    for path in devices {
        let name = device_name_for(&path);
        let connection = crate::diagnostics::ConnectionType::from_device_name(&name);
        eprintln!("{}  {} ({})", path.display(), name, connection);
    }
    Ok(())
}

/// How the capture source is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelection {
    /// First joystick under `/dev/input/by-id`.
    Auto,
    Path(PathBuf),
    /// Raw events on stdin, reported under the given name.
    Stdin(String),
}

/// Opens the device named by a `DeviceSelection`. Each `detect` call opens it afresh.
#[derive(Debug, Clone)]
pub struct EvdevProvider {
    selection: DeviceSelection,
}

impl EvdevProvider {
    pub fn new(selection: DeviceSelection) -> Self {
        EvdevProvider { selection }
    }
}

impl DeviceProvider for EvdevProvider {
    fn detect(&mut self) -> Option<Box<dyn InputSource>> {
        let path = match &self.selection {
            DeviceSelection::Stdin(name) => return Some(Box::new(EvdevSource::stdin(name.clone()))),
            DeviceSelection::Path(path) => path.clone(),
            DeviceSelection::Auto => match find_joystick_devices() {
                Ok(devices) => devices.into_iter().next()?,
                Err(e) => {
                    warn!(dir = BY_ID_DIR, error = %e, "Could not scan for joystick devices");
                    return None;
                }
            },
        };

        match EvdevSource::open(&path) {
            Ok(source) => {
                debug!(path = %path.display(), name = source.device_name(), "Opened input device");
                Some(Box::new(source))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open input device");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use input_linux_sys::{timeval, EV_ABS, EV_KEY};
    use std::io::Cursor;

    fn raw(ts_us: u64, type_: i32, code: u16, value: i32) -> input_event {
        input_event {
            time: timeval {
                tv_sec: (ts_us / 1_000_000) as _,
                tv_usec: (ts_us % 1_000_000) as _,
            },
            type_: type_ as u16,
            code,
            value,
        }
    }

    fn encode(events: &[input_event]) -> Vec<u8> {
        let mut buf = Vec::new();
        for ev in events {
            write_event(&mut buf, ev).unwrap();
        }
        buf
    }

    #[test]
    fn batches_split_at_syn_report() {
        let bytes = encode(&[
            raw(1_000_000, EV_KEY, 304, 1),
            raw(1_000_000, EV_ABS, 2, 200),
            raw(1_000_000, EV_ABS, 0, 1234), // left stick X, unmapped for tracking but named
            raw(1_000_000, EV_SYN, SYN_REPORT, 0),
            raw(1_004_000, EV_KEY, 304, 0),
            raw(1_004_000, EV_SYN, SYN_REPORT, 0),
        ]);
        let mut source = EvdevSource::new(Cursor::new(bytes), "pad");

        let first = source.next_batch().unwrap();
        assert_eq!(first.timestamp, 1.0);
        assert_eq!(
            first.events,
            vec![
                RawEvent { code: "BTN_SOUTH", state: 1 },
                RawEvent { code: "ABS_Z", state: 200 },
                RawEvent { code: "ABS_X", state: 1234 },
            ]
        );
        let second = source.next_batch().unwrap();
        assert!((second.timestamp - 1.004).abs() < 1e-9);
        assert_eq!(second.events, vec![RawEvent { code: "BTN_SOUTH", state: 0 }]);
        assert!(matches!(source.next_batch(), Err(SourceError::Disconnected)));
    }

    #[test]
    fn unknown_codes_are_skipped_and_dropped_reports_discarded() {
        let bytes = encode(&[
            raw(0, EV_KEY, 30, 1), // KEY_A: not a gamepad code
            raw(0, EV_KEY, 305, 1),
            raw(0, EV_SYN, SYN_DROPPED, 0),
            raw(10, EV_KEY, 307, 1),
            raw(10, EV_SYN, SYN_REPORT, 0),
        ]);
        let mut source = EvdevSource::new(Cursor::new(bytes), "pad");
        let batch = source.next_batch().unwrap();
        assert_eq!(batch.events, vec![RawEvent { code: "BTN_NORTH", state: 1 }]);
    }

    #[test]
    fn empty_report_is_a_poll() {
        let bytes = encode(&[raw(2_500_000, EV_SYN, SYN_REPORT, 0)]);
        let mut source = EvdevSource::new(Cursor::new(bytes), "pad");
        let batch = source.next_batch().unwrap();
        assert_eq!(batch.timestamp, 2.5);
        assert!(batch.events.is_empty());
    }

    #[test]
    fn truncated_stream_disconnects() {
        let mut bytes = encode(&[raw(0, EV_KEY, 304, 1)]);
        bytes.truncate(bytes.len() - 3);
        let mut source = EvdevSource::new(Cursor::new(bytes), "pad");
        assert!(matches!(source.next_batch(), Err(SourceError::Disconnected)));
    }

    #[test]
    fn enodev_is_disconnect_other_errors_are_transient() {
        assert!(matches!(
            map_read_error(io::Error::from_raw_os_error(libc::ENODEV)),
            SourceError::Disconnected
        ));
        assert!(matches!(
            map_read_error(io::Error::from(io::ErrorKind::WouldBlock)),
            SourceError::Transient(_)
        ));
    }

    #[test]
    fn device_name_falls_back_to_file_name() {
        let name = device_name_for(Path::new("/nonexistent/usb-Some_Pad-event-joystick"));
        assert_eq!(name, "usb-Some_Pad-event-joystick");
    }
}
