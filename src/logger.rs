//! Structured logging with box-drawing output.
//!
//! Every macro renders one [`Layout`] and hands the text to [`emit`], which
//! prints it to stdout and, once [`Log::start_file_logging`] has run, also
//! appends it (without ANSI colours) to a daily `log_YYYYMMDD.txt` file.
//!
//! ## Logging Conventions
//!
//! - **`log_block_start!`** opens a new conceptual block (night boundaries,
//!   phase changes, loaded configuration). Prints an empty `┃` then `┣ message`.
//! - **`log_decorated!`** continues a block or stands alone: `┣ message`.
//! - **`log_indented!`** lists details under a block: `┃   message`.
//! - **`log_pipe!`** inserts an empty `┃` line, typically before a levelled
//!   message that starts its own block.
//! - **`log_version!`** prints the `┏ nightlapse vX.Y.Z ━━╸` header once.
//! - **`log_end!`** prints the final `╹` marker once.
//! - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`, `log_critical!`**
//!   print `┣[LEVEL] message`. `log_debug!` call sites are gated by the
//!   caller's `debug_enabled` flag.
//! - **`log_error_exit!`** closes the log with `┗[ERROR] message`.
//!
//! Once a clock is installed with [`Log::set_clock`], every line carries the
//! clock's time in the site timezone, so simulated runs read in simulated
//! time.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::clock::Clock;
use crate::constants::LOG_FILE_PREFIX;

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);

// Clock and site timezone used for line prefixes and log file dates
static CLOCK: RwLock<Option<(Arc<dyn Clock>, Tz)>> = RwLock::new(None);

// Channel to the file writer thread while file logging is active
static LOG_CHANNEL: Mutex<Option<Sender<LogMessage>>> = Mutex::new(None);

enum LogMessage {
    Line { date: NaiveDate, text: String },
    Shutdown,
}

/// Severity shown in `[LEVEL]` prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
    Debug,
    Critical,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "\x1b[32mINFO\x1b[0m",
            Level::Warning => "\x1b[33mWARNING\x1b[0m",
            Level::Error => "\x1b[31mERROR\x1b[0m",
            Level::Debug => "\x1b[32mDEBUG\x1b[0m",
            Level::Critical => "\x1b[31mCRITICAL\x1b[0m",
        }
    }
}

/// Shape of one logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Block,
    Decorated,
    Indented,
    Pipe,
    Version,
    End,
    Level(Level),
    /// A levelled message outside the pipe structure.
    Standalone(Level),
    ErrorExit,
}

/// Logging switches and file output control.
pub struct Log;

impl Log {
    /// Enable or disable all output, e.g. for quiet tests.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Stamp every following line with `clock`'s time in `timezone`.
    pub fn set_clock(clock: Arc<dyn Clock>, timezone: Tz) {
        let mut slot = CLOCK.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some((clock, timezone));
    }

    pub fn clear_clock() {
        let mut slot = CLOCK.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    fn clock_now() -> Option<(DateTime<Utc>, Tz)> {
        let slot = CLOCK.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|(clock, tz)| (clock.now(), *tz))
    }

    /// `[HH:MM:SS] ` in site-local time, or nothing before a clock is set.
    pub fn get_timestamp_prefix() -> String {
        match Self::clock_now() {
            Some((now, tz)) => format!("[{}] ", now.with_timezone(&tz).format("%H:%M:%S")),
            None => String::new(),
        }
    }

    /// Date the current line belongs to, used to pick the daily file.
    fn current_date() -> NaiveDate {
        match Self::clock_now() {
            Some((now, tz)) => now.with_timezone(&tz).date_naive(),
            None => chrono::Local::now().date_naive(),
        }
    }

    /// Tee output into `<dir>/log_YYYYMMDD.txt`, switching files when the
    /// date changes. Output stops going to the file when the guard drops.
    pub fn start_file_logging(dir: &Path) -> anyhow::Result<LoggerGuard> {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("Failed to create log directory {}: {e}", dir.display()))?;

        let mut slot = LOG_CHANNEL.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            anyhow::bail!("File logging already started");
        }

        let (tx, rx) = channel();
        let dir = dir.to_path_buf();
        let handle = std::thread::spawn(move || {
            let mut current: Option<(NaiveDate, File)> = None;
            loop {
                match rx.recv() {
                    Ok(LogMessage::Line { date, text }) => {
                        if current.as_ref().is_none_or(|(open, _)| *open != date) {
                            if let Some((_, mut file)) = current.take() {
                                file.flush()?;
                            }
                            let file = OpenOptions::new()
                                .create(true)
                                .append(true)
                                .open(log_file_path(&dir, date))?;
                            current = Some((date, file));
                        }
                        if let Some((_, file)) = current.as_mut() {
                            file.write_all(text.as_bytes())?;
                        }
                    }
                    Ok(LogMessage::Shutdown) | Err(_) => {
                        if let Some((_, mut file)) = current.take() {
                            file.flush()?;
                        }
                        break;
                    }
                }
            }
            Ok::<(), anyhow::Error>(())
        });

        *slot = Some(tx.clone());
        Ok(LoggerGuard {
            tx,
            handle: Some(handle),
        })
    }
}

/// `<dir>/log_YYYYMMDD.txt`
pub fn log_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{LOG_FILE_PREFIX}{}.txt", date.format("%Y%m%d")))
}

/// Stops file logging and flushes the file when dropped.
pub struct LoggerGuard {
    tx: Sender<LogMessage>,
    handle: Option<std::thread::JoinHandle<anyhow::Result<()>>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        LOG_CHANNEL
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let _ = self.tx.send(LogMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == 'm' {
                    break;
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Render `message` in `layout` with the current timestamp prefix.
pub fn render(layout: Layout, prefix: &str, message: &str) -> String {
    match layout {
        Layout::Block => format!("{prefix}┃\n{prefix}┣ {message}\n"),
        Layout::Decorated => format!("{prefix}┣ {message}\n"),
        Layout::Indented => format!("{prefix}┃   {message}\n"),
        Layout::Pipe => format!("{prefix}┃\n"),
        Layout::Version => format!(
            "{prefix}┏ nightlapse v{} ━━╸\n",
            env!("CARGO_PKG_VERSION")
        ),
        Layout::End => format!("{prefix}╹\n"),
        Layout::Level(level) => format!("{prefix}┣[{}] {message}\n", level.tag()),
        Layout::Standalone(level) => format!("{prefix}[{}] {message}\n", level.tag()),
        Layout::ErrorExit => format!(
            "{prefix}┃\n{prefix}┗[{}] {message}\n",
            Level::Error.tag()
        ),
    }
}

/// Write one message to stdout and, if active, the log file.
pub fn emit(layout: Layout, message: &str) {
    if !Log::is_enabled() {
        return;
    }
    let text = render(layout, &Log::get_timestamp_prefix(), message);

    print!("{text}");
    let _ = std::io::stdout().flush();

    let slot = LOG_CHANNEL.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(tx) = slot.as_ref() {
        let _ = tx.send(LogMessage::Line {
            date: Log::current_date(),
            text: strip_ansi_codes(&text),
        });
    }
}

// # Logging Macros

#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($layout:expr, $fmt:literal $($arg:tt)*) => {{
        if $crate::logger::Log::is_enabled() {
            $crate::logger::emit($layout, &format!($fmt $($arg)*));
        }
    }};
    ($layout:expr, $expr:expr) => {{
        if $crate::logger::Log::is_enabled() {
            let expr = $expr;
            $crate::logger::emit($layout, &format!("{expr}"));
        }
    }};
}

/// Start a new block: an empty pipe line, then `┣ message`.
#[macro_export]
macro_rules! log_block_start {
    ($($t:tt)*) => { $crate::__log_emit!($crate::logger::Layout::Block, $($t)*) };
}

/// `┣ message`, continuing the current block.
#[macro_export]
macro_rules! log_decorated {
    ($($t:tt)*) => { $crate::__log_emit!($crate::logger::Layout::Decorated, $($t)*) };
}

/// `┃   message`, a detail under the current block.
#[macro_export]
macro_rules! log_indented {
    ($($t:tt)*) => { $crate::__log_emit!($crate::logger::Layout::Indented, $($t)*) };
}

#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::logger::emit($crate::logger::Layout::Pipe, "")
    };
}

#[macro_export]
macro_rules! log_version {
    () => {
        $crate::logger::emit($crate::logger::Layout::Version, "")
    };
}

#[macro_export]
macro_rules! log_end {
    () => {
        $crate::logger::emit($crate::logger::Layout::End, "")
    };
}

#[macro_export]
macro_rules! log_info {
    ($($t:tt)*) => {
        $crate::__log_emit!($crate::logger::Layout::Level($crate::logger::Level::Info), $($t)*)
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($t:tt)*) => {
        $crate::__log_emit!($crate::logger::Layout::Level($crate::logger::Level::Warning), $($t)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($t:tt)*) => {
        $crate::__log_emit!($crate::logger::Layout::Level($crate::logger::Level::Error), $($t)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($t:tt)*) => {
        $crate::__log_emit!($crate::logger::Layout::Level($crate::logger::Level::Debug), $($t)*)
    };
}

#[macro_export]
macro_rules! log_critical {
    ($($t:tt)*) => {
        $crate::__log_emit!($crate::logger::Layout::Level($crate::logger::Level::Critical), $($t)*)
    };
}

/// `[WARNING] message` without the pipe, for output outside a session.
#[macro_export]
macro_rules! log_warning_standalone {
    ($($t:tt)*) => {
        $crate::__log_emit!($crate::logger::Layout::Standalone($crate::logger::Level::Warning), $($t)*)
    };
}

#[macro_export]
macro_rules! log_error_standalone {
    ($($t:tt)*) => {
        $crate::__log_emit!($crate::logger::Layout::Standalone($crate::logger::Level::Error), $($t)*)
    };
}

/// Close the log on a fatal error: `┗[ERROR] message`.
#[macro_export]
macro_rules! log_error_exit {
    ($($t:tt)*) => { $crate::__log_emit!($crate::logger::Layout::ErrorExit, $($t)*) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use chrono::TimeZone;
    use serial_test::serial;

    #[test]
    fn test_layouts() {
        assert_eq!(render(Layout::Decorated, "", "hi"), "┣ hi\n");
        assert_eq!(render(Layout::Indented, "", "hi"), "┃   hi\n");
        assert_eq!(render(Layout::Block, "[x] ", "hi"), "[x] ┃\n[x] ┣ hi\n");
        assert_eq!(render(Layout::End, "", ""), "╹\n");
        assert!(render(Layout::Version, "", "").starts_with("┏ nightlapse v"));
        assert_eq!(
            strip_ansi_codes(&render(Layout::Level(Level::Warning), "", "careful")),
            "┣[WARNING] careful\n"
        );
        assert_eq!(
            strip_ansi_codes(&render(Layout::ErrorExit, "", "fatal")),
            "┃\n┗[ERROR] fatal\n"
        );
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[31mERROR\x1b[0m ok"), "ERROR ok");
        assert_eq!(strip_ansi_codes("plain"), "plain");
    }

    #[test]
    fn test_log_file_name() {
        let date = NaiveDate::from_ymd_opt(2013, 8, 23).unwrap();
        assert_eq!(
            log_file_path(Path::new("/var/log/nl"), date),
            PathBuf::from("/var/log/nl/log_20130823.txt")
        );
    }

    #[test]
    #[serial]
    fn test_prefix_follows_installed_clock() {
        let start = Utc.with_ymd_and_hms(2013, 8, 24, 4, 30, 15).unwrap();
        let clock = Arc::new(SimulatedClock::fast_forward(start, start + chrono::Duration::hours(1)));
        Log::set_clock(clock, chrono_tz::Pacific::Honolulu);
        let prefix = Log::get_timestamp_prefix();
        let date = Log::current_date();
        Log::clear_clock();

        assert_eq!(prefix, "[18:30:15] ");
        assert_eq!(date, NaiveDate::from_ymd_opt(2013, 8, 23).unwrap());
        assert_eq!(Log::get_timestamp_prefix(), "");
    }

    #[test]
    #[serial]
    fn test_file_logging_writes_daily_file_without_colours() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utc.with_ymd_and_hms(2013, 8, 24, 4, 30, 15).unwrap();
        let clock = Arc::new(SimulatedClock::fast_forward(start, start + chrono::Duration::hours(1)));
        Log::set_clock(clock, chrono_tz::Pacific::Honolulu);

        {
            let _guard = Log::start_file_logging(dir.path()).unwrap();
            log_warning!("dew on the lens");
            log_indented!("{} frames", 3);
        }
        Log::clear_clock();

        let content = std::fs::read_to_string(dir.path().join("log_20130823.txt")).unwrap();
        assert!(content.contains("[18:30:15] ┣[WARNING] dew on the lens\n"));
        assert!(content.contains("[18:30:15] ┃   3 frames\n"));
        assert!(!content.contains('\x1b'));
    }
}
