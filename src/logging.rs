//! Process logger that doubles as a warning interceptor.
//!
//! The renderer reports recoverable problems (an image that cannot be loaded, an invalid colour, an
//! object type without a drawer) through the [`log`] facade. The test runner needs to turn those
//! reports into failures, so this module installs a logger that records every `Warn` and `Error`
//! record into the innermost capture scope opened by [`capture_warnings`] on the current thread.
//! All records at or above the echo level are also written to stderr.
//!
//! Capture scopes are thread local: two renders running on different test threads never observe
//! each other's warnings even though the logger itself is process wide.

use std::cell::RefCell;
use std::fmt;
use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::error::{Error, Result};

/// A warning or error record observed during a capture scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedWarning {
    level: Level,
    target: String,
    message: String,
}

impl CapturedWarning {
    /// Creates a captured warning by hand. Mostly useful in tests.
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
        }
    }

    /// Severity of the record, either [`Level::Warn`] or [`Level::Error`].
    pub fn level(&self) -> Level {
        self.level
    }

    /// Module path or explicit target the record was logged from.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Formatted log message.
    pub fn message(&self) -> &str {
        &self.message
    }

    fn from_record(record: &Record<'_>) -> Self {
        Self {
            level: record.level(),
            target: record.target().to_owned(),
            message: record.args().to_string(),
        }
    }
}

impl fmt::Display for CapturedWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.message)
    }
}

thread_local! {
    static SCOPES: RefCell<Vec<Vec<CapturedWarning>>> = RefCell::new(Vec::new());
}

static ECHO_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);
static INSTALLED: OnceLock<bool> = OnceLock::new();
static LOGGER: WarningLogger = WarningLogger;

struct WarningLogger;

fn echo_level() -> LevelFilter {
    match ECHO_LEVEL.load(Ordering::Relaxed) {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl Log for WarningLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn || metadata.level() <= echo_level()
    }

    fn log(&self, record: &Record<'_>) {
        if record.level() <= Level::Warn {
            SCOPES.with(|scopes| {
                if let Some(scope) = scopes.borrow_mut().last_mut() {
                    scope.push(CapturedWarning::from_record(record));
                }
            });
        }

        if record.level() <= echo_level() {
            let stderr = std::io::stderr();
            let mut handle = stderr.lock();
            let _ = writeln!(
                handle,
                "[{:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the warning logger as the process logger.
///
/// Calling this more than once is fine; only the first call registers the logger. Later calls only
/// update the echo level. Fails when a different logger was registered before.
pub fn install(echo: LevelFilter) -> Result<()> {
    ECHO_LEVEL.store(echo as usize, Ordering::Relaxed);

    let installed = *INSTALLED.get_or_init(|| log::set_logger(&LOGGER).is_ok());
    if !installed {
        // A foreign logger holds the slot; surface its SetLoggerError.
        return log::set_logger(&LOGGER).map_err(Error::from);
    }

    log::set_max_level(echo.max(LevelFilter::Warn));
    Ok(())
}

/// Returns whether the warning logger is the registered process logger.
pub fn is_installed() -> bool {
    INSTALLED.get().copied().unwrap_or(false)
}

/// Parses an echo level name as used by the `TESTCASES_LOG` environment variable.
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    value.trim().parse::<LevelFilter>().ok()
}

struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().pop();
        });
    }
}

/// Runs `f` and returns its result together with every warning or error logged on this thread
/// while it ran.
///
/// Scopes nest: a record is only delivered to the innermost open scope.
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<CapturedWarning>) {
    SCOPES.with(|scopes| scopes.borrow_mut().push(Vec::new()));
    let guard = ScopeGuard;
    let value = f();
    let warnings = SCOPES.with(|scopes| {
        scopes
            .borrow_mut()
            .last_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    });
    drop(guard);
    (value, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{info, warn};

    fn installed() -> bool {
        install(LevelFilter::Off).is_ok()
    }

    #[test]
    fn captures_warnings_and_errors_only() {
        if !installed() {
            return;
        }
        let ((), warnings) = capture_warnings(|| {
            info!("not captured");
            warn!(target: "fixture::css", "bad colour");
            log::error!(target: "fixture::img", "missing image");
        });

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].level(), Level::Warn);
        assert_eq!(warnings[0].to_string(), "fixture::css: bad colour");
        assert_eq!(warnings[1].level(), Level::Error);
    }

    #[test]
    fn nested_scopes_only_fill_the_innermost() {
        if !installed() {
            return;
        }
        let (inner, outer) = capture_warnings(|| {
            let ((), inner) = capture_warnings(|| warn!("inner"));
            warn!("outer");
            inner
        });

        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].message(), "inner");
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].message(), "outer");
    }

    #[test]
    fn warnings_outside_a_scope_are_dropped() {
        if !installed() {
            return;
        }
        warn!("nobody listens");
        let ((), warnings) = capture_warnings(|| ());
        assert!(warnings.is_empty());
    }

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(parse_level(" DEBUG "), Some(LevelFilter::Debug));
        assert_eq!(parse_level("chatty"), None);
    }
}
