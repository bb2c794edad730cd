//! Cross-process instrumentation log.
//!
//! An instrumented process records structured events (stamps, scope
//! entries and exits, trace lines, named values, validation failures)
//! through a set of cheap recorders. The events land in a fixed-size
//! memory-mapped backing file laid out as a ring of pages (see the
//! `nabang-ring` crate), where a viewer process picks them up live. The
//! viewer tolerates the writer crashing, detaching, or exiting in an
//! orderly fashion; the writer never waits for the viewer, except when a
//! validation fails and explicitly asks for a verdict.
//!
//! The usual entry points are the process-global free functions, which
//! manage singleton handles on the fixed file name the way the original
//! tooling expects:
//!
//! ```no_run
//! nabang::stamp("boot");
//! {
//!     let _scope = nabang::scope("startup");
//!     nabang::trace(nabang::Level::Info, format_args!("{} workers", 4));
//!     nabang::set_value("workers", 4);
//! }
//! nabang::shutdown();
//! ```
//!
//! Owned [`LogWriter`] / [`LogReader`] handles on explicit paths are
//! available for anything that does not want the singleton, tests first of
//! all.

mod event;
mod reader;
mod valid;
mod writer;


pub use event::{Event, FuncId, Level, ParseError, Payload};
pub use nabang_ring::ReadResult;
pub use reader::LogReader;
pub use valid::{post_verdict, Verdict};
pub use writer::{LogWriter, Scope};

use std::fmt;
use std::sync::OnceLock;

use parking_lot::Mutex;

/// Fixed name of the backing file, in the working directory shared by the
/// writer and the viewer.
pub const LOG_PATH: &str = "nabang.blog";

static WRITER: OnceLock<LogWriter> = OnceLock::new();
static READER: OnceLock<Mutex<LogReader>> = OnceLock::new();

/// The process-wide writer, created on first use.
///
/// A process that cannot create its log file cannot be instrumented at
/// all, so creation failure is terminal.
pub fn writer() -> &'static LogWriter {
    WRITER.get_or_init(|| match LogWriter::create(LOG_PATH) {
        Ok(writer) => writer,
        Err(err) => {
            eprintln!("nabang: cannot create {LOG_PATH}: {err}");
            std::process::abort()
        }
    })
}

/// Record a named point in time.
pub fn stamp(name: &str) {
    writer().stamp(name)
}

/// Enter a named scope; the guard records the exit when it drops.
pub fn scope(name: &str) -> Scope<'static> {
    writer().scope(name)
}

/// Record a formatted trace line and echo it to stdout.
pub fn trace(level: Level, args: fmt::Arguments<'_>) {
    writer().trace(level, args)
}

/// Validate a condition, blocking on the rendezvous when it fails.
pub fn valid(condition: &mut bool, args: fmt::Arguments<'_>) {
    writer().valid(condition, args)
}

/// Record a named textual value.
pub fn set_text(name: &str, value: &str) {
    writer().set_text(name, value)
}

/// Record a named integer value.
pub fn set_value(name: &str, value: i32) {
    writer().set_value(name, value)
}

/// Record a delta against a named integer value.
pub fn add_value(name: &str, delta: i32) {
    writer().add_value(name, delta)
}

/// Seal the log with the orderly exit mark.
///
/// Statics never drop, so a process using the global recorders calls this
/// on its shutdown path; it is idempotent and a no-op when nothing was
/// ever recorded.
pub fn shutdown() {
    if let Some(writer) = WRITER.get() {
        writer.terminate()
    }
}

/// Poll the process-wide reader for one event.
pub fn read_once(consume: impl FnOnce(u16, &[u8])) -> ReadResult {
    READER
        .get_or_init(|| Mutex::new(LogReader::open(LOG_PATH)))
        .lock()
        .read_once(consume)
}
