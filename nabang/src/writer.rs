//! The writer facade: typed event recorders over the page ring.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;

use nabang_ring::{FileMap, PageWriter, WriteError};

use crate::event::{self, FuncId, Level};
use crate::valid::{self, Verdict};

/// Longest string any recorder puts on the wire. Anything longer is cut at
/// a character boundary so a unit can always fit its page.
const TEXT_LIMIT: usize = 16 * 1024;

/// Records events into the backing log.
///
/// All recorders take `&self`; the internal mutex serializes the whole
/// append, which is the only writer-side lock the protocol needs. The
/// reader in the peer process is synchronized purely through the page
/// headers.
pub struct LogWriter {
    // Dropped before `map`: sealing the active page on the way out still
    // has the file handle underneath it.
    pages: Mutex<PageWriter>,
    map: FileMap,
    valid_key: AtomicI32,
}

impl LogWriter {
    /// Create the backing file, discarding anything a previous run left.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(LogWriter {
            pages: Mutex::new(PageWriter::new()),
            map: FileMap::create(path.as_ref())?,
            valid_key: AtomicI32::new(0),
        })
    }

    /// Record a named point in time.
    pub fn stamp(&self, name: &str) {
        self.write_str_i64(FuncId::Stamp, name, now_ns());
    }

    /// Enter a named scope. The guard records the entry now and the exit
    /// when it drops, on every exit path.
    pub fn scope(&self, name: &str) -> Scope<'_> {
        self.write_str_i64(FuncId::ScopeBegin, name, now_ns());
        Scope {
            writer: self,
            name: name.to_owned(),
        }
    }

    /// Record a formatted trace line and echo it to stdout.
    pub fn trace(&self, level: Level, args: fmt::Arguments<'_>) {
        let message = args.to_string();
        println!("{} {}", level.prefix(), message);
        self.write_str_i32(FuncId::Trace, &message, level as i32);
    }

    /// Validate a condition. A false condition records the failure, prints
    /// it, then blocks until a verdict arrives over the out-of-band
    /// rendezvous: abort the process, carry on, or flip the condition to
    /// true and carry on.
    pub fn valid(&self, condition: &mut bool, args: fmt::Arguments<'_>) {
        if *condition {
            return;
        }

        let message = args.to_string();
        let key = self.valid_key.fetch_add(1, Ordering::Relaxed);
        println!("<valid:{key}> {message}");
        self.write_str_i32(FuncId::Valid, &message, key);

        match valid::await_verdict(key) {
            Verdict::Abort => std::process::abort(),
            Verdict::Continue => {}
            Verdict::Ignore => *condition = true,
        }
    }

    /// Record a named textual value.
    pub fn set_text(&self, name: &str, value: &str) {
        self.write_str_str(FuncId::SetText, name, value);
    }

    /// Record a named integer value.
    pub fn set_value(&self, name: &str, value: i32) {
        self.write_str_i32(FuncId::SetValue, name, value);
    }

    /// Record a delta against a named integer value.
    pub fn add_value(&self, name: &str, delta: i32) {
        self.write_str_i32(FuncId::AddValue, name, delta);
    }

    /// Seal the log with the orderly exit mark. Idempotent; later recorder
    /// calls become no-ops. Also happens on drop, but a process-global
    /// writer never drops, so shutdown paths call this explicitly.
    pub fn terminate(&self) {
        if let Err(err) = self.pages.lock().terminate() {
            fatal(err);
        }
    }

    pub(crate) fn write_str_i64(&self, id: FuncId, s: &str, value: i64) {
        let s = clamp(s);
        let slot = event::str_slot(s);
        self.append(id, slot + 8, |buf| {
            let at = event::put_str(buf, 0, s);
            event::put_i64(buf, at, value);
        });
    }

    pub(crate) fn write_str_i32(&self, id: FuncId, s: &str, value: i32) {
        let s = clamp(s);
        let slot = event::str_slot(s);
        self.append(id, slot + 4, |buf| {
            let at = event::put_str(buf, 0, s);
            event::put_i32(buf, at, value);
        });
    }

    pub(crate) fn write_str_str(&self, id: FuncId, first: &str, second: &str) {
        let first = clamp(first);
        let second = clamp(second);
        self.append(id, event::str_slot(first) + event::str_slot(second), |buf| {
            let at = event::put_str(buf, 0, first);
            event::put_str(buf, at, second);
        });
    }

    fn append(&self, id: FuncId, payload_len: usize, fill: impl FnOnce(&mut [u8])) {
        match self
            .pages
            .lock()
            .append(&self.map, id.wire(), payload_len, fill)
        {
            Ok(()) => {}
            // The log was sealed; whoever keeps recording past shutdown
            // loses those events, same as a reader that never ran.
            Err(WriteError::Terminated) => {}
            Err(err) => fatal(err),
        }
    }
}

/// Guard for a named scope; records the exit when dropped.
pub struct Scope<'w> {
    writer: &'w LogWriter,
    name: String,
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.writer
            .write_str_i64(FuncId::ScopeEnd, &self.name, now_ns());
    }
}

/// Map or flush failures leave nothing sensible to continue with; the state
/// up to the last flushed header stays readable for a later viewer.
fn fatal(err: WriteError) -> ! {
    eprintln!("nabang: cannot record to the log: {err}");
    std::process::abort()
}

fn clamp(s: &str) -> &str {
    if s.len() <= TEXT_LIMIT {
        return s;
    }
    let mut end = TEXT_LIMIT;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Nanoseconds on the monotonic clock.
fn now_ns() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // Safety: `ts` is a valid out-pointer for the duration of the call.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as i64 * 1_000_000_000 + ts.tv_nsec as i64
}
