//! The reader facade over the page ring.

use std::path::Path;

use nabang_ring::{FileMap, PageReader, ReadResult};

/// Consumes events from a backing log written by another process.
///
/// Opening never fails: a backing file that cannot be opened is cached as
/// absent, and every poll reports [`ReadResult::NotFound`] from then on. A
/// consumer that wants to re-probe opens a fresh `LogReader`.
pub struct LogReader {
    // Dropped before `map`, so the page view unmaps before the file handle
    // closes.
    pages: PageReader,
    map: Option<FileMap>,
}

impl LogReader {
    pub fn open(path: impl AsRef<Path>) -> Self {
        LogReader {
            pages: PageReader::new(),
            map: FileMap::open(path.as_ref()).ok(),
        }
    }

    /// Whether the backing file was there when this reader was opened.
    pub fn attached(&self) -> bool {
        self.map.is_some()
    }

    /// Generation of the page currently under inspection.
    pub fn page_id(&self) -> u32 {
        self.pages.page_id()
    }

    /// Consume at most one event; the payload borrow ends with the call.
    pub fn read_once(&mut self, consume: impl FnOnce(u16, &[u8])) -> ReadResult {
        let Some(map) = &self.map else {
            return ReadResult::NotFound;
        };
        self.pages.read_once(map, consume)
    }
}
