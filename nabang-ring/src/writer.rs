//! Appends units into the ring, one active page at a time.

use std::io;
use std::sync::atomic::Ordering;

use crate::filemap::{FileMap, PageView};
use crate::page::{
    packed, Activity, PageHeader, UnitHeader, MAX_UNIT_PAYLOAD, PACK, PAGE_COUNT, PAGE_HEADER_LEN,
    PAGE_SIZE, UNIT_HEADER_LEN,
};

/// Writer-side cursor over the ring.
///
/// At most one page is mapped at a time: the active page, the only one in
/// the whole ring whose header says `'+'`. Calls are expected to be
/// serialized by the owner; this type has no lock of its own.
pub struct PageWriter {
    view: Option<PageView>,
    /// Byte offset of the next unit within the active page.
    cursor: usize,
    /// Ring index of the active page.
    index: usize,
    /// Generation counter stored in every header we publish.
    page_id: u32,
    terminated: bool,
}

#[derive(Debug)]
pub enum WriteError {
    /// Mapping or flushing the backing file failed.
    Io(io::Error),
    /// The payload cannot fit a page even when it is the only unit.
    OversizeUnit(usize),
    /// The ring was already closed with the exit mark.
    Terminated,
}

impl PageWriter {
    pub fn new() -> Self {
        PageWriter {
            view: None,
            cursor: 0,
            index: 0,
            page_id: 0,
            terminated: false,
        }
    }

    /// Ring index of the page currently being appended to.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation of the page currently being appended to.
    pub fn page_id(&self) -> u32 {
        self.page_id
    }

    /// Append one unit tagged `func_id`.
    ///
    /// `fill` receives exactly the packed payload window, already reserved
    /// behind a written unit header. Once it returns, the page header is
    /// republished and the used prefix flushed, which is what makes the
    /// unit visible to the reader: the header store is a release, so a
    /// reader that observes the new count finds the complete unit behind
    /// it.
    pub fn append(
        &mut self,
        map: &FileMap,
        func_id: u16,
        payload_len: usize,
        fill: impl FnOnce(&mut [u8]),
    ) -> Result<(), WriteError> {
        if self.terminated {
            return Err(WriteError::Terminated);
        }

        let packed_len = packed(payload_len);
        if packed_len > MAX_UNIT_PAYLOAD {
            return Err(WriteError::OversizeUnit(payload_len));
        }
        let need = UNIT_HEADER_LEN + packed_len;

        // Units never straddle a page: rotate first when the remainder of
        // the active page cannot take this one whole.
        let mut view = match self.view.take() {
            Some(view) if self.cursor + need <= PAGE_SIZE => view,
            stale => self.next_page(map, stale)?,
        };

        let cursor = self.cursor;
        UnitHeader {
            packing_count: (packed_len / PACK) as u16,
            func_id,
        }
        .write_to(view.bytes_mut(cursor, UNIT_HEADER_LEN));
        fill(view.bytes_mut(cursor + UNIT_HEADER_LEN, packed_len));

        self.cursor = cursor + need;
        let view = self.view.insert(view);
        Self::publish(view, Activity::Active, self.cursor, self.page_id)
    }

    /// Seal the active page with the exit mark. Idempotent; the ring
    /// accepts no further appends afterwards.
    pub fn terminate(&mut self) -> Result<(), WriteError> {
        self.terminated = true;
        if let Some(view) = self.view.take() {
            Self::publish(&view, Activity::Terminated, self.cursor, self.page_id)?;
        }
        Ok(())
    }

    /// Seal the stale page (if any) and map the successor, fresh.
    fn next_page(
        &mut self,
        map: &FileMap,
        stale: Option<PageView>,
    ) -> Result<PageView, WriteError> {
        if let Some(old) = stale {
            Self::publish(&old, Activity::Closed, self.cursor, self.page_id)?;
            drop(old);
            self.index = (self.index + 1) % PAGE_COUNT;
            self.page_id = self.page_id.wrapping_add(1);
        }

        let view = map.view_write(self.index).map_err(WriteError::Io)?;
        self.cursor = PAGE_HEADER_LEN;
        // An empty header must be visible before any unit is: a reader that
        // adopts this page starts from a zero count, never from leftovers
        // of the lap before.
        Self::publish(&view, Activity::Active, self.cursor, self.page_id)?;
        Ok(view)
    }

    fn publish(
        view: &PageView,
        activity: Activity,
        cursor: usize,
        page_id: u32,
    ) -> Result<(), WriteError> {
        let header = PageHeader {
            activity,
            packing_count: ((cursor - PAGE_HEADER_LEN) / PACK) as u16,
            page_id,
        };

        // Payload stores above are sequenced before this release.
        view.header().store(header.encode(), Ordering::Release);
        view.flush_prefix(cursor).map_err(WriteError::Io)
    }
}

impl Default for PageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageWriter {
    fn drop(&mut self) {
        // Orderly exit mark for owners that never called terminate. The
        // flush is best effort here.
        let _ = self.terminate();
    }
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Io(err) => write!(f, "log file i/o failed: {err}"),
            WriteError::OversizeUnit(len) => {
                write!(f, "unit payload of {len} bytes cannot fit a page")
            }
            WriteError::Terminated => write!(f, "log already terminated"),
        }
    }
}

impl From<io::Error> for WriteError {
    fn from(err: io::Error) -> Self {
        WriteError::Io(err)
    }
}
