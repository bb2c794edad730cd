//! Follows the writer around the ring, one unit per call.

use std::sync::atomic::Ordering;

use crate::filemap::{FileMap, PageView};
use crate::page::{Activity, PageHeader, UnitHeader, PAGE_COUNT, PAGE_HEADER_LEN, UNIT_HEADER_LEN};

/// Outcome of a single [`PageReader::read_once`] poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadResult {
    /// Exactly one unit was handed to the callback.
    Delivered,
    /// Nothing to consume right now; poll again later.
    Pending,
    /// The writer sealed the ring with its exit mark. Terminal: every
    /// further poll repeats this.
    WriterExited,
    /// The backing file could never be opened. Produced by the facade, not
    /// by the page reader itself.
    NotFound,
}

/// Reader-side cursor over the ring.
///
/// Holds at most one page mapped, the page under inspection, and only
/// ever trusts bytes behind the packing count it last acquired from that
/// page's header.
pub struct PageReader {
    index: usize,
    view: Option<PageView>,
    /// Next unit offset within the current page.
    cursor: usize,
    /// Content extent advertised by the last header observation.
    content_len: usize,
    /// Last observed activity was `'+'`: the writer may still extend the
    /// page under us.
    busy: bool,
    /// Last observed activity was `'/'`: drain, then report the exit.
    last_page: bool,
    finished: bool,
    page_id: u32,
}

impl PageReader {
    pub fn new() -> Self {
        PageReader {
            index: 0,
            view: None,
            cursor: 0,
            content_len: 0,
            busy: false,
            last_page: false,
            finished: false,
            page_id: 0,
        }
    }

    /// Generation of the page under inspection.
    pub fn page_id(&self) -> u32 {
        self.page_id
    }

    /// Ring index of the page under inspection.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Consume at most one unit, passing `(func_id, payload)` to the
    /// callback. The payload borrow ends with the call.
    ///
    /// Never blocks; the mapping syscall is the only suspension point. A
    /// page that cannot be mapped right now reads as not-yet-written.
    pub fn read_once(
        &mut self,
        map: &FileMap,
        consume: impl FnOnce(u16, &[u8]),
    ) -> ReadResult {
        if self.finished {
            return ReadResult::WriterExited;
        }

        let mut hops = 0;
        loop {
            if self.view.is_none() {
                // Cold start, or a resync dropped the mapping: adopt the
                // page at the current index once it is initialized. Not
                // stepping forward here is what lets a reader that came up
                // before the writer catch page 0 later.
                if !self.load_page(map) {
                    return ReadResult::Pending;
                }
            }

            if self.cursor < self.content_len {
                break;
            }

            if self.busy {
                match self.recheck_busy_page() {
                    Recheck::Grown => continue,
                    Recheck::Unchanged => return ReadResult::Pending,
                    Recheck::Exited => {
                        self.finished = true;
                        return ReadResult::WriterExited;
                    }
                    Recheck::Lapped => return self.resync(map),
                }
            }

            if self.last_page {
                self.finished = true;
                return ReadResult::WriterExited;
            }

            // Sealed and fully drained: step to the successor. The ring
            // bound keeps a file of nothing but sealed pages from spinning
            // us forever.
            if hops == PAGE_COUNT {
                return ReadResult::Pending;
            }
            hops += 1;

            let prev_index = self.index;
            let prev_view = self.view.take();
            self.index = (self.index + 1) % PAGE_COUNT;
            if !self.load_page(map) {
                self.index = prev_index;
                self.view = prev_view;
                return ReadResult::Pending;
            }
        }

        let Some(view) = &self.view else {
            return ReadResult::Pending;
        };

        let unit = UnitHeader::read_from(view.bytes(self.cursor, UNIT_HEADER_LEN));
        let end = self.cursor + UNIT_HEADER_LEN + unit.payload_len();
        if end > self.content_len {
            // A unit past the advertised extent means the writer lapped us
            // and reclaimed this page mid-read.
            return self.resync(map);
        }

        consume(
            unit.func_id,
            view.bytes(self.cursor + UNIT_HEADER_LEN, unit.payload_len()),
        );
        self.cursor = end;
        ReadResult::Delivered
    }

    /// Re-read the header of a drained busy page.
    fn recheck_busy_page(&mut self) -> Recheck {
        let Some(view) = &self.view else {
            return Recheck::Lapped;
        };

        // Acquire pairs with the writer's release on every republish: any
        // count we observe has its payload bytes visible.
        let Some(header) = PageHeader::decode(view.header().load(Ordering::Acquire)) else {
            return Recheck::Lapped;
        };
        if header.page_id != self.page_id {
            return Recheck::Lapped;
        }

        self.busy = header.activity == Activity::Active;
        self.last_page = header.activity == Activity::Terminated;
        self.content_len = header.content_len();

        if self.cursor < self.content_len {
            Recheck::Grown
        } else if self.last_page {
            Recheck::Exited
        } else {
            Recheck::Unchanged
        }
    }

    /// Map the page at the current index and adopt it if initialized.
    fn load_page(&mut self, map: &FileMap) -> bool {
        let Ok(view) = map.view_read(self.index) else {
            return false;
        };
        let Some(header) = PageHeader::decode(view.header().load(Ordering::Acquire)) else {
            return false;
        };

        self.cursor = PAGE_HEADER_LEN;
        self.content_len = header.content_len();
        self.busy = header.activity == Activity::Active;
        self.last_page = header.activity == Activity::Terminated;
        self.page_id = header.page_id;
        self.view = Some(view);
        true
    }

    /// The writer reclaimed the page under us. Rebase onto whatever is at
    /// the current index now; the overwritten units are gone, silently, as
    /// the ring permits.
    fn resync(&mut self, map: &FileMap) -> ReadResult {
        self.view = None;
        let _ = self.load_page(map);
        ReadResult::Pending
    }
}

enum Recheck {
    /// New units appeared behind the cursor.
    Grown,
    /// Nothing new; the caller reports it and polls again later.
    Unchanged,
    /// The drained page carries the exit mark; no unit will ever follow.
    Exited,
    /// The page under us is not the page we were reading anymore.
    Lapped,
}

impl Default for PageReader {
    fn default() -> Self {
        Self::new()
    }
}
