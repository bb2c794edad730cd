//! The backing file and per-page shared views into it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::AtomicU64;

use memmap2::{MmapOptions, MmapRaw};

use crate::page::{FILE_SIZE, PAGE_COUNT, PAGE_SIZE};

/// Owns the OS handle to the backing file.
///
/// The handle outlives every [`PageView`] handed out; views are independent
/// mappings and may be dropped in any order before it.
pub struct FileMap {
    file: File,
}

impl FileMap {
    /// Create (or truncate) the backing file at its fixed size and open it
    /// for writing. Contents of a previous run are discarded.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(FILE_SIZE as u64)?;
        Ok(FileMap { file })
    }

    /// Open an existing backing file read-only.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(FileMap {
            file: File::open(path)?,
        })
    }

    /// Map one page for writing.
    pub fn view_write(&self, page: usize) -> io::Result<PageView> {
        assert!(page < PAGE_COUNT);
        let map = MmapOptions::new()
            .offset((PAGE_SIZE * page) as u64)
            .len(PAGE_SIZE)
            .map_raw(&self.file)?;
        Ok(PageView { map })
    }

    /// Map one page for reading. The view aliases whatever the writer
    /// process maps over the same range; writing through it is a fault.
    pub fn view_read(&self, page: usize) -> io::Result<PageView> {
        assert!(page < PAGE_COUNT);
        let map = MmapOptions::new()
            .offset((PAGE_SIZE * page) as u64)
            .len(PAGE_SIZE)
            .map_raw_read_only(&self.file)?;
        Ok(PageView { map })
    }
}

/// A single page of the ring, mapped shared into this address space.
///
/// The mapping is released on drop. Byte accessors are bounds-checked
/// against the page; the header word doubles as the cross-process
/// synchronization point.
pub struct PageView {
    map: MmapRaw,
}

impl PageView {
    /// The page header as an atomic word.
    ///
    /// All publication runs through this: the writer stores the encoded
    /// header with release ordering after the payload bytes are in place,
    /// the reader loads it with acquire ordering before touching any byte
    /// the count advertises.
    pub fn header(&self) -> &AtomicU64 {
        // Safety: the mapping starts at a page-aligned file offset and the
        // kernel returns page-aligned addresses, so the first 8 bytes are
        // aligned for u64. The word may be aliased by the peer process,
        // which is exactly what the atomic type admits. The mapping is held
        // by `self`, so the reference cannot outlive it.
        unsafe { &*(self.map.as_mut_ptr() as *const AtomicU64) }
    }

    /// Borrow `len` bytes at `offset` within the page.
    pub(crate) fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset <= PAGE_SIZE && len <= PAGE_SIZE - offset);
        // Safety: in-bounds per the assert, and the mapping lives as long
        // as `self`. Concurrent writer stores to these offsets are excluded
        // by the protocol: the reader only asks for bytes behind a header
        // count it already acquired.
        unsafe { core::slice::from_raw_parts(self.map.as_mut_ptr().add(offset), len) }
    }

    /// Mutably borrow `len` bytes at `offset`. Writer-side views only.
    pub(crate) fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset <= PAGE_SIZE && len <= PAGE_SIZE - offset);
        // Safety: in-bounds per the assert; `&mut self` makes this the only
        // borrow on our side, and the peer process only reads bytes already
        // published through the header word.
        unsafe { core::slice::from_raw_parts_mut(self.map.as_mut_ptr().add(offset), len) }
    }

    /// Ask the kernel to write the used prefix of the page back to the
    /// file, without waiting for it.
    pub fn flush_prefix(&self, len: usize) -> io::Result<()> {
        assert!(len <= PAGE_SIZE);
        self.map.flush_async_range(0, len)
    }
}
