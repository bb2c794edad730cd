//! The shared-memory page ring underneath the instrumentation log.
//!
//! One writer process appends variable-length units into a fixed-size,
//! memory-mapped backing file laid out as a ring of pages. A reader process
//! maps the same file and follows along. There is no kernel lock across the
//! process boundary: each page carries an 8-byte header that the writer
//! republishes with release ordering after every append, and the reader
//! re-reads with acquire ordering, so any unit behind an observed header is
//! complete.
//!
//! Higher level concerns (what a unit's payload means, who owns the
//! singleton handles, how a viewer renders events) live in the `nabang`
//! crate. This crate only knows bytes, pages and the lifecycle codes.

mod filemap;
mod page;
mod reader;
mod writer;


pub use filemap::{FileMap, PageView};
pub use page::{
    packed, Activity, PageHeader, UnitHeader, FILE_SIZE, MAX_UNIT_PAYLOAD, PACK, PAGE_COUNT,
    PAGE_HEADER_LEN, PAGE_SIZE, UNIT_HEADER_LEN,
};
pub use reader::{PageReader, ReadResult};
pub use writer::{PageWriter, WriteError};
