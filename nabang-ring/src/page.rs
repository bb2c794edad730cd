//! On-disk framing: page geometry, headers, packing.

/// Quantum to which every payload length rounds up.
pub const PACK: usize = 4;

/// One page of the ring.
pub const PAGE_SIZE: usize = 4096 * 16;

/// Pages in the ring.
pub const PAGE_COUNT: usize = 80;

/// Exact size of the backing file.
pub const FILE_SIZE: usize = PAGE_SIZE * PAGE_COUNT;

pub const PAGE_HEADER_LEN: usize = 8;
pub const UNIT_HEADER_LEN: usize = 4;

/// Largest packed payload a single unit can carry without straddling a page.
pub const MAX_UNIT_PAYLOAD: usize = PAGE_SIZE - PAGE_HEADER_LEN - UNIT_HEADER_LEN;

/// Round `n` up to the next multiple of [`PACK`].
pub const fn packed(n: usize) -> usize {
    (n + PACK - 1) / PACK * PACK
}

/// Lifecycle code of a page, the second header byte on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    /// `'+'`: the writer is appending to this page.
    Active,
    /// `'-'`: the writer rotated away; the bytes are frozen until the ring
    /// wraps back around.
    Closed,
    /// `'/'`: the writer exited in an orderly fashion; this is the last
    /// page it will ever touch.
    Terminated,
}

impl Activity {
    fn code(self) -> u8 {
        match self {
            Activity::Active => b'+',
            Activity::Closed => b'-',
            Activity::Terminated => b'/',
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            b'+' => Some(Activity::Active),
            b'-' => Some(Activity::Closed),
            b'/' => Some(Activity::Terminated),
            _ => None,
        }
    }
}

/// The 8-byte header at the start of every initialized page.
///
/// Encoded as a single aligned 64-bit word so the writer can publish it with
/// one release store and the reader can observe it with one acquire load.
/// The byte layout within the word is fixed: sentinel, activity code, then
/// the little-endian packing count and page id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageHeader {
    pub activity: Activity,
    /// Packing units occupied by the unit region, excluding this header.
    pub packing_count: u16,
    /// Generation counter; ticks once per rotation, never resets.
    pub page_id: u32,
}

impl PageHeader {
    /// Sentinel marking a page as initialized.
    pub const CODE: u8 = b'#';

    pub fn encode(self) -> u64 {
        let mut bytes = [0u8; PAGE_HEADER_LEN];
        bytes[0] = Self::CODE;
        bytes[1] = self.activity.code();
        bytes[2..4].copy_from_slice(&self.packing_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.page_id.to_le_bytes());
        u64::from_ne_bytes(bytes)
    }

    /// Decode a header word. `None` for anything that is not an initialized
    /// page: wrong sentinel, or an activity code this layout does not know.
    pub fn decode(word: u64) -> Option<Self> {
        let bytes = word.to_ne_bytes();
        if bytes[0] != Self::CODE {
            return None;
        }
        Some(PageHeader {
            activity: Activity::from_code(bytes[1])?,
            packing_count: u16::from_le_bytes([bytes[2], bytes[3]]),
            page_id: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// Byte extent of the in-use content, clamped to the page so a corrupt
    /// count can never send a cursor out of bounds.
    pub fn content_len(&self) -> usize {
        (PAGE_HEADER_LEN + PACK * usize::from(self.packing_count)).min(PAGE_SIZE)
    }
}

/// The 4-byte header in front of every unit payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitHeader {
    /// Payload size in packing units.
    pub packing_count: u16,
    /// Event type tag; opaque at this layer.
    pub func_id: u16,
}

impl UnitHeader {
    pub fn write_to(self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&self.packing_count.to_le_bytes());
        buf[2..4].copy_from_slice(&self.func_id.to_le_bytes());
    }

    pub fn read_from(buf: &[u8]) -> Self {
        UnitHeader {
            packing_count: u16::from_le_bytes([buf[0], buf[1]]),
            func_id: u16::from_le_bytes([buf[2], buf[3]]),
        }
    }

    pub fn payload_len(&self) -> usize {
        PACK * usize::from(self.packing_count)
    }
}

#[test]
fn packed_laws() {
    for n in 0..64 {
        let p = packed(n);
        assert!(p >= n);
        assert_eq!(p % PACK, 0);
        assert_eq!(packed(p), p);
    }
    assert_eq!(packed(0), 0);
    assert_eq!(packed(1), 4);
    assert_eq!(packed(4), 4);
    assert_eq!(packed(5), 8);
}

#[test]
fn page_header_codec() {
    let header = PageHeader {
        activity: Activity::Active,
        packing_count: 0x1234,
        page_id: 0xdead_beef,
    };

    let word = header.encode();
    assert_eq!(PageHeader::decode(word), Some(header));

    let bytes = word.to_ne_bytes();
    assert_eq!(bytes[0], b'#');
    assert_eq!(bytes[1], b'+');
    assert_eq!(bytes[2..4], 0x1234u16.to_le_bytes());
    assert_eq!(bytes[4..8], 0xdead_beefu32.to_le_bytes());
}

#[test]
fn page_header_rejects_uninitialized() {
    assert_eq!(PageHeader::decode(0), None);

    let mut bytes = [0u8; 8];
    bytes[0] = b'#';
    bytes[1] = b'?';
    assert_eq!(PageHeader::decode(u64::from_ne_bytes(bytes)), None);
}

#[test]
fn content_len_is_clamped() {
    let header = PageHeader {
        activity: Activity::Closed,
        packing_count: u16::MAX,
        page_id: 0,
    };
    assert_eq!(header.content_len(), PAGE_SIZE);
}

#[test]
fn unit_header_codec() {
    let header = UnitHeader {
        packing_count: 3,
        func_id: 7,
    };

    let mut buf = [0u8; UNIT_HEADER_LEN];
    header.write_to(&mut buf);
    assert_eq!(UnitHeader::read_from(&buf), header);
    assert_eq!(header.payload_len(), 12);
}
