//! Event tags and the payload codec shared by recorders and consumers.

use std::fmt;

use nabang_ring::{packed, PACK};

/// Event type tag. The wire values are fixed; reordering the variants would
/// change the file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuncId {
    Stamp = 0,
    ScopeBegin = 1,
    ScopeEnd = 2,
    Trace = 3,
    Valid = 4,
    SetText = 5,
    SetValue = 6,
    AddValue = 7,
}

impl FuncId {
    pub fn wire(self) -> u16 {
        self as u16
    }

    pub fn from_wire(wire: u16) -> Option<Self> {
        Some(match wire {
            0 => FuncId::Stamp,
            1 => FuncId::ScopeBegin,
            2 => FuncId::ScopeEnd,
            3 => FuncId::Trace,
            4 => FuncId::Valid,
            5 => FuncId::SetText,
            6 => FuncId::SetValue,
            7 => FuncId::AddValue,
            _ => return None,
        })
    }
}

/// Severity of a trace line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info = 0,
    Warn = 1,
    Error = 2,
}

impl Level {
    pub fn from_wire(wire: i32) -> Option<Self> {
        Some(match wire {
            0 => Level::Info,
            1 => Level::Warn,
            2 => Level::Error,
            _ => return None,
        })
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Level::Info => "<info>",
            Level::Warn => "<warn>",
            Level::Error => "<error>",
        }
    }
}

/// Packed slot a string occupies on the wire: length prefix, bytes, NUL.
pub(crate) fn str_slot(s: &str) -> usize {
    packed(2 + s.len() + 1)
}

/// Write a string field at `at`, zeroing the NUL and the packing slack.
/// Returns the offset just past the slot.
pub(crate) fn put_str(buf: &mut [u8], at: usize, s: &str) -> usize {
    let bytes = s.as_bytes();
    let end = at + str_slot(s);
    buf[at..at + 2].copy_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf[at + 2..at + 2 + bytes.len()].copy_from_slice(bytes);
    buf[at + 2 + bytes.len()..end].fill(0);
    end
}

pub(crate) fn put_i32(buf: &mut [u8], at: usize, value: i32) -> usize {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    at + 4
}

pub(crate) fn put_i64(buf: &mut [u8], at: usize, value: i64) -> usize {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
    at + 8
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The payload ended before the field did.
    Truncated,
    /// A string field held bytes that are not UTF-8.
    NotUtf8,
    /// The unit carried a tag this build does not know.
    UnknownTag(u16),
    /// A trace unit carried a level outside the known range.
    BadLevel(i32),
}

/// Cursor over a unit payload, advancing field by field.
///
/// Fields sit at packed offsets; strings advance by their whole slot
/// including the NUL and the slack, so the next field starts aligned.
pub struct Payload<'a> {
    rest: &'a [u8],
}

impl<'a> Payload<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Payload { rest: payload }
    }

    pub fn take_i32(&mut self) -> Result<i32, ParseError> {
        let (field, rest) = self.split(PACK)?;
        self.rest = rest;
        Ok(i32::from_le_bytes([field[0], field[1], field[2], field[3]]))
    }

    pub fn take_i64(&mut self) -> Result<i64, ParseError> {
        let (field, rest) = self.split(8)?;
        self.rest = rest;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(field);
        Ok(i64::from_le_bytes(bytes))
    }

    pub fn take_str(&mut self) -> Result<&'a str, ParseError> {
        let (prefix, _) = self.split(2)?;
        let len = usize::from(u16::from_le_bytes([prefix[0], prefix[1]]));
        let (slot, rest) = self.split(packed(2 + len + 1))?;
        let text = core::str::from_utf8(&slot[2..2 + len]).map_err(|_| ParseError::NotUtf8)?;
        self.rest = rest;
        Ok(text)
    }

    fn split(&self, len: usize) -> Result<(&'a [u8], &'a [u8]), ParseError> {
        if self.rest.len() < len {
            return Err(ParseError::Truncated);
        }
        Ok(self.rest.split_at(len))
    }
}

/// One decoded log event, borrowing its strings from the payload buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    Stamp { name: &'a str, timestamp_ns: i64 },
    ScopeBegin { name: &'a str, timestamp_ns: i64 },
    ScopeEnd { name: &'a str, timestamp_ns: i64 },
    Trace { message: &'a str, level: Level },
    Valid { message: &'a str, key: i32 },
    SetText { name: &'a str, value: &'a str },
    SetValue { name: &'a str, value: i32 },
    AddValue { name: &'a str, delta: i32 },
}

impl<'a> Event<'a> {
    pub fn parse(func_id: u16, payload: &'a [u8]) -> Result<Self, ParseError> {
        let id = FuncId::from_wire(func_id).ok_or(ParseError::UnknownTag(func_id))?;
        let mut p = Payload::new(payload);

        Ok(match id {
            FuncId::Stamp => Event::Stamp {
                name: p.take_str()?,
                timestamp_ns: p.take_i64()?,
            },
            FuncId::ScopeBegin => Event::ScopeBegin {
                name: p.take_str()?,
                timestamp_ns: p.take_i64()?,
            },
            FuncId::ScopeEnd => Event::ScopeEnd {
                name: p.take_str()?,
                timestamp_ns: p.take_i64()?,
            },
            FuncId::Trace => {
                let message = p.take_str()?;
                let level = p.take_i32()?;
                Event::Trace {
                    message,
                    level: Level::from_wire(level).ok_or(ParseError::BadLevel(level))?,
                }
            }
            FuncId::Valid => Event::Valid {
                message: p.take_str()?,
                key: p.take_i32()?,
            },
            FuncId::SetText => Event::SetText {
                name: p.take_str()?,
                value: p.take_str()?,
            },
            FuncId::SetValue => Event::SetValue {
                name: p.take_str()?,
                value: p.take_i32()?,
            },
            FuncId::AddValue => Event::AddValue {
                name: p.take_str()?,
                delta: p.take_i32()?,
            },
        })
    }
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Stamp { name, timestamp_ns } => write!(f, "[stamp] {name} @{timestamp_ns}ns"),
            Event::ScopeBegin { name, timestamp_ns } => {
                write!(f, "[scope] {name} begin @{timestamp_ns}ns")
            }
            Event::ScopeEnd { name, timestamp_ns } => {
                write!(f, "[scope] {name} end @{timestamp_ns}ns")
            }
            Event::Trace { message, level } => write!(f, "{} {message}", level.prefix()),
            Event::Valid { message, key } => write!(f, "<valid:{key}> {message}"),
            Event::SetText { name, value } => write!(f, "[set] {name} = {value:?}"),
            Event::SetValue { name, value } => write!(f, "[set] {name} = {value}"),
            Event::AddValue { name, delta } => write!(f, "[add] {name} += {delta}"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Truncated => write!(f, "payload ended mid-field"),
            ParseError::NotUtf8 => write!(f, "string field is not UTF-8"),
            ParseError::UnknownTag(tag) => write!(f, "unknown event tag {tag}"),
            ParseError::BadLevel(level) => write!(f, "unknown trace level {level}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_i64_round_trip() {
        let mut buf = vec![0u8; str_slot("checkpoint") + 8];
        let at = put_str(&mut buf, 0, "checkpoint");
        put_i64(&mut buf, at, -7_000_000_001);

        let mut p = Payload::new(&buf);
        assert_eq!(p.take_str(), Ok("checkpoint"));
        assert_eq!(p.take_i64(), Ok(-7_000_000_001));
    }

    #[test]
    fn string_slot_keeps_nul_and_alignment() {
        // "abc": prefix 2 + bytes 3 + NUL 1 = 6, packed to 8.
        assert_eq!(str_slot("abc"), 8);

        let mut buf = vec![0xffu8; 8];
        put_str(&mut buf, 0, "abc");
        assert_eq!(&buf, &[3, 0, b'a', b'b', b'c', 0, 0, 0]);
    }

    #[test]
    fn two_string_payload() {
        let mut buf = vec![0u8; str_slot("mode") + str_slot("fast")];
        let at = put_str(&mut buf, 0, "mode");
        put_str(&mut buf, at, "fast");

        let event = Event::parse(FuncId::SetText.wire(), &buf).unwrap();
        assert_eq!(
            event,
            Event::SetText {
                name: "mode",
                value: "fast"
            }
        );
    }

    #[test]
    fn trace_levels_parse() {
        for (wire, level) in [(0, Level::Info), (1, Level::Warn), (2, Level::Error)] {
            let mut buf = vec![0u8; str_slot("msg") + 4];
            let at = put_str(&mut buf, 0, "msg");
            put_i32(&mut buf, at, wire);

            assert_eq!(
                Event::parse(FuncId::Trace.wire(), &buf),
                Ok(Event::Trace {
                    message: "msg",
                    level
                })
            );
        }

        let mut buf = vec![0u8; str_slot("msg") + 4];
        let at = put_str(&mut buf, 0, "msg");
        put_i32(&mut buf, at, 9);
        assert_eq!(
            Event::parse(FuncId::Trace.wire(), &buf),
            Err(ParseError::BadLevel(9))
        );
    }

    #[test]
    fn wire_tags_are_pinned() {
        let tags = [
            (FuncId::Stamp, 0),
            (FuncId::ScopeBegin, 1),
            (FuncId::ScopeEnd, 2),
            (FuncId::Trace, 3),
            (FuncId::Valid, 4),
            (FuncId::SetText, 5),
            (FuncId::SetValue, 6),
            (FuncId::AddValue, 7),
        ];
        for (id, wire) in tags {
            assert_eq!(id.wire(), wire);
            assert_eq!(FuncId::from_wire(wire), Some(id));
        }
        assert_eq!(FuncId::from_wire(8), None);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert_eq!(
            Event::parse(FuncId::Stamp.wire(), &[]),
            Err(ParseError::Truncated)
        );

        // Length prefix promises more bytes than the payload has.
        let mut buf = vec![0u8; 8];
        buf[0..2].copy_from_slice(&100u16.to_le_bytes());
        assert_eq!(
            Event::parse(FuncId::Stamp.wire(), &buf),
            Err(ParseError::Truncated)
        );

        assert_eq!(Event::parse(42, &[]), Err(ParseError::UnknownTag(42)));
    }
}
