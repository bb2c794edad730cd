//! End-to-end scenarios over real backing files: rotation, wrap-around,
//! live following and orderly exit, all through the public facades.

use nabang::{Event, Level, LogReader, LogWriter, ReadResult};
use nabang_ring::{Activity, FileMap, PageHeader};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

fn scratch_log() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("to create a scratch directory");
    let path = dir.path().join("nabang.blog");
    (dir, path)
}

fn pull(reader: &mut LogReader) -> Option<(u16, Vec<u8>)> {
    let mut unit = None;
    match reader.read_once(|func_id, payload| unit = Some((func_id, payload.to_vec()))) {
        ReadResult::Delivered => unit,
        _ => None,
    }
}

fn page_header(path: &PathBuf, page: usize) -> Option<PageHeader> {
    let map = FileMap::open(path).expect("to reopen the backing file");
    let view = map.view_read(page).expect("to map a page");
    PageHeader::decode(view.header().load(Ordering::Acquire))
}

#[test]
fn rotation_under_a_trace_burst() {
    let (_dir, path) = scratch_log();
    let writer = LogWriter::create(&path).unwrap();

    // Each message is 100 bytes, so the burst spans several pages without
    // wrapping the ring.
    let padding = "x".repeat(94);
    for n in 0..5000 {
        writer.trace(Level::Info, format_args!("{n:05} {padding}"));
    }

    let mut reader = LogReader::open(&path);
    let mut seen = 0u32;
    while let Some((func_id, payload)) = pull(&mut reader) {
        match Event::parse(func_id, &payload).unwrap() {
            Event::Trace { message, level } => {
                assert_eq!(level, Level::Info);
                let n: u32 = message[..5].parse().unwrap();
                assert_eq!(n, seen, "events must arrive in append order");
                seen += 1;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(seen, 5000);

    // Every page up to the live one is sealed; the live one is still open;
    // the rest of the ring was never touched.
    let mut live = None;
    for page in 0..nabang_ring::PAGE_COUNT {
        match page_header(&path, page) {
            Some(header) if header.activity == Activity::Active => {
                assert_eq!(live, None, "a single page is active at a time");
                live = Some(page);
            }
            Some(header) => {
                assert_eq!(header.activity, Activity::Closed);
                assert_eq!(live, None, "sealed pages precede the live one");
            }
            None => {
                assert!(live.is_some(), "untouched pages follow the live one");
            }
        }
    }
    let live = live.expect("one page is live");
    assert!(live > 0, "5000 traces cannot fit a single page");
}

#[test]
fn wrap_around_loses_the_oldest_pages_silently() {
    let (_dir, path) = scratch_log();
    let writer = LogWriter::create(&path).unwrap();

    // 1004 bytes per unit: 65 units per page, 80 pages per lap. 7000 units
    // walk the ring one and a third times around.
    let padding = "v".repeat(987);
    for n in 0..7000 {
        writer.set_text("m", &format!("{n:06}{padding}"));
    }

    let mut reader = LogReader::open(&path);
    let mut delivered = vec![];
    while let Some((func_id, payload)) = pull(&mut reader) {
        match Event::parse(func_id, &payload).unwrap() {
            Event::SetText { name, value } => {
                assert_eq!(name, "m");
                delivered.push(value[..6].parse::<u32>().unwrap());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    // Pages 0 through the live index carry the current lap; everything the
    // ring already reclaimed is gone without notice. With 65 units a page
    // the second lap starts at unit 5200, and the newest page is the
    // 108th ever opened.
    let expected: Vec<u32> = (5200..7000).collect();
    assert_eq!(delivered, expected);
    assert_eq!(reader.page_id(), 107);

    let newest = (0..nabang_ring::PAGE_COUNT)
        .filter_map(|page| page_header(&path, page))
        .map(|header| header.page_id)
        .max();
    assert_eq!(newest, Some(107));
}

#[test]
fn reader_follows_a_live_writer() {
    let (_dir, path) = scratch_log();
    let writer = LogWriter::create(&path).unwrap();
    let mut reader = LogReader::open(&path);

    writer.stamp("first");
    assert!(pull(&mut reader).is_some());
    assert_eq!(reader.read_once(|_, _| ()), ReadResult::Pending);

    writer.add_value("laps", 1);
    let (func_id, payload) = pull(&mut reader).expect("the appended unit");
    assert_eq!(
        Event::parse(func_id, &payload),
        Ok(Event::AddValue {
            name: "laps",
            delta: 1
        })
    );
}

#[test]
fn orderly_exit_after_draining() {
    let (_dir, path) = scratch_log();
    let writer = LogWriter::create(&path).unwrap();
    writer.stamp("one");
    writer.stamp("two");
    writer.stamp("three");
    drop(writer);

    let mut reader = LogReader::open(&path);
    let mut names = vec![];
    while let Some((func_id, payload)) = pull(&mut reader) {
        match Event::parse(func_id, &payload).unwrap() {
            Event::Stamp { name, .. } => names.push(name.to_owned()),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(names, ["one", "two", "three"]);

    assert_eq!(reader.read_once(|_, _| ()), ReadResult::WriterExited);
    assert_eq!(reader.read_once(|_, _| ()), ReadResult::WriterExited);
}

#[test]
fn explicit_shutdown_matches_drop() {
    let (_dir, path) = scratch_log();
    let writer = LogWriter::create(&path).unwrap();
    writer.stamp("only");
    writer.terminate();
    // Recorders past the seal are dropped, not resurrected.
    writer.stamp("ignored");

    let mut reader = LogReader::open(&path);
    assert!(pull(&mut reader).is_some());
    assert_eq!(reader.read_once(|_, _| ()), ReadResult::WriterExited);
}
