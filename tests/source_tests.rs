// Engagement Gauge - Integration Tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! JSON-lines event source tests.

use std::fs;
use std::io::Write;
use std::path::Path;

use engagement_gauge::*;
use tempfile::TempDir;

const SEC: u64 = 1_000_000_000;

fn write_segment(root: &Path, reference: &str, events: &[Event]) {
    let path = root.join(reference);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = fs::File::create(path).unwrap();
    for event in events {
        writeln!(file, "{}", serde_json::to_string(event).unwrap()).unwrap();
    }
}

fn sample_events() -> Vec<Event> {
    vec![
        Event::car_params(0, true, "KIA_EV6"),
        Event::controls_state(0, true),
        Event::car_state(0, 12.0),
        Event::controls_state(SEC, true),
        Event::car_state(SEC, 12.0),
        Event::can(SEC, 1, 0x4F1, &[0, 0, 0, 0]),
    ]
}

#[test]
fn test_read_back_events() {
    let dir = TempDir::new().unwrap();
    let reference = "2025-03-14--08-30-00--0/events.jsonl";
    write_segment(dir.path(), reference, &sample_events());

    let source = JsonLinesSource::new(dir.path());
    let events: Vec<Event> = source
        .open(&SegmentRef::new(reference))
        .unwrap()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(events, sample_events());
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let source = JsonLinesSource::new(dir.path());
    let result = source.open(&SegmentRef::new("nope--0/events.jsonl"));
    assert!(matches!(result, Err(SegmentReadError::NotFound { .. })));
}

#[test]
fn test_empty_file_is_too_small() {
    let dir = TempDir::new().unwrap();
    let reference = "2025-03-14--08-30-00--0/events.jsonl";
    write_segment(dir.path(), reference, &[]);

    let source = JsonLinesSource::new(dir.path());
    let result = source.open(&SegmentRef::new(reference));
    assert!(matches!(result, Err(SegmentReadError::TooSmall { size: 0, .. })));
}

#[test]
fn test_corrupt_line_reported_with_position() {
    let dir = TempDir::new().unwrap();
    let reference = "2025-03-14--08-30-00--0/events.jsonl";
    write_segment(dir.path(), reference, &sample_events()[..2]);
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join(reference))
        .unwrap();
    writeln!(file, "{{\"mono_time_ns\": 5, \"kind\": {{\"type\": \"warp_drive\"}}}}").unwrap();

    let source = JsonLinesSource::new(dir.path());
    let items: Vec<_> = source.open(&SegmentRef::new(reference)).unwrap().collect();
    assert_eq!(items.len(), 3);
    assert!(matches!(items[2], Err(SegmentReadError::Corrupt { line: 3, .. })));
}

#[test]
fn test_oversized_can_payload_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let reference = "2025-03-14--08-30-00--0/events.jsonl";
    write_segment(dir.path(), reference, &sample_events()[..1]);
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join(reference))
        .unwrap();
    writeln!(
        file,
        "{{\"mono_time_ns\":5,\"kind\":{{\"type\":\"can_frame\",\"bus\":0,\"address\":1265,\"payload\":[1,2,3,4,5,6,7,8,9,10]}}}}"
    )
    .unwrap();

    let source = JsonLinesSource::new(dir.path());
    let items: Vec<_> = source.open(&SegmentRef::new(reference)).unwrap().collect();
    assert_eq!(items.len(), 2);
    match &items[1] {
        Err(SegmentReadError::Corrupt { line, reason, .. }) => {
            assert_eq!(*line, 2);
            assert!(reason.contains("at most 8 bytes"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_discover_and_analyze() {
    let dir = TempDir::new().unwrap();
    write_segment(dir.path(), "2025-03-14--08-30-00--1/events.jsonl", &sample_events());
    write_segment(dir.path(), "2025-03-14--08-30-00--0/events.jsonl", &sample_events());
    write_segment(dir.path(), "2025-03-14--09-00-00--0/events.jsonl", &sample_events());
    fs::write(dir.path().join("2025-03-14--09-00-00--0/notes.txt"), "ignored").unwrap();

    let source = JsonLinesSource::new(dir.path());
    let refs = source.discover().unwrap();
    assert_eq!(refs.len(), 3);

    let drives = group_into_drives(refs);
    assert_eq!(drives.len(), 2);
    assert_eq!(drives[0].segment_count(), 2);

    let analyzer = DriveAnalyzer::with_decoder(SignalDecoder::disabled());
    let stats = analyzer.analyze(&drives[0], &source, None);
    assert_eq!(stats.processed_segments, 2);
    assert_eq!(stats.active_time_ns, 2 * SEC);
    assert_eq!(stats.car_fingerprint.as_deref(), Some("KIA_EV6"));
    assert_eq!(stats.longitudinal_control, Some(true));
}

#[test]
fn test_corrupt_segment_skipped_in_analysis() {
    let dir = TempDir::new().unwrap();
    write_segment(dir.path(), "2025-03-14--08-30-00--0/events.jsonl", &sample_events());
    let bad = dir.path().join("2025-03-14--08-30-00--1/events.jsonl");
    fs::create_dir_all(bad.parent().unwrap()).unwrap();
    fs::write(&bad, "this is not json\n").unwrap();

    let source = JsonLinesSource::new(dir.path());
    let drives = group_into_drives(source.discover().unwrap());
    let analyzer = DriveAnalyzer::with_decoder(SignalDecoder::disabled());
    let stats = analyzer.analyze(&drives[0], &source, None);

    assert_eq!(stats.processed_segments, 1);
    assert_eq!(stats.skipped_segments.len(), 1);
    assert!(stats.skipped_segments[0].segment.ends_with("--1/events.jsonl"));
}
