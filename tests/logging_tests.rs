// Engagement Gauge - Integration Tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Diagnostics emitted while analyzing a drive.

use std::sync::Mutex;

use engagement_gauge::profile::ODOMETER;
use engagement_gauge::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

const SEC: u64 = 1_000_000_000;
const ODO_ADDR: u32 = 0x100;

// ============================================================================
// Capturing logger
// ============================================================================

struct CaptureLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    lines: Mutex::new(Vec::new()),
};

fn install_logger() {
    // Already installed by another test in this binary
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);
}

fn captured(needle: &str) -> Vec<(Level, String)> {
    LOGGER
        .lines
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, line)| line.contains(needle))
        .cloned()
        .collect()
}

fn analyzer() -> DriveAnalyzer {
    let profile = VehicleProfile::new("test_car", "test_car.dbc")
        .with_message(
            MessageDef::new("ODOMETER", ODO_ADDR, 4)
                .with_signal(SignalDef::new("ODO_M", 0, 32).scaled(0.001, 0.0)),
        )
        .bind(ODOMETER, SignalDescriptor::new("ODOMETER", "ODO_M"));
    let decoder = SignalDecoder::configure(&profile).unwrap();
    DriveAnalyzer::new(GaugeConfig::default(), decoder).unwrap()
}

fn odo(t: u64, meters: u32) -> Event {
    Event::can(t, 0, ODO_ADDR, &meters.to_le_bytes())
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_rejected_odometer_logged_with_segment() {
    install_logger();
    let drive_id = "2025-04-01--06-00-00";
    let segment = SegmentRef::new(format!("{}--0/rlog", drive_id));
    let drive = Drive::new(DriveId::new(drive_id), vec![segment.clone()]);
    let source = MemorySource::new().with_segment(
        segment,
        vec![
            Event::controls_state(0, true),
            odo(0, 50_000),
            odo(SEC, 49_000),
            Event::controls_state(SEC, true),
        ],
    );

    analyzer().analyze(&drive, &source, None);

    let lines = captured("rejected odometer delta");
    let line = lines
        .iter()
        .find(|(_, line)| line.contains(drive_id))
        .expect("rejected delta should be logged");
    assert_eq!(line.0, Level::Trace);
    assert!(line.1.contains(&format!("{}--0/rlog", drive_id)));
}

#[test]
fn test_undersized_payload_logged_with_segment() {
    install_logger();
    let drive_id = "2025-04-01--07-00-00";
    let segment = SegmentRef::new(format!("{}--0/rlog", drive_id));
    let drive = Drive::new(DriveId::new(drive_id), vec![segment.clone()]);
    let source = MemorySource::new().with_segment(
        segment,
        vec![
            Event::controls_state(0, true),
            Event::can(SEC / 2, 0, ODO_ADDR, &[1, 2]),
            // Unbound address: silently ignored
            Event::can(SEC / 2, 0, 0x7FF, &[1, 2]),
            Event::controls_state(SEC, true),
        ],
    );

    let stats = analyzer().analyze(&drive, &source, None);
    assert_eq!(stats.processed_segments, 1);
    assert_eq!(stats.odo_distance, None);

    let lines: Vec<_> = captured("undersized payload")
        .into_iter()
        .filter(|(_, line)| line.contains(drive_id))
        .collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].1.contains("0x100"));
    assert!(lines[0].1.contains(&format!("{}--0/rlog", drive_id)));
}
