// Gauge Testdata - Segment writer
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Writes generated drives to disk in the layout read by
//! `JsonLinesSource`, plus a manifest describing what was generated.

use crate::generator::{ExpectedCounters, GeneratedDrive};
use crate::scenario::DriveScenario;
use engagement_gauge::SegmentRef;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors while writing a dataset.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Description of a written drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveManifest {
    pub drive_id: String,
    pub segments: Vec<SegmentRef>,
    pub scenario: DriveScenario,
    pub expected: ExpectedCounters,
}

impl DriveManifest {
    pub fn from_generated(generated: &GeneratedDrive) -> Self {
        Self {
            drive_id: generated.drive.id.to_string(),
            segments: generated.drive.segments().to_vec(),
            scenario: generated.scenario.clone(),
            expected: generated.expected.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, WriteError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Write every segment as one JSON event per line under `root`.
///
/// Unreadable segments are written as empty files.
pub fn write_json_lines(
    generated: &GeneratedDrive,
    root: &Path,
) -> Result<Vec<SegmentRef>, WriteError> {
    let mut written = Vec::with_capacity(generated.drive.segment_count());
    for segment in generated.drive.segments() {
        let path = root.join(segment.as_str());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);

        if generated.scenario.is_readable(segment.index()) {
            for event in generated.events(segment).unwrap_or_default() {
                serde_json::to_writer(&mut out, event)?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()?;
        written.push(segment.clone());
    }
    Ok(written)
}

/// Write the drive's manifest as pretty JSON.
pub fn write_manifest(generated: &GeneratedDrive, path: &Path) -> Result<(), WriteError> {
    let manifest = DriveManifest::from_generated(generated);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}
