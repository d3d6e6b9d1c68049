// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Event sources.
//!
//! The core never touches recording containers. A source hands it one
//! decoded [`Event`] at a time for a given segment; any error, at open time
//! or mid-stream, means the segment is skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::drive::SegmentRef;
use crate::error::SegmentReadError;
use crate::event::Event;

/// Decoded events of one segment, in file order.
pub type EventStream<'a> = Box<dyn Iterator<Item = Result<Event, SegmentReadError>> + 'a>;

/// Supplier of per-segment event streams.
pub trait EventSource {
    /// Open a segment for reading.
    fn open(&self, segment: &SegmentRef) -> Result<EventStream<'_>, SegmentReadError>;
}

/// In-memory source, mainly for tests and generated scenarios.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    segments: BTreeMap<SegmentRef, Vec<Event>>,
    unreadable: BTreeSet<SegmentRef>,
    fail_after: BTreeMap<SegmentRef, usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a segment's events.
    pub fn insert(&mut self, segment: SegmentRef, events: Vec<Event>) {
        self.segments.insert(segment, events);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_segment(mut self, segment: SegmentRef, events: Vec<Event>) -> Self {
        self.insert(segment, events);
        self
    }

    /// Make `open` fail for this segment.
    pub fn mark_unreadable(&mut self, segment: SegmentRef) {
        self.unreadable.insert(segment);
    }

    /// Make the stream fail after yielding `events` events.
    pub fn fail_after(&mut self, segment: SegmentRef, events: usize) {
        self.fail_after.insert(segment, events);
    }

    pub fn events(&self, segment: &SegmentRef) -> Option<&[Event]> {
        self.segments.get(segment).map(|e| e.as_slice())
    }

    pub fn segment_refs(&self) -> impl Iterator<Item = &SegmentRef> {
        self.segments.keys()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl EventSource for MemorySource {
    fn open(&self, segment: &SegmentRef) -> Result<EventStream<'_>, SegmentReadError> {
        if self.unreadable.contains(segment) {
            return Err(SegmentReadError::Io {
                segment: segment.to_string(),
                reason: "segment marked unreadable".to_string(),
            });
        }
        let events = self
            .segments
            .get(segment)
            .ok_or_else(|| SegmentReadError::NotFound {
                segment: segment.to_string(),
            })?;

        match self.fail_after.get(segment).copied() {
            Some(limit) => {
                let name = segment.to_string();
                let good = events.iter().take(limit).cloned().map(Ok);
                let failure = std::iter::once(Err(SegmentReadError::Corrupt {
                    segment: name,
                    line: limit + 1,
                    reason: "stream truncated".to_string(),
                }));
                Ok(Box::new(good.chain(failure)))
            }
            None => Ok(Box::new(events.iter().cloned().map(Ok))),
        }
    }
}

/// File extension of segment files read by [`JsonLinesSource`].
pub const JSON_LINES_EXT: &str = "jsonl";

/// Reads segments stored as one JSON-encoded [`Event`] per line.
///
/// Segment references are paths relative to the root directory.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    root: PathBuf,
}

impl JsonLinesSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, segment: &SegmentRef) -> PathBuf {
        self.root.join(segment.as_str())
    }

    /// List `<dir>/<file>.jsonl` references one level below the root,
    /// sorted.
    pub fn discover(&self) -> Result<Vec<SegmentRef>, SegmentReadError> {
        let root_name = self.root.display().to_string();
        let io_err = |reason: std::io::Error| SegmentReadError::Io {
            segment: root_name.clone(),
            reason: reason.to_string(),
        };

        let mut refs = Vec::new();
        for dir in fs::read_dir(&self.root).map_err(io_err)? {
            let dir = dir.map_err(io_err)?;
            if !dir.path().is_dir() {
                continue;
            }
            let dir_name = dir.file_name().to_string_lossy().into_owned();
            for file in fs::read_dir(dir.path()).map_err(io_err)? {
                let path = file.map_err(io_err)?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(JSON_LINES_EXT) {
                    continue;
                }
                if let Some(file_name) = path.file_name().and_then(|f| f.to_str()) {
                    refs.push(SegmentRef::new(format!("{}/{}", dir_name, file_name)));
                }
            }
        }
        refs.sort();
        Ok(refs)
    }
}

impl EventSource for JsonLinesSource {
    fn open(&self, segment: &SegmentRef) -> Result<EventStream<'_>, SegmentReadError> {
        let path = self.path_of(segment);
        let name = segment.to_string();

        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SegmentReadError::NotFound {
                segment: name.clone(),
            },
            _ => SegmentReadError::Io {
                segment: name.clone(),
                reason: e.to_string(),
            },
        })?;
        if metadata.len() == 0 {
            return Err(SegmentReadError::TooSmall {
                segment: name,
                size: 0,
            });
        }

        let file = File::open(&path).map_err(|e| SegmentReadError::Io {
            segment: name.clone(),
            reason: e.to_string(),
        })?;

        let lines = BufReader::new(file).lines().enumerate();
        let stream = lines.filter_map(move |(idx, line)| match line {
            Err(e) => Some(Err(SegmentReadError::Io {
                segment: name.clone(),
                reason: e.to_string(),
            })),
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(serde_json::from_str::<Event>(&line).map_err(|e| {
                SegmentReadError::Corrupt {
                    segment: name.clone(),
                    line: idx + 1,
                    reason: e.to_string(),
                }
            })),
        });
        Ok(Box::new(stream))
    }
}
