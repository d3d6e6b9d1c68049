// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Drives and segment references.
//!
//! Recordings are laid out as one directory per segment, named
//! `<drive start time>--<segment index>`, e.g.
//! `2025-03-14--08-30-00--4/rlog`. Only the naming matters here; what is
//! inside a segment is an [`EventSource`](crate::source::EventSource)
//! concern.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use serde::{Deserialize, Serialize};

/// Format of the drive start time embedded in segment names.
pub const DRIVE_TIME_FORMAT: &str = "%Y-%m-%d--%H-%M-%S";

/// Length of a formatted drive start time.
pub const DRIVE_ID_LEN: usize = 20;

/// Opaque reference to one segment's recording.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentRef(String);

impl SegmentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Segment index, see [`segment_index_of`].
    pub fn index(&self) -> u32 {
        segment_index_of(&self.0)
    }

    /// Parent directory component, then the last component.
    fn name_candidates(&self) -> impl Iterator<Item = &str> {
        let parts: Vec<&str> = self.0.split('/').filter(|p| !p.is_empty()).collect();
        let n = parts.len();
        let parent = if n >= 2 { Some(parts[n - 2]) } else { None };
        let last = parts.last().copied();
        parent.into_iter().chain(last)
    }
}

impl fmt::Display for SegmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

fn trailing_index(name: &str) -> Option<u32> {
    let (_, tail) = name.rsplit_once("--")?;
    tail.parse().ok()
}

/// Numeric segment index: the trailing `--N` of the reference's parent
/// directory name, else of the reference itself, else 0.
pub fn segment_index_of(reference: &str) -> u32 {
    SegmentRef::new(reference)
        .name_candidates()
        .find_map(trailing_index)
        .unwrap_or(0)
}

/// Drive identifier: the drive's formatted start time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(String);

impl DriveId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive from a segment reference, using the first component whose
    /// 20-character prefix is a valid start time.
    pub fn from_segment_name(segment: &SegmentRef) -> Option<Self> {
        segment.name_candidates().find_map(|name| {
            let prefix: String = name.chars().take(DRIVE_ID_LEN).collect();
            NaiveDateTime::parse_from_str(&prefix, DRIVE_TIME_FORMAT)
                .ok()
                .map(|_| Self(prefix))
        })
    }

    /// Parsed start time, if the id is a formatted timestamp.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, DRIVE_TIME_FORMAT).ok()
    }

    /// Whether the drive started on or after `date`. Unparseable ids are
    /// never on or after anything.
    pub fn started_on_or_after(&self, date: NaiveDate) -> bool {
        self.start_time().map_or(false, |t| t.date() >= date)
    }
}

impl fmt::Display for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a drive's recordings can support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Run the steering intervention detector. Older recordings lack the
    /// torque channels it needs.
    pub steer_intervention_check: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            steer_intervention_check: true,
        }
    }
}

/// Passthrough identification copied into the statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

/// One trip: its segments in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct Drive {
    pub id: DriveId,
    segments: Vec<SegmentRef>,
    pub capabilities: Capabilities,
    pub metadata: DriveMetadata,
}

impl Drive {
    /// Create a drive; segments are sorted by index, then by reference.
    pub fn new(id: DriveId, segments: Vec<SegmentRef>) -> Self {
        let mut segments = segments;
        segments.sort_by(|a, b| a.index().cmp(&b.index()).then_with(|| a.cmp(b)));
        Self {
            id,
            segments,
            capabilities: Capabilities::default(),
            metadata: DriveMetadata::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_metadata(mut self, metadata: DriveMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Segments in ascending index order.
    pub fn segments(&self) -> &[SegmentRef] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// Group discovered segment references by drive, in drive id order.
///
/// References without a recognisable drive start time are skipped.
pub fn group_into_drives<I>(refs: I) -> Vec<Drive>
where
    I: IntoIterator<Item = SegmentRef>,
{
    let mut grouped: BTreeMap<DriveId, Vec<SegmentRef>> = BTreeMap::new();
    for segment in refs {
        match DriveId::from_segment_name(&segment) {
            Some(id) => grouped.entry(id).or_default().push(segment),
            None => warn!("Skipping segment {} with no drive start time", segment),
        }
    }
    grouped
        .into_iter()
        .map(|(id, segments)| Drive::new(id, segments))
        .collect()
}
