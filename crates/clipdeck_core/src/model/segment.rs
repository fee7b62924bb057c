//! Time-range segments.

use crate::collection::Ordered;
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-segment playback settings, inherited by split and merge results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSettings {
    /// Playback speed multiplier.
    pub playback_rate: f64,
    /// Whether the segment loops when played from the queue.
    pub loop_enabled: bool,
    /// Volume in `0.0..=1.0`.
    pub volume: f64,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            playback_rate: 1.0,
            loop_enabled: false,
            volume: 1.0,
        }
    }
}

/// A bookmarked time range of a video.
///
/// # Invariants
///
/// - `start_time` is finite and non-negative
/// - `end_time > start_time`
/// - `order` equals the segment's position within its project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment identity.
    pub id: EntityId,
    /// Owning project.
    pub project_id: EntityId,
    /// Display title.
    pub title: String,
    /// Free-form notes.
    pub description: String,
    /// Start of the range in seconds.
    pub start_time: f64,
    /// End of the range in seconds.
    pub end_time: f64,
    /// Tags, kept sorted.
    pub tags: BTreeSet<String>,
    /// Playback settings.
    pub settings: SegmentSettings,
    /// Position within the project.
    pub order: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    /// Creates a segment with a fresh id.
    ///
    /// `order` is left at zero; collections assign it on insert.
    pub fn new(
        project_id: EntityId,
        title: impl Into<String>,
        start_time: f64,
        end_time: f64,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        Self::validate_range(start_time, end_time)?;
        Ok(Self {
            id: EntityId::new(),
            project_id,
            title: title.into(),
            description: String::new(),
            start_time,
            end_time,
            tags: BTreeSet::new(),
            settings: SegmentSettings::default(),
            order: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Checks that `start..end` is a valid segment range.
    pub fn validate_range(start_time: f64, end_time: f64) -> CoreResult<()> {
        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(CoreError::invalid_argument(
                "segment bounds must be finite",
            ));
        }
        if start_time < 0.0 {
            return Err(CoreError::invalid_argument(format!(
                "segment start {start_time} is negative"
            )));
        }
        if end_time <= start_time {
            return Err(CoreError::invalid_argument(format!(
                "segment end {end_time} must be after start {start_time}"
            )));
        }
        Ok(())
    }

    /// Length of the range in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Returns true if `t` lies strictly inside the range.
    #[must_use]
    pub fn contains_interior(&self, t: f64) -> bool {
        self.start_time < t && t < self.end_time
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the playback settings.
    #[must_use]
    pub fn with_settings(mut self, settings: SegmentSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl Ordered for Segment {
    fn id(&self) -> EntityId {
        self.id
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}
