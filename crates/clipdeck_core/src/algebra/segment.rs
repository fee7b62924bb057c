//! Split, merge, duplicate and reorder over segments.

use crate::collection::{CollectionChange, Edit, OrderedCollection};
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::Segment;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Separator placed between titles of merged segments.
pub const MERGED_TITLE_SEPARATOR: &str = " + ";

/// Suffix appended to a duplicated segment's title.
pub const COPY_SUFFIX: &str = " (copy)";

fn require<'a>(segments: &'a OrderedCollection<Segment>, id: EntityId) -> CoreResult<&'a Segment> {
    segments.get(id).ok_or(CoreError::NotFound { id })
}

/// Splits segment `id` at `at_time`.
///
/// The first part keeps the original start and ends at `at_time`; the
/// second starts at `at_time` and keeps the original end. Both inherit
/// description, tags and settings, get fresh ids, and take the original's
/// position and the one right after it.
///
/// # Errors
///
/// `InvalidArgument` unless `start_time < at_time < end_time`.
pub fn split(
    segments: &OrderedCollection<Segment>,
    id: EntityId,
    at_time: f64,
    now: DateTime<Utc>,
) -> CoreResult<Edit<Segment>> {
    let original = require(segments, id)?;
    if !original.contains_interior(at_time) {
        return Err(CoreError::invalid_argument(format!(
            "split point {at_time} must lie strictly inside {}..{}",
            original.start_time, original.end_time
        )));
    }

    let part = |suffix: u8, start_time: f64, end_time: f64| Segment {
        id: EntityId::new(),
        title: format!("{} (part {suffix})", original.title),
        start_time,
        end_time,
        created_at: now,
        updated_at: now,
        ..original.clone()
    };
    let first = part(1, original.start_time, at_time);
    let second = part(2, at_time, original.end_time);

    let at = original.order as usize;
    Edit::new(
        segments,
        CollectionChange::Splice {
            remove: vec![id],
            insert: vec![first, second],
            at,
        },
    )
}

/// Merges `ids` into one segment.
///
/// Inputs are sorted by start time. The result spans from the first
/// start to the end of the last (in start order); its title joins the
/// input titles, its tags are the union, and it takes the smallest order
/// index among the inputs.
///
/// # Errors
///
/// `InvalidArgument` for fewer than two distinct ids or inputs from
/// different projects; `NotFound` for unknown ids.
pub fn merge(
    segments: &OrderedCollection<Segment>,
    ids: &[EntityId],
    now: DateTime<Utc>,
) -> CoreResult<Edit<Segment>> {
    let distinct: HashSet<EntityId> = ids.iter().copied().collect();
    if distinct.len() != ids.len() {
        return Err(CoreError::invalid_argument("merge lists a segment twice"));
    }
    if ids.len() < 2 {
        return Err(CoreError::invalid_argument(
            "merge needs at least two segments",
        ));
    }

    let mut inputs = ids
        .iter()
        .map(|id| require(segments, *id))
        .collect::<CoreResult<Vec<&Segment>>>()?;

    let project_id = inputs[0].project_id;
    if inputs.iter().any(|s| s.project_id != project_id) {
        return Err(CoreError::invalid_argument(
            "merged segments must belong to the same project",
        ));
    }

    inputs.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    let first = inputs[0];
    let last = inputs[inputs.len() - 1];

    let title = inputs
        .iter()
        .map(|s| s.title.as_str())
        .collect::<Vec<_>>()
        .join(MERGED_TITLE_SEPARATOR);
    let description = inputs
        .iter()
        .map(|s| s.description.as_str())
        .filter(|d| !d.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let tags = inputs.iter().flat_map(|s| s.tags.iter().cloned()).collect();
    let at = inputs.iter().map(|s| s.order).min().unwrap_or(0) as usize;

    let merged = Segment {
        id: EntityId::new(),
        project_id,
        title,
        description,
        start_time: first.start_time,
        end_time: last.end_time,
        tags,
        settings: first.settings.clone(),
        order: at as u32,
        created_at: now,
        updated_at: now,
    };

    Edit::new(
        segments,
        CollectionChange::Splice {
            remove: ids.to_vec(),
            insert: vec![merged],
            at,
        },
    )
}

/// Appends a copy of segment `id` with a fresh id and a marked title.
pub fn duplicate(
    segments: &OrderedCollection<Segment>,
    id: EntityId,
    now: DateTime<Utc>,
) -> CoreResult<Edit<Segment>> {
    let original = require(segments, id)?;
    let copy = Segment {
        id: EntityId::new(),
        title: format!("{}{COPY_SUFFIX}", original.title),
        order: segments.len() as u32,
        created_at: now,
        updated_at: now,
        ..original.clone()
    };
    Edit::push(segments, copy)
}

/// Reorders segments to match `ids`.
pub fn reorder(segments: &OrderedCollection<Segment>, ids: Vec<EntityId>) -> CoreResult<Edit<Segment>> {
    Edit::reindex(segments, ids)
}

/// Replaces segment fields after an edit, refreshing `updated_at`.
pub fn update(
    segments: &OrderedCollection<Segment>,
    mut segment: Segment,
    now: DateTime<Utc>,
) -> CoreResult<Edit<Segment>> {
    require(segments, segment.id)?;
    Segment::validate_range(segment.start_time, segment.end_time)?;
    segment.updated_at = now;
    Edit::update(segments, vec![segment])
}
