//! Pure ranking and selection over persisted candidates.
//!
//! None of these functions assume exclusive access to the job: ids that
//! disappeared under a concurrent delete are ignored rather than reported.

use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::candidate::PersistedCandidate;

/// Stable sort by score, best first. Ties keep their prior relative order.
pub fn rank_descending(mut candidates: Vec<PersistedCandidate>) -> Vec<PersistedCandidate> {
    candidates.sort_by(|a, b| b.suitability_score.total_cmp(&a.suitability_score));
    candidates
}

pub fn select_top_n(candidates: &[PersistedCandidate], n: i64) -> Result<Vec<Uuid>> {
    if n <= 0 {
        return Err(Error::Validation(format!(
            "Number of candidates to select must be positive, got {}",
            n
        )));
    }
    let take = usize::try_from(n).unwrap_or(usize::MAX);
    Ok(rank_descending(candidates.to_vec())
        .into_iter()
        .take(take)
        .map(|c| c.id)
        .collect())
}

pub fn toggle_selection(
    mut candidates: Vec<PersistedCandidate>,
    id: Uuid,
    selected: bool,
) -> Vec<PersistedCandidate> {
    if let Some(candidate) = candidates.iter_mut().find(|c| c.id == id) {
        candidate.selected = selected;
    }
    candidates
}

/// Appends a new batch. Existing candidates keep their selection; new ones
/// start unselected and ids already present are skipped.
pub fn merge_incremental_batch(
    mut existing: Vec<PersistedCandidate>,
    new_records: Vec<PersistedCandidate>,
) -> Vec<PersistedCandidate> {
    let mut seen: HashSet<Uuid> = existing.iter().map(|c| c.id).collect();
    for mut record in new_records {
        if seen.insert(record.id) {
            record.selected = false;
            existing.push(record);
        }
    }
    existing
}

/// Marks exactly `ids` as selected. Unknown ids are ignored.
pub fn apply_selection(
    mut candidates: Vec<PersistedCandidate>,
    ids: &[Uuid],
) -> Vec<PersistedCandidate> {
    let wanted: HashSet<&Uuid> = ids.iter().collect();
    for candidate in &mut candidates {
        candidate.selected = wanted.contains(&candidate.id);
    }
    candidates
}
