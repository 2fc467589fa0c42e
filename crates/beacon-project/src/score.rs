//! Relevance scoring for discovered build-description paths.
//!
//! Pure and explicitly tabulated: every weight lives here, nothing touches
//! the filesystem, and the walker/cache layers call in with whatever
//! candidate set they hold. Higher scores survive truncation.

use std::path::Path;

use beacon_build_model::{CandidatePath, PathKind};

/// Top-level directory names that conventionally hold the projects people
/// actually open.
const IMPORTANT_TOP_LEVEL_DIRS: [&str; 4] = ["sources", "packages", "apps", "projects"];

/// Substrings marking an immediate parent directory as interesting.
const IMPORTANT_PARENT_SUBSTRINGS: [&str; 6] = ["main", "core", "app", "lib", "framework", "service"];

/// Path segments marking test/example/demo locations.
const LOW_PRIORITY_SEGMENTS: [&str; 10] = [
    "test", "tests", "testing", "example", "examples", "demo", "demos", "sample", "samples",
    "fixtures",
];

/// Score one candidate against the project root and the currently selected
/// project. Higher is better.
pub fn score_candidate(
    candidate: &CandidatePath,
    root: &Path,
    selected: Option<&Path>,
) -> i64 {
    let project_dir = candidate.project_dir();
    let rel = project_dir.strip_prefix(root).ok();

    let depth = rel
        .map(|rel| rel.components().count())
        // Candidates outside the root shouldn't win ties against anything.
        .unwrap_or(64)
        .max(1);

    let mut score = 0i64;

    // Shallower is better; contribution capped at the depth-1 value.
    score += 60 / depth as i64;
    if depth == 1 {
        score += 100;
    }

    if selected.is_some_and(|sel| sel == project_dir || sel == candidate.path) {
        score += 500;
    }

    if let Some(first) = rel.and_then(first_segment) {
        let first = first.to_ascii_lowercase();
        if IMPORTANT_TOP_LEVEL_DIRS.contains(&first.as_str()) {
            score += 40;
        }
    }

    if let Some(parent) = candidate
        .path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
    {
        let parent = parent.to_ascii_lowercase();
        if IMPORTANT_PARENT_SUBSTRINGS
            .iter()
            .any(|needle| parent.contains(needle))
        {
            score += 30;
        }
    }

    if rel.is_some_and(has_low_priority_segment) {
        score -= 50;
    }

    // Prefer the canonical workspace-description form over the
    // project-description form when both represent the same tree.
    if candidate.kind == PathKind::Workspace {
        score += 10;
    }

    score
}

fn first_segment(rel: &Path) -> Option<String> {
    rel.components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
}

fn has_low_priority_segment(rel: &Path) -> bool {
    rel.components().any(|c| {
        let segment = c.as_os_str().to_string_lossy().to_ascii_lowercase();
        LOW_PRIORITY_SEGMENTS.contains(&segment.as_str())
    })
}

/// Stable-sort candidates descending by score.
///
/// Ties keep the caller's existing order; the indexer pre-sorts
/// alphabetically by display name so ties break that way.
pub fn prioritize(candidates: &mut [CandidatePath], root: &Path, selected: Option<&Path>) {
    candidates.sort_by_key(|candidate| std::cmp::Reverse(score_candidate(candidate, root, selected)));
}

/// Keep exactly the top-`max` candidates by score.
pub fn truncate_by_relevance(
    mut candidates: Vec<CandidatePath>,
    max: usize,
    root: &Path,
    selected: Option<&Path>,
) -> Vec<CandidatePath> {
    prioritize(&mut candidates, root, selected);
    candidates.truncate(max);
    candidates
}
