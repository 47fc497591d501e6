//! Area floors and split-feasibility checks used by callers before they
//! ask for split/merge proposals, and by the fallback evaluator.

use serde::{Deserialize, Serialize};

/// No space is ever computed below this, fallback or otherwise. In m².
pub const MIN_AREA_ABSOLUTE: f64 = 2.0;
/// Floor for a single desk/workpoint.
pub const MIN_AREA_WORKSPACE: f64 = 6.0;
/// Floor for a room people meet in.
pub const MIN_AREA_MEETING: f64 = 10.0;
/// Floor for any other functional room.
pub const MIN_AREA_FUNCTIONAL_ROOM: f64 = 8.0;
/// Share of the root total a typology-guess fallback assumes when the
/// collaborator suggested nothing.
pub const DEFAULT_TYPOLOGY_RATIO: f64 = 0.05;

/// Answer to "can this area be split into n parts of at least x each?".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFeasibility {
    pub feasible: bool,
    /// Largest part count that would still respect the per-part floor.
    pub max_parts: u32,
}

/// Checks whether `total_area` can be divided into `target_parts` pieces of
/// at least `min_per_part` each. The per-part floor is never allowed below
/// the global absolute minimum.
pub fn can_split_area(total_area: f64, target_parts: u32, min_per_part: f64) -> SplitFeasibility {
    let floor = min_per_part.max(MIN_AREA_ABSOLUTE);
    let max_parts = if total_area > 0.0 { (total_area / floor).floor() as u32 } else { 0 };
    SplitFeasibility { feasible: target_parts >= 1 && target_parts <= max_parts, max_parts }
}

/// Maps a coarse space-type keyword to the floor callers should pass into
/// split operations. Matching is substring-based and case-insensitive.
pub fn minimum_area_for(space_type: &str) -> f64 {
    let kw = space_type.to_lowercase();
    if kw.contains("closet") || kw.contains("storage") {
        MIN_AREA_ABSOLUTE
    } else if kw.contains("office") || kw.contains("workspace") {
        MIN_AREA_WORKSPACE
    } else if kw.contains("meeting") {
        MIN_AREA_MEETING
    } else {
        MIN_AREA_FUNCTIONAL_ROOM
    }
}
