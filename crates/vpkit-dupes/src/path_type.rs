//! Path-type classification.
//!
//! The engine looks files up by type directory (`data/maps`, `data/tables`,
//! ...) and ignores any deeper sub-directories, so two files with the same
//! name anywhere under one type directory compete with each other. A few
//! type directories are one level deeper.

/// Type directories that span three path segments.
const THREE_SEGMENT_TYPES: &[&str] = &[
    "data/voice/briefing",
    "data/voice/command_briefings",
    "data/voice/debriefing",
    "data/voice/personas",
    "data/voice/special",
    "data/voice/training",
    "data/players/images",
    "data/players/squads",
    "data/players/single",
    "data/players/multi",
    "data/players/presets",
];

const ROOT: &str = "data";

/// Classify a directory path.
///
/// Returns the empty string for paths outside `data`.
pub fn path_type(dir: &str) -> &str {
    let mut segments = dir.splitn(4, '/');
    if segments.next() != Some(ROOT) {
        return "";
    }
    let Some(second) = segments.next() else {
        return dir;
    };

    let two = ROOT.len() + 1 + second.len();
    if let Some(third) = segments.next() {
        let three = &dir[..two + 1 + third.len()];
        if THREE_SEGMENT_TYPES.contains(&three) {
            return three;
        }
    }
    &dir[..two]
}
