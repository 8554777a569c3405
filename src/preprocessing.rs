use crate::parser::ParsedPlaylist;
use log::info;

/// Counters from a bulk-group merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    /// Records stripped from the base sources
    pub removed: usize,
    /// Records appended from sub-category playlists
    pub appended: usize,
}

impl MergeStats {
    pub fn merged(&self) -> bool {
        self.removed > 0
    }
}

/// Replace the records of `placeholder_group` in `base` with the already
/// re-categorised `subcategories`. If no base source carries the placeholder
/// group there is nothing to replace and the base is returned as is.
pub fn merge_subcategories(
    base: Vec<ParsedPlaylist>,
    subcategories: Vec<ParsedPlaylist>,
    placeholder_group: &str,
) -> (Vec<ParsedPlaylist>, MergeStats) {
    let mut stats = MergeStats::default();

    let has_placeholder = base.iter().any(|p| {
        p.records
            .iter()
            .any(|r| r.group_title() == Some(placeholder_group))
    });
    if !has_placeholder {
        info!(
            "No '{}' records in base playlists; skipping sub-category merge",
            placeholder_group
        );
        return (base, stats);
    }

    let mut merged: Vec<ParsedPlaylist> = base
        .into_iter()
        .map(|mut playlist| {
            let before = playlist.records.len();
            playlist
                .records
                .retain(|r| r.group_title() != Some(placeholder_group));
            stats.removed += before - playlist.records.len();
            playlist
        })
        .collect();

    for sub in subcategories {
        stats.appended += sub.records.len();
        merged.push(sub);
    }

    info!(
        "Replaced {} '{}' records with {} categorised records",
        stats.removed, placeholder_group, stats.appended
    );
    (merged, stats)
}
