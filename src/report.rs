//! Dry-run validation of a playlist against the group configuration.

use crate::config::{CountDivergence, DuplicateGroup, GroupConfigStore};
use crate::filter::{DecisionSource, FilterEngine, FilterOptions, FilterReport};
use crate::parser::{group_counts, ParsedPlaylist};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct GroupLine {
    pub title: String,
    pub channels: usize,
    pub include: bool,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Configured groups present in the playlist
    pub known: Vec<GroupLine>,
    /// Groups the configuration has never seen, with the resolver's verdict
    pub unknown: Vec<GroupLine>,
    /// Configured groups no longer present upstream
    pub missing: Vec<String>,
    pub divergence: Vec<CountDivergence>,
    pub duplicates: Vec<DuplicateGroup>,
    pub summary: FilterReport,
}

impl ValidationReport {
    pub fn has_warnings(&self) -> bool {
        !self.divergence.is_empty() || !self.duplicates.is_empty()
    }
}

/// Run the filter without producing output and collect data-quality findings
pub fn validate(
    playlists: Vec<ParsedPlaylist>,
    store: &GroupConfigStore,
    options: FilterOptions,
) -> ValidationReport {
    let raw_counts = group_counts(
        &playlists
            .iter()
            .flat_map(|p| p.records.iter().cloned())
            .collect::<Vec<_>>(),
    );
    let present: BTreeSet<String> = raw_counts.iter().map(|(g, _)| g.clone()).collect();

    let outcome = FilterEngine::new(store, options).filter(playlists);

    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for (decision, (_, channels)) in outcome.decisions.iter().zip(&outcome.seen_counts) {
        let line = GroupLine {
            title: decision.effective_title.clone(),
            channels: *channels,
            include: decision.include,
            reason: decision.reason.clone(),
        };
        if decision.source == DecisionSource::Configured {
            known.push(line);
        } else {
            unknown.push(line);
        }
    }

    ValidationReport {
        known,
        unknown,
        missing: store
            .missing_from(&present)
            .into_iter()
            .map(|e| e.group_title.clone())
            .collect(),
        divergence: store.count_divergence(&raw_counts),
        duplicates: store.duplicates(),
        summary: outcome.report,
    }
}

fn verdict(include: bool) -> &'static str {
    if include {
        "INCLUDE"
    } else {
        "EXCLUDE"
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Known groups: {}", self.known.len())?;
        for g in &self.known {
            writeln!(f, "  [{}] {} ({} channels)", verdict(g.include), g.title, g.channels)?;
        }
        writeln!(f, "Unknown groups: {}", self.unknown.len())?;
        for g in &self.unknown {
            writeln!(
                f,
                "  [{}] {} ({} channels): {}",
                verdict(g.include),
                g.title,
                g.channels,
                g.reason
            )?;
        }
        if !self.missing.is_empty() {
            writeln!(f, "Configured but not in playlist: {}", self.missing.len())?;
            for title in &self.missing {
                writeln!(f, "  {}", title)?;
            }
        }
        if !self.divergence.is_empty() {
            writeln!(f, "Channel count changes: {}", self.divergence.len())?;
            for d in &self.divergence {
                writeln!(
                    f,
                    "  {}: configured {}, actual {}",
                    d.group_title, d.configured, d.actual
                )?;
            }
        }
        if !self.duplicates.is_empty() {
            writeln!(f, "Duplicate configuration entries: {}", self.duplicates.len())?;
            for d in &self.duplicates {
                writeln!(f, "  '{}' appears {} times", d.group_title, d.entries.len())?;
            }
        }
        write!(f, "{}", self.summary)
    }
}
