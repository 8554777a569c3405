//! Filter/merge engine: decides which records survive and in what order.
//!
//! Every record lands in exactly one of included, excluded-known,
//! excluded-unknown or dropped-malformed. Content duplicates removed under
//! [`DedupPolicy::ByContent`] are tallied on their own.

use crate::config::{GroupConfigStore, GroupIndex};
use crate::parser::{ChannelRecord, ParseStats, ParsedPlaylist, GROUP_TITLE};
use crate::preprocessing::{merge_subcategories, MergeStats};
use crate::resolver::UnknownGroupResolver;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, clap::ValueEnum)]
pub enum DedupPolicy {
    /// Emit every included record, even exact repeats
    #[default]
    KeepAll,
    /// Drop records identical in attributes, name and URL to an earlier one
    ByContent,
}

/// Sub-category playlists that replace a placeholder bulk group
#[derive(Debug, Clone)]
pub struct BulkMerge {
    pub placeholder_group: String,
    pub subcategories: Vec<ParsedPlaylist>,
}

#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Send unknown groups through the resolver; when false they are excluded
    pub auto_include_unknown: bool,
    pub dedup: DedupPolicy,
    pub bulk_merge: Option<BulkMerge>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            auto_include_unknown: true,
            dedup: DedupPolicy::KeepAll,
            bulk_merge: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Title is in the configuration
    Configured,
    /// Unknown title the resolver let through
    AutoIncluded,
    /// Unknown title the resolver (or strict mode) rejected
    AutoExcluded,
}

impl DecisionSource {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionSource::Configured => "configured",
            DecisionSource::AutoIncluded => "auto-included",
            DecisionSource::AutoExcluded => "auto-excluded",
        }
    }
}

/// Decision for one distinct effective title
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDecision {
    pub effective_title: String,
    pub include: bool,
    pub source: DecisionSource,
    pub reason: String,
}

/// One emitted group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub title: String,
    pub order: Option<i64>,
    pub count: usize,
    pub source: DecisionSource,
}

/// Per-run audit counts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterReport {
    pub total: usize,
    pub included_known: usize,
    pub included_unknown: usize,
    pub excluded_known: usize,
    pub excluded_unknown: usize,
    pub dropped_malformed: usize,
    pub duplicates_removed: usize,
    /// Records whose group title was rewritten by an override
    pub overridden: usize,
    pub merge: MergeStats,
    pub parse: ParseStats,
}

impl FilterReport {
    pub fn included(&self) -> usize {
        self.included_known + self.included_unknown
    }

    pub fn excluded(&self) -> usize {
        self.excluded_known + self.excluded_unknown
    }

    /// Every record is accounted for exactly once
    pub fn is_balanced(&self) -> bool {
        self.included() + self.excluded() + self.dropped_malformed + self.duplicates_removed
            == self.total
    }
}

impl fmt::Display for FilterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filter summary")?;
        writeln!(f, "  Records processed:        {}", self.total)?;
        writeln!(f, "  Included (configured):    {}", self.included_known)?;
        writeln!(f, "  Included (auto):          {}", self.included_unknown)?;
        writeln!(f, "  Excluded (configured):    {}", self.excluded_known)?;
        writeln!(f, "  Excluded (auto):          {}", self.excluded_unknown)?;
        writeln!(f, "  Dropped (no group title): {}", self.dropped_malformed)?;
        if self.duplicates_removed > 0 {
            writeln!(f, "  Duplicates removed:       {}", self.duplicates_removed)?;
        }
        writeln!(f, "  Group overrides applied:  {}", self.overridden)?;
        if self.merge.merged() {
            writeln!(
                f,
                "  Bulk merge:               {} replaced by {}",
                self.merge.removed, self.merge.appended
            )?;
        }
        write!(
            f,
            "  Parser: {} metadata lines, {} without URL, {} placeholders, {} blocked, {} bad attributes",
            self.parse.metadata_lines,
            self.parse.missing_url,
            self.parse.placeholders,
            self.parse.blocked,
            self.parse.bad_attributes
        )
    }
}

/// Result of a filter run
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Output sequence, ready for serialization
    pub records: Vec<ChannelRecord>,
    /// Emitted groups in output order
    pub groups: Vec<GroupSummary>,
    /// One decision per distinct effective title, first-seen order
    pub decisions: Vec<FilterDecision>,
    /// Records seen per effective title, first-seen order
    pub seen_counts: Vec<(String, usize)>,
    pub report: FilterReport,
}

impl FilterOutcome {
    fn titles_with(&self, source: DecisionSource) -> BTreeSet<String> {
        self.decisions
            .iter()
            .filter(|d| d.source == source)
            .map(|d| d.effective_title.clone())
            .collect()
    }

    pub fn auto_included(&self) -> BTreeSet<String> {
        self.titles_with(DecisionSource::AutoIncluded)
    }

    pub fn auto_excluded(&self) -> BTreeSet<String> {
        self.titles_with(DecisionSource::AutoExcluded)
    }
}

type ContentKey = (String, String, String, Vec<(String, String)>);

fn content_key(record: &ChannelRecord) -> ContentKey {
    let mut attributes = record.attributes.clone();
    attributes.sort();
    (
        record.duration.clone(),
        record.display_name.clone(),
        record.stream_url.clone(),
        attributes,
    )
}

pub struct FilterEngine {
    index: GroupIndex,
    resolver: UnknownGroupResolver,
    options: FilterOptions,
}

impl FilterEngine {
    pub fn new(store: &GroupConfigStore, options: FilterOptions) -> Self {
        Self::from_index(store.index(), options)
    }

    pub fn from_index(index: GroupIndex, options: FilterOptions) -> Self {
        Self {
            index,
            resolver: UnknownGroupResolver::default(),
            options,
        }
    }

    pub fn with_resolver(mut self, resolver: UnknownGroupResolver) -> Self {
        self.resolver = resolver;
        self
    }

    fn decide(&self, title: &str) -> FilterDecision {
        if self.index.is_known(title) {
            // Include wins when a title is listed both ways.
            let include = self.index.include.contains(title);
            return FilterDecision {
                effective_title: title.to_string(),
                include,
                source: DecisionSource::Configured,
                reason: if include {
                    "configured include"
                } else {
                    "configured exclude"
                }
                .to_string(),
            };
        }
        if !self.options.auto_include_unknown {
            return FilterDecision {
                effective_title: title.to_string(),
                include: false,
                source: DecisionSource::AutoExcluded,
                reason: "auto-include disabled".to_string(),
            };
        }

        let resolution = self.resolver.resolve(title, &self.index.exclude);
        if resolution.exclude {
            info!("Auto-excluding unknown group '{}': {}", title, resolution.reason);
        } else {
            info!("Auto-including unknown group '{}': {}", title, resolution.reason);
        }
        FilterDecision {
            effective_title: title.to_string(),
            include: !resolution.exclude,
            source: if resolution.exclude {
                DecisionSource::AutoExcluded
            } else {
                DecisionSource::AutoIncluded
            },
            reason: resolution.reason,
        }
    }

    pub fn filter(&self, playlists: Vec<ParsedPlaylist>) -> FilterOutcome {
        let (playlists, merge) = match &self.options.bulk_merge {
            Some(bulk) => merge_subcategories(
                playlists,
                bulk.subcategories.clone(),
                &bulk.placeholder_group,
            ),
            None => (playlists, MergeStats::default()),
        };

        let mut report = FilterReport {
            merge,
            ..Default::default()
        };
        let mut decisions: Vec<FilterDecision> = Vec::new();
        let mut decision_slots: HashMap<String, usize> = HashMap::new();
        let mut seen_counts: Vec<(String, usize)> = Vec::new();
        let mut buckets: Vec<(String, Vec<ChannelRecord>)> = Vec::new();
        let mut bucket_slots: HashMap<String, usize> = HashMap::new();
        let mut seen_content: HashSet<ContentKey> = HashSet::new();

        for playlist in playlists {
            report.parse.absorb(&playlist.stats);
            debug!("Filtering {} records from {}", playlist.len(), playlist.source);

            for mut record in playlist.records {
                report.total += 1;

                let Some(raw) = record.group_title().map(str::to_string) else {
                    report.dropped_malformed += 1;
                    continue;
                };
                let effective = match self.index.overrides.get(&raw) {
                    Some(over) => {
                        record.set_attribute(GROUP_TITLE, over);
                        report.overridden += 1;
                        over.clone()
                    }
                    None => raw,
                };

                let slot = match decision_slots.get(&effective) {
                    Some(&slot) => slot,
                    None => {
                        decisions.push(self.decide(&effective));
                        seen_counts.push((effective.clone(), 0));
                        decision_slots.insert(effective.clone(), decisions.len() - 1);
                        decisions.len() - 1
                    }
                };
                seen_counts[slot].1 += 1;
                let decision = &decisions[slot];

                match (decision.include, decision.source) {
                    (false, DecisionSource::Configured) => {
                        report.excluded_known += 1;
                        continue;
                    }
                    (false, _) => {
                        report.excluded_unknown += 1;
                        continue;
                    }
                    _ => {}
                }

                if self.options.dedup == DedupPolicy::ByContent
                    && !seen_content.insert(content_key(&record))
                {
                    report.duplicates_removed += 1;
                    continue;
                }

                if decision.source == DecisionSource::Configured {
                    report.included_known += 1;
                } else {
                    report.included_unknown += 1;
                }

                let bucket = *bucket_slots.entry(effective.clone()).or_insert_with(|| {
                    buckets.push((effective.clone(), Vec::new()));
                    buckets.len() - 1
                });
                buckets[bucket].1.push(record);
            }
        }

        let mut records = Vec::with_capacity(report.included());
        let mut groups = Vec::new();
        for (summary, group_records) in self.order_groups(buckets, &decisions, &decision_slots) {
            records.extend(group_records);
            groups.push(summary);
        }

        info!(
            "Filtered {} records: {} included, {} excluded, {} dropped",
            report.total,
            report.included(),
            report.excluded(),
            report.dropped_malformed
        );

        FilterOutcome {
            records,
            groups,
            decisions,
            seen_counts,
            report,
        }
    }

    /// Configured groups with an order first (ascending, ties keep first-seen
    /// order), then configured groups without one, then unknown groups as
    /// first encountered.
    fn order_groups(
        &self,
        buckets: Vec<(String, Vec<ChannelRecord>)>,
        decisions: &[FilterDecision],
        decision_slots: &HashMap<String, usize>,
    ) -> Vec<(GroupSummary, Vec<ChannelRecord>)> {
        let mut groups: Vec<(GroupSummary, Vec<ChannelRecord>)> = buckets
            .into_iter()
            .map(|(title, records)| {
                let source = decision_slots
                    .get(&title)
                    .map(|&slot| decisions[slot].source)
                    .unwrap_or(DecisionSource::AutoIncluded);
                let order = match source {
                    DecisionSource::Configured => self.index.orders.get(&title).copied(),
                    _ => None,
                };
                let summary = GroupSummary {
                    title,
                    order,
                    count: records.len(),
                    source,
                };
                (summary, records)
            })
            .collect();

        groups.sort_by_key(|(g, _)| match (g.source, g.order) {
            (DecisionSource::Configured, Some(order)) => (0, order),
            (DecisionSource::Configured, None) => (1, 0),
            _ => (2, 0),
        });
        groups
    }
}

/// Filter with default options
pub fn filter(playlists: Vec<ParsedPlaylist>, store: &GroupConfigStore) -> FilterOutcome {
    FilterEngine::new(store, FilterOptions::default()).filter(playlists)
}
