//! Channel-level overrides for the UK TV guide group.
//!
//! A rule names a channel in the guide group and the playlist channel that
//! should stand in for it. The substitute keeps the guide entry's
//! `group-title` but takes every other attribute, the display name and the
//! stream URL from the replacement.

use crate::errors::CuratorError;
use crate::parser::ChannelRecord;
use log::{info, warn};
use std::fs;
use std::path::Path;

pub const GUIDE_GROUP: &str = "🇬🇧 TV Guide (UK)";
pub const GUIDE_OVERRIDES_FILE: &str = "uk_tv_overrides_dynamic.conf";

/// Separator in a `group||channel` identifier
pub const ID_SEPARATOR: &str = "||";

/// Where the replacement for a guide channel comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Exact `group||channel` identifier
    Qualified { group: String, channel: String },
    /// First channel with this display name, in playlist order
    ByName(String),
}

impl Replacement {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(ID_SEPARATOR) {
            Some((group, channel)) => Replacement::Qualified {
                group: group.trim().to_string(),
                channel: channel.trim().to_string(),
            },
            None => Replacement::ByName(spec.trim().to_string()),
        }
    }

    fn find<'a>(&self, records: &'a [ChannelRecord]) -> Option<&'a ChannelRecord> {
        match self {
            // Later records shadow earlier ones with the same identifier.
            Replacement::Qualified { group, channel } => records.iter().rev().find(|r| {
                r.group_title() == Some(group.as_str()) && &r.display_name == channel
            }),
            Replacement::ByName(channel) => records
                .iter()
                .find(|r| r.group_title().is_some() && &r.display_name == channel),
        }
    }
}

impl std::fmt::Display for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Replacement::Qualified { group, channel } => {
                write!(f, "{}{}{}", group, ID_SEPARATOR, channel)
            }
            Replacement::ByName(channel) => f.write_str(channel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRule {
    /// Display name of the channel inside the guide group
    pub channel: String,
    pub replacement: Replacement,
}

/// Rules from `source = replacement` lines
#[derive(Debug, Clone, Default)]
pub struct GuideOverrides {
    rules: Vec<OverrideRule>,
    /// Lines that were neither blank, comments nor rules
    pub invalid_lines: usize,
}

impl GuideOverrides {
    pub fn parse(text: &str) -> Self {
        let mut overrides = GuideOverrides::default();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let rule = line
                .split_once('=')
                .map(|(source, spec)| (source.trim(), spec.trim()))
                .filter(|(source, spec)| !source.is_empty() && !spec.is_empty());
            let Some((source, spec)) = rule else {
                warn!("Invalid override on line {}: {}", number + 1, line);
                overrides.invalid_lines += 1;
                continue;
            };
            overrides.insert(OverrideRule {
                channel: source.to_string(),
                replacement: Replacement::parse(spec),
            });
        }
        overrides
    }

    /// Read rules from `path`. A missing file yields no rules.
    pub fn load(path: &Path) -> Result<Self, CuratorError> {
        if !path.exists() {
            warn!("Override file {} not found", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|e| CuratorError::io(path, e))?;
        let overrides = Self::parse(&text);
        info!("Loaded {} channel overrides from {}", overrides.len(), path.display());
        Ok(overrides)
    }

    /// Add a rule; a later rule for the same channel replaces the earlier one.
    pub fn insert(&mut self, rule: OverrideRule) {
        match self.rules.iter_mut().find(|r| r.channel == rule.channel) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn rules(&self) -> &[OverrideRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn rule_for(&self, channel: &str) -> Option<&OverrideRule> {
        self.rules.iter().find(|r| r.channel == channel)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideStats {
    pub replaced: usize,
    /// Guide channels whose replacement was not found in the playlist
    pub unresolved: Vec<String>,
}

/// Swap guide channels for their configured replacements. Replacements are
/// looked up among the incoming records, so substitutes never chain.
pub fn apply_guide_overrides(
    records: Vec<ChannelRecord>,
    overrides: &GuideOverrides,
    guide_group: &str,
) -> (Vec<ChannelRecord>, OverrideStats) {
    let mut stats = OverrideStats::default();
    let output = records
        .iter()
        .map(|record| {
            if record.group_title() != Some(guide_group) {
                return record.clone();
            }
            let Some(rule) = overrides.rule_for(&record.display_name) else {
                return record.clone();
            };
            match rule.replacement.find(&records) {
                Some(found) => {
                    info!("Replaced {} -> {}", record.display_name, found.display_name);
                    stats.replaced += 1;
                    found.with_group_title(guide_group)
                }
                None => {
                    warn!(
                        "Replacement '{}' not found for {}",
                        rule.replacement, record.display_name
                    );
                    stats.unresolved.push(record.display_name.clone());
                    record.clone()
                }
            }
        })
        .collect();
    (output, stats)
}

/// Records in the guide group, by display name
pub fn guide_entries<'a>(
    records: &'a [ChannelRecord],
    guide_group: &str,
) -> Vec<&'a ChannelRecord> {
    let mut entries: Vec<&ChannelRecord> = records
        .iter()
        .filter(|r| r.group_title() == Some(guide_group))
        .collect();
    entries.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    entries
}

/// Case-insensitive search on display name and `tvg-name`, sorted by group
/// then name
pub fn find_channels<'a>(records: &'a [ChannelRecord], term: &str) -> Vec<&'a ChannelRecord> {
    let needle = term.to_lowercase();
    let mut matches: Vec<&ChannelRecord> = records
        .iter()
        .filter(|r| r.group_title().is_some())
        .filter(|r| {
            r.display_name.to_lowercase().contains(&needle)
                || r.attribute("tvg-name")
                    .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .collect();
    matches.sort_by(|a, b| {
        (a.group_title(), &a.display_name).cmp(&(b.group_title(), &b.display_name))
    });
    matches
}

/// `group||channel` identifier usable on the right side of a rule
pub fn channel_identifier(record: &ChannelRecord) -> String {
    format!(
        "{}{}{}",
        record.group_title().unwrap_or_default(),
        ID_SEPARATOR,
        record.display_name
    )
}
