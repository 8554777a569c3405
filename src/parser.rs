//! M3U entry parser.
//!
//! Turns raw playlist text into [`ChannelRecord`]s. Parsing is best effort:
//! malformed lines are skipped and tallied in [`ParseStats`], never fatal.

use crate::errors::CuratorError;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

pub const HEADER: &str = "#EXTM3U";
pub const EXTINF: &str = "#EXTINF:";
pub const GROUP_TITLE: &str = "group-title";
pub const TVG_NAME: &str = "tvg-name";

/// Display names starting with this are disabled placeholder entries
pub const PLACEHOLDER_MARKER: &str = "####";

/// Group titles dropped by the curated parser variant
pub const DEFAULT_BLOCKED_GROUPS: &[&str] = &[
    "HINDI TAMIL",
    "BN - BENGALI",
    "UK| BFBS ᴿᴬᵂ",
    "UK| SPORT SD",
    "UK| LEAGUE ONE PPV",
    "UK| LEAGUE TWO PPV",
    "CRUNCHYROLL SERIES (MULTI-SUBS)",
    "IN - TAMIL",
    "IN - TELUGU",
];

// Anchored: attributes are consumed left to right from the current position.
static ATTRIBUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^([A-Za-z-]+)="((?:[^"\\]|\\.)*)""#).unwrap());

/// One playlist entry: `#EXTINF` metadata plus its stream URL
#[derive(Debug, Clone)]
pub struct ChannelRecord {
    /// Duration token after `#EXTINF:`, usually `-1`
    pub duration: String,
    /// Attributes in source order; keys are unique and case-sensitive
    pub attributes: Vec<(String, String)>,
    pub display_name: String,
    pub stream_url: String,
}

impl PartialEq for ChannelRecord {
    // Attribute order is kept for output but does not affect equality.
    fn eq(&self, other: &Self) -> bool {
        if self.duration != other.duration
            || self.display_name != other.display_name
            || self.stream_url != other.stream_url
            || self.attributes.len() != other.attributes.len()
        {
            return false;
        }
        self.attributes
            .iter()
            .all(|(k, v)| other.attribute(k) == Some(v.as_str()))
    }
}

impl Eq for ChannelRecord {}

impl ChannelRecord {
    pub fn new(display_name: &str, stream_url: &str) -> Self {
        Self {
            duration: "-1".to_string(),
            attributes: Vec::new(),
            display_name: display_name.to_string(),
            stream_url: stream_url.to_string(),
        }
    }

    /// Builder-style attribute setter used by converters and tests
    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value in place if the key exists, appends otherwise
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    /// Non-empty `group-title`, if any
    pub fn group_title(&self) -> Option<&str> {
        self.attribute(GROUP_TITLE).filter(|g| !g.trim().is_empty())
    }

    /// Copy of this record with `group-title` rewritten, everything else kept
    pub fn with_group_title(&self, title: &str) -> Self {
        let mut copy = self.clone();
        copy.set_attribute(GROUP_TITLE, title);
        copy
    }

    fn is_placeholder(&self) -> bool {
        self.display_name.starts_with(PLACEHOLDER_MARKER)
            || self
                .attribute(TVG_NAME)
                .is_some_and(|n| n.starts_with(PLACEHOLDER_MARKER))
    }
}

/// Parser settings
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Exact group titles whose records are discarded while parsing
    pub blocked_groups: HashSet<String>,
}

impl ParseOptions {
    /// Parser variant with the static content block-list applied
    pub fn curated() -> Self {
        Self {
            blocked_groups: DEFAULT_BLOCKED_GROUPS.iter().map(|g| g.to_string()).collect(),
        }
    }
}

/// Counters for everything the parser saw and skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseStats {
    pub metadata_lines: usize,
    pub records: usize,
    pub missing_url: usize,
    pub placeholders: usize,
    pub blocked: usize,
    pub stray_lines: usize,
    pub bad_attributes: usize,
}

impl ParseStats {
    pub fn absorb(&mut self, other: &ParseStats) {
        self.metadata_lines += other.metadata_lines;
        self.records += other.records;
        self.missing_url += other.missing_url;
        self.placeholders += other.placeholders;
        self.blocked += other.blocked;
        self.stray_lines += other.stray_lines;
        self.bad_attributes += other.bad_attributes;
    }
}

/// Records of one source playlist, in source order
#[derive(Debug, Clone, Default)]
pub struct ParsedPlaylist {
    /// Where the text came from; diagnostics only
    pub source: String,
    pub records: Vec<ChannelRecord>,
    pub stats: ParseStats,
}

impl ParsedPlaylist {
    pub fn from_records(source: &str, records: Vec<ChannelRecord>) -> Self {
        let stats = ParseStats {
            metadata_lines: records.len(),
            records: records.len(),
            ..Default::default()
        };
        Self {
            source: source.to_string(),
            records,
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse the metadata part of an `#EXTINF` line (without the marker).
/// Returns the record skeleton and the number of unparseable tokens.
fn parse_metadata(rest: &str) -> (ChannelRecord, usize) {
    let mut bad_tokens = 0;
    let rest = rest.trim_start();

    let duration_end = rest
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(rest.len());
    let duration = &rest[..duration_end];
    let mut cursor = &rest[duration_end..];

    let mut record = ChannelRecord::new("", "");
    if !duration.is_empty() {
        record.duration = duration.to_string();
    }

    loop {
        cursor = cursor.trim_start();
        if cursor.is_empty() || cursor.starts_with(',') {
            break;
        }
        if let Some(caps) = ATTRIBUTE_RE.captures(cursor) {
            let key = &caps[1];
            if record.attribute(key).is_none() {
                record.attributes.push((key.to_string(), caps[2].replace("\\\"", "\"")));
            }
            cursor = &cursor[caps[0].len()..];
            continue;
        }

        // Unrecognised token: skip to the next whitespace, stop at a comma.
        bad_tokens += 1;
        match cursor.find(|c: char| c.is_whitespace() || c == ',') {
            Some(pos) => cursor = &cursor[pos..],
            None => {
                cursor = "";
                break;
            }
        }
    }

    // Display name is whatever follows the final comma.
    if let Some(pos) = cursor.rfind(',') {
        record.display_name = cursor[pos + 1..].trim().to_string();
    }
    (record, bad_tokens)
}

/// Parse playlist text into records.
pub fn parse_playlist(text: &str, source: &str, options: &ParseOptions) -> ParsedPlaylist {
    let mut stats = ParseStats::default();
    let mut records = Vec::new();
    let mut pending: Option<ChannelRecord> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(EXTINF) {
            if pending.is_some() {
                stats.missing_url += 1;
            }
            stats.metadata_lines += 1;
            let (record, bad) = parse_metadata(rest);
            stats.bad_attributes += bad;
            pending = Some(record);
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let Some(mut record) = pending.take() else {
            stats.stray_lines += 1;
            continue;
        };
        record.stream_url = line.to_string();

        if record.is_placeholder() {
            stats.placeholders += 1;
            continue;
        }
        if record
            .attribute(GROUP_TITLE)
            .is_some_and(|g| options.blocked_groups.contains(g))
        {
            stats.blocked += 1;
            continue;
        }
        records.push(record);
    }

    if pending.is_some() {
        stats.missing_url += 1;
    }
    stats.records = records.len();

    debug!(
        "Parsed {} records from {} ({} metadata lines, {} dropped without URL)",
        stats.records, source, stats.metadata_lines, stats.missing_url
    );

    ParsedPlaylist {
        source: source.to_string(),
        records,
        stats,
    }
}

/// Read and parse a playlist file. A missing file is fatal.
pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<ParsedPlaylist, CuratorError> {
    if !path.exists() {
        return Err(CuratorError::InputMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| CuratorError::io(path, e))?;
    let parsed = parse_playlist(&text, &path.display().to_string(), options);
    if parsed.is_empty() {
        warn!("No channel records found in {}", path.display());
    }
    Ok(parsed)
}

/// Channel count per group title, in first-seen order
pub fn group_counts(records: &[ChannelRecord]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for record in records {
        let Some(group) = record.group_title() else {
            continue;
        };
        match counts.iter_mut().find(|(g, _)| g == group) {
            Some(entry) => entry.1 += 1,
            None => counts.push((group.to_string(), 1)),
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#EXTM3U\n\
#EXTINF:-1 tvg-id=\"bbc1.uk\" tvg-name=\"BBC One\" tvg-logo=\"http://logo/bbc1.png\" group-title=\"UK| General\",BBC One HD\n\
http://DNS/live/USERNAME/PASSWORD/101.ts\n\
\n\
#EXTINF:-1 tvg-name=\"CNN\" group-title=\"US| News\",CNN\n\
http://DNS/live/USERNAME/PASSWORD/102.ts\n";

    #[test]
    fn test_parse_basic_records() {
        let parsed = parse_playlist(SAMPLE, "sample", &ParseOptions::default());
        assert_eq!(parsed.len(), 2);

        let bbc = &parsed.records[0];
        assert_eq!(bbc.attribute("tvg-id"), Some("bbc1.uk"));
        assert_eq!(bbc.group_title(), Some("UK| General"));
        assert_eq!(bbc.display_name, "BBC One HD");
        assert_eq!(bbc.stream_url, "http://DNS/live/USERNAME/PASSWORD/101.ts");
        assert_eq!(bbc.duration, "-1");
        assert_eq!(parsed.stats.metadata_lines, 2);
    }

    #[test]
    fn test_header_is_optional() {
        let text = SAMPLE.trim_start_matches("#EXTM3U\n");
        let parsed = parse_playlist(text, "noheader", &ParseOptions::default());
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_display_name_follows_final_comma() {
        let text = "#EXTINF:-1 tvg-name=\"Law, Order\" group-title=\"Drama, Crime\",Law & Order, SVU\nhttp://x/1\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        let rec = &parsed.records[0];
        assert_eq!(rec.attribute("tvg-name"), Some("Law, Order"));
        assert_eq!(rec.group_title(), Some("Drama, Crime"));
        assert_eq!(rec.display_name, "SVU");
    }

    #[test]
    fn test_escaped_quotes_are_unescaped() {
        let text = "#EXTINF:-1 tvg-name=\"Foo \\\"Bar\\\" HD\" group-title=\"A\",Foo\nhttp://x/1\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(parsed.records[0].attribute("tvg-name"), Some("Foo \"Bar\" HD"));
        assert_eq!(parsed.stats.bad_attributes, 0);
    }

    #[test]
    fn test_trailing_metadata_without_url_is_dropped() {
        let text = "#EXTINF:-1 group-title=\"A\",One\nhttp://x/1\n#EXTINF:-1 group-title=\"A\",Two\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.stats.missing_url, 1);
    }

    #[test]
    fn test_consecutive_metadata_lines_drop_the_first() {
        let text = "#EXTINF:-1 group-title=\"A\",One\n#EXTINF:-1 group-title=\"A\",Two\nhttp://x/2\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.records[0].display_name, "Two");
        assert_eq!(parsed.stats.missing_url, 1);
    }

    #[test]
    fn test_comments_between_metadata_and_url() {
        let text = "#EXTINF:-1 group-title=\"A\",One\n#EXTVLCOPT:http-user-agent=x\nhttp://x/1\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.records[0].stream_url, "http://x/1");
    }

    #[test]
    fn test_placeholder_entries_dropped() {
        let text = "#EXTINF:-1 tvg-name=\"#### UK SPORTS ####\" group-title=\"UK| Sports\",#### UK SPORTS ####\nhttp://x/0\n\
#EXTINF:-1 tvg-name=\"Sky\" group-title=\"UK| Sports\",Sky Sports\nhttp://x/1\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.stats.placeholders, 1);
    }

    #[test]
    fn test_curated_blocklist() {
        let text = "#EXTINF:-1 group-title=\"IN - TAMIL\",Sun TV\nhttp://x/1\n\
#EXTINF:-1 group-title=\"IN - TAMIL EXTRA\",Other\nhttp://x/2\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::curated());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.stats.blocked, 1);

        let unfiltered = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(unfiltered.len(), 2);
    }

    #[test]
    fn test_unparseable_tokens_are_tallied() {
        let text = "#EXTINF:-1 tvg-name=Bare tvg_shift=\"2\" group-title=\"A\",Name\nhttp://x/1\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.records[0].group_title(), Some("A"));
        assert_eq!(parsed.stats.bad_attributes, 2);
    }

    #[test]
    fn test_stray_url_lines_counted() {
        let text = "#EXTM3U\nhttp://orphan\n#EXTINF:-1,Plain\nhttp://x/1\n";
        let parsed = parse_playlist(text, "t", &ParseOptions::default());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.stats.stray_lines, 1);
        assert!(parsed.records[0].attributes.is_empty());
        assert_eq!(parsed.records[0].display_name, "Plain");
    }

    #[test]
    fn test_equality_ignores_attribute_order() {
        let a = ChannelRecord::new("X", "http://x")
            .with_attribute("tvg-id", "1")
            .with_attribute(GROUP_TITLE, "G");
        let b = ChannelRecord::new("X", "http://x")
            .with_attribute(GROUP_TITLE, "G")
            .with_attribute("tvg-id", "1");
        assert_eq!(a, b);
        assert_ne!(a, b.with_group_title("H"));
    }

    #[test]
    fn test_group_counts_first_seen_order() {
        let parsed = parse_playlist(SAMPLE, "sample", &ParseOptions::default());
        let mut records = parsed.records.clone();
        records.push(records[0].clone());
        let counts = group_counts(&records);
        assert_eq!(
            counts,
            vec![("UK| General".to_string(), 2), ("US| News".to_string(), 1)]
        );
    }

    #[test]
    fn test_parse_file_missing_is_error() {
        let err = parse_file(Path::new("/nonexistent/playlist.m3u"), &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, CuratorError::InputMissing(_)));
    }
}
