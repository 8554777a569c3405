use crate::errors::CuratorError;
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const GROUP_CONFIG_FILE: &str = "group_titles_with_flags.json";
pub const CONFIG_DIR: &str = "data/config";

/// Locate a configuration file: `data/config/<name>`, then `./<name>`, then
/// the per-user config directory. Falls back to the bare name so the caller
/// can report a sensible missing path.
pub fn find_config_file(name: &str) -> PathBuf {
    let config_path = Path::new(CONFIG_DIR).join(name);
    if config_path.exists() {
        return config_path;
    }
    let root_path = PathBuf::from(name);
    if root_path.exists() {
        return root_path;
    }
    if let Some(proj_dirs) = ProjectDirs::from("com", "iptv-curator", "iptv-curator") {
        let user_path = proj_dirs.config_dir().join(name);
        if user_path.exists() {
            return user_path;
        }
    }
    root_path
}

/// `"true"`/`"false"` in JSON; plain booleans are accepted on read.
/// Anything other than false counts as exclude.
mod flag_string {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(d)? {
            Raw::Bool(b) => b,
            Raw::Text(t) => !t.trim().eq_ignore_ascii_case("false"),
        })
    }
}

/// One group of the operator's configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GroupConfigEntry {
    pub group_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_title: Option<String>,
    #[serde(default)]
    pub channel_count: u64,
    #[serde(with = "flag_string")]
    pub exclude: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl GroupConfigEntry {
    pub fn new(group_title: &str, exclude: bool, order: i64) -> Self {
        Self {
            group_title: group_title.to_string(),
            override_title: None,
            channel_count: 0,
            exclude,
            order: Some(order),
        }
    }

    /// Configured replacement title, when it actually changes anything
    pub fn active_override(&self) -> Option<&str> {
        self.override_title
            .as_deref()
            .filter(|o| !o.is_empty() && *o != self.group_title)
    }

    /// Title used for matching, ordering and output
    pub fn effective_title(&self) -> &str {
        self.active_override().unwrap_or(&self.group_title)
    }
}

/// Lookup structures derived from the entries
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    /// Effective titles with exclude=false
    pub include: BTreeSet<String>,
    /// Effective titles with exclude=true
    pub exclude: BTreeSet<String>,
    /// Raw group title -> override title
    pub overrides: HashMap<String, String>,
    /// Effective title -> order (first entry wins)
    pub orders: HashMap<String, i64>,
}

impl GroupIndex {
    pub fn is_known(&self, effective_title: &str) -> bool {
        self.include.contains(effective_title) || self.exclude.contains(effective_title)
    }
}

/// Point every override at the end of its chain, so an override target is
/// never rewritten again. Titles caught in a cycle keep their own name.
fn resolve_override_chains(overrides: &HashMap<String, String>) -> HashMap<String, String> {
    let mut resolved = HashMap::with_capacity(overrides.len());
    for (raw, first) in overrides {
        let mut visited: HashSet<&str> = HashSet::from([raw.as_str()]);
        let mut target = first;
        let mut cyclic = false;
        while let Some(next) = overrides.get(target) {
            if !visited.insert(target.as_str()) {
                cyclic = true;
                break;
            }
            target = next;
        }
        if cyclic {
            warn!("Override chain for '{}' loops back on itself; ignoring it", raw);
            continue;
        }
        resolved.insert(raw.clone(), target.clone());
    }
    resolved
}

/// Entries sharing one `group_title`
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub group_title: String,
    pub entries: Vec<GroupConfigEntry>,
}

/// Configured channel count that no longer matches the playlist
#[derive(Debug, Clone, PartialEq)]
pub struct CountDivergence {
    pub group_title: String,
    pub configured: u64,
    pub actual: u64,
}

/// What to do with the bulk entry when its sub-categories are integrated
#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum BulkDisposition {
    /// Rename it to hold only the leftover (Other) channels
    RenameToOther,
    /// Mark it exclude=true
    Exclude,
    /// Leave it untouched
    Keep,
}

/// Ordered list of group configuration entries backed by a JSON file
#[derive(Debug, Clone, Default)]
pub struct GroupConfigStore {
    entries: Vec<GroupConfigEntry>,
}

impl GroupConfigStore {
    pub fn new(entries: Vec<GroupConfigEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self, CuratorError> {
        if !path.exists() {
            return Err(CuratorError::InputMissing(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| CuratorError::io(path, e))?;
        let entries: Vec<GroupConfigEntry> =
            serde_json::from_str(&content).map_err(|source| CuratorError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Loaded {} group entries from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    /// Load, treating a missing file as "nothing configured". A file that
    /// exists but does not parse is still an error.
    pub fn load_or_empty(path: &Path) -> Result<Self, CuratorError> {
        match Self::load(path) {
            Err(CuratorError::InputMissing(_)) => {
                warn!(
                    "Group configuration {} not found; continuing with nothing configured",
                    path.display()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Write entries as pretty JSON, backing up any existing file first.
    /// Returns the backup path when one was made.
    pub fn save(&self, path: &Path) -> Result<Option<PathBuf>, CuratorError> {
        let backup = if path.exists() {
            Some(backup_file(path)?)
        } else {
            None
        };
        let content =
            serde_json::to_string_pretty(&self.entries).map_err(|source| CuratorError::ConfigWrite {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CuratorError::output(parent, e))?;
        }
        fs::write(path, content).map_err(|e| CuratorError::output(path, e))?;
        Ok(backup)
    }

    pub fn into_entries(self) -> Vec<GroupConfigEntry> {
        self.entries
    }

    pub fn entries(&self) -> &[GroupConfigEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> GroupIndex {
        let mut index = GroupIndex::default();
        for entry in &self.entries {
            let effective = entry.effective_title().to_string();
            if let Some(over) = entry.active_override() {
                index
                    .overrides
                    .entry(entry.group_title.clone())
                    .or_insert_with(|| over.to_string());
            }
            if let Some(order) = entry.order {
                index.orders.entry(effective.clone()).or_insert(order);
            }
            if entry.exclude {
                index.exclude.insert(effective);
            } else {
                index.include.insert(effective);
            }
        }
        index.overrides = resolve_override_chains(&index.overrides);
        index
    }

    /// Entry whose original or effective title is `title`
    pub fn lookup(&self, title: &str) -> Option<&GroupConfigEntry> {
        self.entries
            .iter()
            .find(|e| e.group_title == title)
            .or_else(|| self.entries.iter().find(|e| e.effective_title() == title))
    }

    pub fn duplicates(&self) -> Vec<DuplicateGroup> {
        let mut seen: Vec<DuplicateGroup> = Vec::new();
        for entry in &self.entries {
            match seen.iter_mut().find(|d| d.group_title == entry.group_title) {
                Some(d) => d.entries.push(entry.clone()),
                None => seen.push(DuplicateGroup {
                    group_title: entry.group_title.clone(),
                    entries: vec![entry.clone()],
                }),
            }
        }
        seen.retain(|d| d.entries.len() > 1);
        seen
    }

    /// Entries whose `group_title` does not occur in the playlist
    pub fn missing_from(&self, playlist_groups: &BTreeSet<String>) -> Vec<&GroupConfigEntry> {
        self.entries
            .iter()
            .filter(|e| !playlist_groups.contains(&e.group_title))
            .collect()
    }

    /// Drop entries missing from the playlist; returns the removed entries
    pub fn remove_missing(&mut self, playlist_groups: &BTreeSet<String>) -> Vec<GroupConfigEntry> {
        let (kept, removed): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|e| playlist_groups.contains(&e.group_title));
        self.entries = kept;
        removed
    }

    /// Include entries first, then ascending order (stable)
    pub fn sort_by_flag_and_order(&mut self) {
        self.entries
            .sort_by_key(|e| (e.exclude, e.order.unwrap_or(i64::MAX)));
    }

    fn max_order(&self) -> i64 {
        self.entries.iter().filter_map(|e| e.order).max().unwrap_or(0)
    }

    /// Append newly discovered groups after the current highest order:
    /// included ones first, then excluded ones, each alphabetically.
    pub fn append_discovered(
        &mut self,
        auto_included: &BTreeSet<String>,
        auto_excluded: &BTreeSet<String>,
        counts: &HashMap<String, usize>,
    ) -> usize {
        let mut next = self.max_order();
        let mut added = 0;
        let batches = [(auto_included, false), (auto_excluded, true)];
        for (titles, exclude) in batches {
            for title in titles {
                if self.entries.iter().any(|e| &e.group_title == title) {
                    continue;
                }
                next += 1;
                let mut entry = GroupConfigEntry::new(title, exclude, next);
                entry.channel_count = counts.get(title).copied().unwrap_or(0) as u64;
                self.entries.push(entry);
                added += 1;
            }
        }
        added
    }

    /// Insert sub-category entries right after the bulk entry, renumbering
    /// every later entry. Returns false when the bulk entry is absent.
    pub fn integrate_subgroups(
        &mut self,
        bulk_title: &str,
        mut subgroups: Vec<GroupConfigEntry>,
        disposition: BulkDisposition,
        leftover_count: u64,
    ) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.group_title == bulk_title) else {
            return false;
        };
        subgroups.retain(|s| !self.entries.iter().any(|e| e.group_title == s.group_title));

        let shift = subgroups.len() as i64;
        for entry in self.entries.iter_mut().skip(pos + 1) {
            if let Some(order) = entry.order.as_mut() {
                *order += shift;
            }
        }

        let bulk = &mut self.entries[pos];
        let base = bulk.order.unwrap_or(0) + 1;
        match disposition {
            BulkDisposition::RenameToOther => {
                bulk.group_title = crate::classifier::Category::Other.group_title();
                bulk.channel_count = leftover_count;
            }
            BulkDisposition::Exclude => bulk.exclude = true,
            BulkDisposition::Keep => {}
        }

        for (i, sub) in subgroups.iter_mut().enumerate() {
            sub.order = Some(base + i as i64);
        }
        let tail = self.entries.split_off(pos + 1);
        self.entries.extend(subgroups);
        self.entries.extend(tail);
        true
    }

    /// Configured channel counts that differ from `actual` (keyed by raw title)
    pub fn count_divergence(&self, actual: &[(String, usize)]) -> Vec<CountDivergence> {
        actual
            .iter()
            .filter_map(|(title, count)| {
                let entry = self.entries.iter().find(|e| &e.group_title == title)?;
                (entry.channel_count != *count as u64).then(|| CountDivergence {
                    group_title: title.clone(),
                    configured: entry.channel_count,
                    actual: *count as u64,
                })
            })
            .collect()
    }
}

/// Copy `path` to `<path>.backup_<YYYYmmdd_HHMMSS>` and return the copy's path
pub fn backup_file(path: &Path) -> Result<PathBuf, CuratorError> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".backup_{}", stamp));
    let backup = PathBuf::from(name);
    fs::copy(path, &backup).map_err(|e| CuratorError::output(&backup, e))?;
    info!("Created backup: {}", backup.display());
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"[
  {"group_title": "News", "channel_count": 10, "exclude": "false", "order": 1},
  {"group_title": "Adult", "channel_count": 5, "exclude": "true", "order": 2},
  {"group_title": "UK| Entertainment ᴴᴰ", "override_title": "UK TV", "channel_count": 3, "exclude": "false", "order": 3},
  {"group_title": "Same", "override_title": "Same", "channel_count": 1, "exclude": "false", "order": 4},
  {"group_title": "Blank", "override_title": "", "channel_count": 1, "exclude": "false"}
]"#
    }

    fn sample_store() -> GroupConfigStore {
        let entries: Vec<GroupConfigEntry> = serde_json::from_str(sample_json()).unwrap();
        GroupConfigStore::new(entries)
    }

    #[test]
    fn test_index_uses_effective_titles() {
        let index = sample_store().index();
        assert!(index.include.contains("News"));
        assert!(index.include.contains("UK TV"));
        assert!(!index.include.contains("UK| Entertainment ᴴᴰ"));
        assert!(index.include.contains("Same"));
        assert!(index.include.contains("Blank"));
        assert!(index.exclude.contains("Adult"));
        assert_eq!(index.overrides.len(), 1);
        assert_eq!(index.overrides["UK| Entertainment ᴴᴰ"], "UK TV");
        assert_eq!(index.orders.get("UK TV"), Some(&3));
        assert_eq!(index.orders.get("Blank"), None);
    }

    #[test]
    fn test_index_flattens_override_chains() {
        let mut a = GroupConfigEntry::new("A", false, 1);
        a.override_title = Some("B".to_string());
        let mut b = GroupConfigEntry::new("B", false, 2);
        b.override_title = Some("C".to_string());
        let index = GroupConfigStore::new(vec![a, b]).index();
        assert_eq!(index.overrides["A"], "C");
        assert_eq!(index.overrides["B"], "C");
        assert!(!index.overrides.contains_key("C"));
        assert!(index.is_known("C"));
    }

    #[test]
    fn test_index_drops_override_cycles() {
        let mut a = GroupConfigEntry::new("A", false, 1);
        a.override_title = Some("B".to_string());
        let mut b = GroupConfigEntry::new("B", false, 2);
        b.override_title = Some("A".to_string());
        let index = GroupConfigStore::new(vec![a, b]).index();
        assert!(index.overrides.is_empty());
        assert!(index.is_known("A") && index.is_known("B"));
    }

    #[test]
    fn test_lookup_by_original_or_override() {
        let store = sample_store();
        assert_eq!(store.lookup("UK TV").unwrap().group_title, "UK| Entertainment ᴴᴰ");
        assert_eq!(store.lookup("UK| Entertainment ᴴᴰ").unwrap().order, Some(3));
        assert!(store.lookup("Nope").is_none());
    }

    #[test]
    fn test_flag_accepts_bool_and_writes_string() {
        let entry: GroupConfigEntry =
            serde_json::from_str(r#"{"group_title": "X", "exclude": false, "order": 1}"#).unwrap();
        assert!(!entry.exclude);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""exclude":"false""#));
        assert!(!json.contains("override_title"));
    }

    #[test]
    fn test_duplicates_detected_not_repaired() {
        let mut entries: Vec<GroupConfigEntry> = serde_json::from_str(sample_json()).unwrap();
        entries.push(GroupConfigEntry::new("News", true, 9));
        let store = GroupConfigStore::new(entries);
        let dups = store.duplicates();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].group_title, "News");
        assert_eq!(dups[0].entries.len(), 2);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_save_and_load_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GROUP_CONFIG_FILE);
        let store = sample_store();

        assert!(store.save(&path).unwrap().is_none());
        let backup = store.save(&path).unwrap().expect("second save backs up");
        assert!(backup.exists());

        let loaded = GroupConfigStore::load(&path).unwrap();
        assert_eq!(loaded.entries(), store.entries());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            GroupConfigStore::load(&missing),
            Err(CuratorError::InputMissing(_))
        ));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "[{\"group_title\": ").unwrap();
        assert!(matches!(
            GroupConfigStore::load(&broken),
            Err(CuratorError::ConfigParse { .. })
        ));
        assert!(GroupConfigStore::load_or_empty(&broken).is_err());
        assert!(GroupConfigStore::load_or_empty(&missing).unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing() {
        let mut store = sample_store();
        let present: BTreeSet<String> = ["News", "Adult"].iter().map(|s| s.to_string()).collect();
        assert_eq!(store.missing_from(&present).len(), 3);
        let removed = store.remove_missing(&present);
        assert_eq!(removed.len(), 3);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_sort_by_flag_and_order() {
        let mut store = GroupConfigStore::new(vec![
            GroupConfigEntry::new("C", true, 1),
            GroupConfigEntry::new("B", false, 5),
            GroupConfigEntry::new("A", false, 2),
        ]);
        store.sort_by_flag_and_order();
        let titles: Vec<&str> = store.entries().iter().map(|e| e.group_title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_append_discovered_after_max_order() {
        let mut store = sample_store();
        let inc: BTreeSet<String> = ["New B", "New A"].iter().map(|s| s.to_string()).collect();
        let exc: BTreeSet<String> = ["FR| Adult HD".to_string()].into_iter().collect();
        let counts: HashMap<String, usize> = [("New A".to_string(), 7)].into_iter().collect();
        assert_eq!(store.append_discovered(&inc, &exc, &counts), 3);

        let tail: Vec<(&str, bool, Option<i64>)> = store.entries()[5..]
            .iter()
            .map(|e| (e.group_title.as_str(), e.exclude, e.order))
            .collect();
        assert_eq!(
            tail,
            vec![
                ("New A", false, Some(5)),
                ("New B", false, Some(6)),
                ("FR| Adult HD", true, Some(7)),
            ]
        );
        assert_eq!(store.entries()[5].channel_count, 7);
    }

    #[test]
    fn test_integrate_subgroups_shifts_orders() {
        let mut store = GroupConfigStore::new(vec![
            GroupConfigEntry::new("News", false, 1),
            GroupConfigEntry::new("24/7 Channels", false, 2),
            GroupConfigEntry::new("Sports", false, 3),
        ]);
        let subs = vec![
            GroupConfigEntry::new("24/7 Kids", false, 0),
            GroupConfigEntry::new("24/7 Movies", false, 0),
        ];
        assert!(store.integrate_subgroups("24/7 Channels", subs, BulkDisposition::RenameToOther, 4));

        let view: Vec<(&str, Option<i64>)> = store
            .entries()
            .iter()
            .map(|e| (e.group_title.as_str(), e.order))
            .collect();
        assert_eq!(
            view,
            vec![
                ("News", Some(1)),
                ("24/7 Other", Some(2)),
                ("24/7 Kids", Some(3)),
                ("24/7 Movies", Some(4)),
                ("Sports", Some(5)),
            ]
        );
        assert_eq!(store.entries()[1].channel_count, 4);
        assert!(!store.integrate_subgroups("Missing", vec![], BulkDisposition::Keep, 0));
    }

    #[test]
    fn test_count_divergence() {
        let store = sample_store();
        let actual = vec![("News".to_string(), 10), ("Adult".to_string(), 8), ("Unknown".to_string(), 1)];
        let diverged = store.count_divergence(&actual);
        assert_eq!(
            diverged,
            vec![CountDivergence {
                group_title: "Adult".to_string(),
                configured: 5,
                actual: 8
            }]
        );
    }
}
