//! Decides the fate of groups the configuration has never seen.
//!
//! Inclusion is the default. A new group is excluded only when it shares an
//! exclusion keyword group with a group the operator already excluded, and,
//! when it carries a region prefix like `FR|`, only if that excluded group
//! has the same prefix.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static REGION_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]{2}\|)").unwrap());

/// Named list of lower-case keywords
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordGroup {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

impl KeywordGroup {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

pub const DEFAULT_KEYWORD_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        name: "adult",
        keywords: &["adult", "xxx", "for adults"],
    },
    KeywordGroup {
        name: "local_networks",
        keywords: &["network", "affiliates", "local"],
    },
    KeywordGroup {
        name: "guides",
        keywords: &["guide", "tv guide"],
    },
    KeywordGroup {
        name: "low_quality",
        keywords: &[" sd", "sd "],
    },
    KeywordGroup {
        name: "specific_sports",
        keywords: &["nfl", "nba", "nhl", "mlb"],
    },
    KeywordGroup {
        name: "hevc",
        keywords: &["hevc", "h265"],
    },
];

/// Outcome for one unknown group
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub exclude: bool,
    pub reason: String,
    /// Keyword group that justified an exclusion
    pub keyword_group: Option<&'static str>,
}

impl Resolution {
    fn include(reason: String) -> Self {
        Self {
            exclude: false,
            reason,
            keyword_group: None,
        }
    }
}

/// `XX|` prefix of a group title, if present
pub fn region_prefix(title: &str) -> Option<&str> {
    REGION_PREFIX_RE
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone)]
pub struct UnknownGroupResolver {
    keyword_groups: Vec<KeywordGroup>,
}

impl Default for UnknownGroupResolver {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORD_GROUPS.to_vec())
    }
}

impl UnknownGroupResolver {
    pub fn new(keyword_groups: Vec<KeywordGroup>) -> Self {
        Self { keyword_groups }
    }

    pub fn resolve(&self, title: &str, exclude_set: &BTreeSet<String>) -> Resolution {
        let prefix = region_prefix(title);
        let candidates: Vec<String> = exclude_set
            .iter()
            .filter(|g| prefix.map_or(true, |p| g.starts_with(p)))
            .map(|g| g.to_lowercase())
            .collect();

        if let Some(p) = prefix {
            if candidates.is_empty() {
                return Resolution::include(format!("No excluded groups found with prefix '{}'", p));
            }
        }

        let lowered = title.to_lowercase();
        for group in &self.keyword_groups {
            if !group.matches(&lowered) {
                continue;
            }
            if let Some(precedent) = candidates.iter().find(|c| group.matches(c)) {
                return Resolution {
                    exclude: true,
                    reason: format!(
                        "Matches {} exclusion pattern (similar to excluded '{}')",
                        group.name, precedent
                    ),
                    keyword_group: Some(group.name),
                };
            }
        }

        Resolution::include(match prefix {
            Some(p) => format!("No matching exclusion patterns found for prefix '{}'", p),
            None => "No prefix and no matching exclusion patterns".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(titles: &[&str]) -> BTreeSet<String> {
        titles.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prefix_and_keyword_precedent_excludes() {
        let r = UnknownGroupResolver::default().resolve("FR|Adult HD", &set(&["FR|Adult SD"]));
        assert!(r.exclude);
        assert_eq!(r.keyword_group, Some("adult"));
        assert!(r.reason.contains("adult"));
    }

    #[test]
    fn test_prefix_without_keyword_overlap_includes() {
        let r = UnknownGroupResolver::default().resolve("FR|Documentaries", &set(&["FR|Adult SD"]));
        assert!(!r.exclude);
        assert_eq!(r.keyword_group, None);
    }

    #[test]
    fn test_no_prefix_no_overlap_includes() {
        let r = UnknownGroupResolver::default()
            .resolve("Random New Category", &set(&["Adult", "US| NFL Network"]));
        assert!(!r.exclude);
    }

    #[test]
    fn test_prefix_with_no_excluded_siblings_includes() {
        let r = UnknownGroupResolver::default().resolve("DE|Adult", &set(&["FR|Adult SD"]));
        assert!(!r.exclude);
        assert!(r.reason.contains("DE|"));
    }

    #[test]
    fn test_no_prefix_compares_against_everything() {
        let r = UnknownGroupResolver::default()
            .resolve("Local Affiliates East", &set(&["US| ABC Network"]));
        assert!(r.exclude);
        assert_eq!(r.keyword_group, Some("local_networks"));
    }

    #[test]
    fn test_prefix_shape_is_strict() {
        assert_eq!(region_prefix("UK| Sports"), Some("UK|"));
        assert_eq!(region_prefix("uk| Sports"), None);
        assert_eq!(region_prefix("USA| Sports"), None);
        assert_eq!(region_prefix(" UK| Sports"), None);
    }

    #[test]
    fn test_custom_keyword_table() {
        let resolver = UnknownGroupResolver::new(vec![KeywordGroup {
            name: "religious",
            keywords: &["church"],
        }]);
        let excluded = set(&["US| Church TV"]);
        assert!(resolver.resolve("US| Church Live", &excluded).exclude);
        assert!(!resolver.resolve("US| Adult", &set(&["US| Adult SD"])).exclude);
    }
}
