//! Name-based classification of channels in the bulk "24/7" group.
//!
//! The pattern table is data: an ordered list of categories, each with an
//! ordered list of case-insensitive, unanchored regexes. The first category
//! with any matching pattern wins; names matching nothing fall into the
//! table's catch-all.

use crate::parser::ChannelRecord;
use once_cell::sync::Lazy;
use regex::Regex;

/// Group whose channels need sub-classification
pub const BULK_GROUP: &str = "24/7 Channels";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Kids,
    Movies,
    TvShows,
    Other,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Kids,
            Category::Movies,
            Category::TvShows,
            Category::Other,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Kids => "Kids",
            Category::Movies => "Movies",
            Category::TvShows => "TV Shows",
            Category::Other => "Other",
        }
    }

    /// Group title the bulk split assigns, e.g. `24/7 Kids`
    pub fn group_title(&self) -> String {
        format!("24/7 {}", self.display_name())
    }

    /// File-name slug, e.g. `tv_shows`
    pub fn slug(&self) -> String {
        self.display_name().replace(' ', "_").to_lowercase()
    }
}

/// Ordered category → patterns table
#[derive(Debug, Clone)]
pub struct PatternTable {
    categories: Vec<(Category, Vec<Regex>)>,
    fallback: Category,
}

impl PatternTable {
    /// Build a table from pattern sources. Patterns are compiled
    /// case-insensitively; an invalid pattern is an error.
    pub fn new(
        categories: &[(Category, &[&str])],
        fallback: Category,
    ) -> Result<Self, regex::Error> {
        let mut compiled = Vec::with_capacity(categories.len());
        for (category, patterns) in categories {
            let regexes = patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){}", p)))
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push((*category, regexes));
        }
        Ok(Self {
            categories: compiled,
            fallback,
        })
    }

    pub fn fallback(&self) -> Category {
        self.fallback
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.iter().map(|(c, _)| *c)
    }
}

const KIDS_PATTERNS: &[&str] = &[
    r"\bkids?\b",
    r"\bchild(ren)?\b",
    r"\bcartoons?\b",
    r"\banimated?\b",
    r"\bdisney\b",
    r"\bnickelodeon\b",
    r"\bcartoon network\b",
    r"\bpbs kids\b",
    r"\bsesame street\b",
    r"\bdora\b",
    r"\bspongebob\b",
    r"\bpaw patrol\b",
    r"\bpeppa pig\b",
    r"\bbaby\b",
    r"\btoddler\b",
    r"\bpreschool\b",
    r"\bfamily friendly\b",
    r"\ball ages\b",
    r"\bjunior\b",
    r"\bteenage mutant ninja turtles\b",
    r"\bscooby doo?\b",
    r"\brugrats\b",
    r"\bpokemon\b",
    r"\bmr bean\b",
    r"\bmickey mouse clubhouse\b",
    r"\btiny toons?\b",
    r"\bthundercats\b",
    r"\bflintstones?\b",
    r"\bjetsons?\b",
    r"\btransformers?\b",
];

const MOVIES_PATTERNS: &[&str] = &[
    r"\bmovies?\b",
    r"\bfilms?\b",
    r"\bcinema\b",
    r"\bhollywood\b",
    r"\bbox office\b",
    r"\bblockbuster\b",
    r"\bclassic\b",
    r"\baction\b",
    r"\bcomedy\b",
    r"\bdrama\b",
    r"\bthriller\b",
    r"\bhorror\b",
    r"\bsci-?fi\b",
    r"\bwestern\b",
    r"\bromance\b",
    r"\badventure\b",
    r"\bfantasy\b",
    r"\bmystery\b",
    r"\bcrime\b",
    r"\bwar\b",
    r"\badam sandler\b",
    r"\bal pacino\b",
    r"\barnold schwarzenegger\b",
    r"\bbrad pitt\b",
    r"\beddie? murphy\b",
    r"\bjim carrey\b",
    r"\bwill ferrell\b",
    r"\bjohnny depp\b",
    r"\bsteven seagal\b",
    r"\bsylvester stallone?\b",
    r"\bdenzel washington\b",
    r"\bvan damme\b",
    r"\bclint eastwood\b",
    r"\bliam neeson\b",
    r"\bstar wars\b",
    r"\bharry potter\b",
    r"\bback to the future\b",
    r"\bjurassic\b",
    r"\bindiana jones\b",
    r"\bjames bond\b",
    r"\bfast.*furious\b",
    r"\bmatrix\b",
    r"\bdie hard\b",
    r"\bterminator\b",
    r"\bmission impossible\b",
    r"\blethal weapon\b",
    r"\brambo\b",
    r"\brocky\b",
    r"\bbatman\b",
    r"\bspider.?man\b",
    r"\biron man\b",
    r"\bcaptain america\b",
    r"\bmarvel\b",
    r"\bavengers\b",
    r"\bx.?men\b",
    r"\bmen in black\b",
    r"\balien\b",
    r"\bhalloween\b",
    r"\bfriday.*13th\b",
    r"\bpredator\b",
    r"\bjohn wick\b",
    r"\bpirates.*caribbean\b",
    r"\blord.*rings\b",
    r"\bhobbit\b",
    r"\bpolice academy\b",
    r"\bamerican pie\b",
    r"\bjumanji\b",
    r"\bhunger games\b",
    r"\bmortal kombat\b",
    r"\bchucky\b",
    r"\bthe conjuring\b",
    r"\bthe expendables\b",
    r"\bausti?n powers\b",
    r"\brush hour\b",
    r"\bhbo\b",
    r"\bshowtime\b",
    r"\bstarz\b",
    r"\bcinemax\b",
    r"\bparamount\b",
];

const TV_SHOWS_PATTERNS: &[&str] = &[
    r"\btv shows?\b",
    r"\bseries\b",
    r"\bepisodes?\b",
    r"\bsitcom\b",
    r"\bsoap opera\b",
    r"\breality\b",
    r"\btalk show\b",
    r"\bgame show\b",
    r"\bdocumentary\b",
    r"\bnews\b",
    r"\bvariety\b",
    r"\bclassic tv\b",
    r"\bshow\b",
    r"\bcooking\b",
    r"\bchef\b",
    r"\bkitchen\b",
    r"\badults? only\b",
    r"\bafter dark\b",
    r"\bfriends\b",
    r"\bseinfeld\b",
    r"\bthe office\b",
    r"\bbig bang theory\b",
    r"\bbreaking bad\b",
    r"\bwalking dead\b",
    r"\bsimpsons\b",
    r"\bfamily guy\b",
    r"\bsouth park\b",
    r"\bamerican dad\b",
    r"\bfuturama\b",
    r"\bking.*hill\b",
    r"\bbobs.*burgers\b",
    r"\bcharmed\b",
    r"\bprison break\b",
    r"\bncis\b",
    r"\bcsi\b",
    r"\blaw.*order\b",
    r"\bcriminal minds\b",
    r"\bx.?files\b",
    r"\bstar trek\b",
    r"\bstargate\b",
    r"\bdoctor who\b",
    r"\bdexter\b",
    r"\bsopranos\b",
    r"\bi love lucy\b",
    r"\bfrasier\b",
    r"\bcheers\b",
    r"\bfull house\b",
    r"\bfresh prince\b",
    r"\bsaved by the bell\b",
    r"\bhappy days\b",
    r"\bknight rider\b",
    r"\bmacgyver\b",
    r"\bmiami vice\b",
    r"\bmodern family\b",
    r"\bcolumbo\b",
    r"\bgolden girls\b",
    r"\bbaywatch\b",
    r"\bbewitched\b",
    r"\bbrooklyn nine.?nine\b",
    r"\bcops\b",
    r"\bscrubs\b",
    r"\bthat.*70s\b",
    r"\bwill.*grace\b",
];

/// The default table used for the bulk group: Kids, Movies, TV Shows, then
/// the Other catch-all.
pub static DEFAULT_TABLE: Lazy<PatternTable> = Lazy::new(|| {
    PatternTable::new(
        &[
            (Category::Kids, KIDS_PATTERNS),
            (Category::Movies, MOVIES_PATTERNS),
            (Category::TvShows, TV_SHOWS_PATTERNS),
        ],
        Category::Other,
    )
    .unwrap()
});

/// Category of a channel name: first category in table order with any
/// matching pattern, else the table's catch-all.
pub fn classify(name: &str, table: &PatternTable) -> Category {
    let lower = name.to_lowercase();
    table
        .categories
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&lower)))
        .map(|(category, _)| *category)
        .unwrap_or(table.fallback)
}

/// Records of one category after a bulk split, group titles rewritten
#[derive(Debug, Clone)]
pub struct CategoryBucket {
    pub category: Category,
    pub records: Vec<ChannelRecord>,
}

/// Classify every record of `bulk_title` and return one bucket per category
/// in table order (catch-all last). Records of other groups are ignored.
pub fn split_bulk_group(
    records: &[ChannelRecord],
    bulk_title: &str,
    table: &PatternTable,
) -> Vec<CategoryBucket> {
    let mut buckets: Vec<CategoryBucket> = table
        .categories()
        .chain(std::iter::once(table.fallback()))
        .map(|category| CategoryBucket {
            category,
            records: Vec::new(),
        })
        .collect();

    for record in records.iter().filter(|r| r.group_title() == Some(bulk_title)) {
        let category = classify(&record.display_name, table);
        if let Some(bucket) = buckets.iter_mut().find(|b| b.category == category) {
            bucket
                .records
                .push(record.with_group_title(&category.group_title()));
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GROUP_TITLE;

    #[test]
    fn test_kids_evaluated_before_movies() {
        assert_eq!(
            classify("Scooby Doo Movie Marathon", &DEFAULT_TABLE),
            Category::Kids
        );
    }

    #[test]
    fn test_match_is_case_insensitive_and_unanchored() {
        assert_eq!(classify("24/7 THE MATRIX TRILOGY", &DEFAULT_TABLE), Category::Movies);
        assert_eq!(classify("Classic SEINFELD", &DEFAULT_TABLE), Category::Movies);
        assert_eq!(classify("24/7 Seinfeld", &DEFAULT_TABLE), Category::TvShows);
    }

    #[test]
    fn test_word_boundaries() {
        // "warehouse" must not trigger the "war" pattern
        assert_eq!(classify("Warehouse 13", &DEFAULT_TABLE), Category::Other);
        assert_eq!(classify("War Documentaries", &DEFAULT_TABLE), Category::Movies);
    }

    #[test]
    fn test_unmatched_falls_back() {
        assert_eq!(classify("Yule Log Fireplace", &DEFAULT_TABLE), Category::Other);
        assert_eq!(classify("", &DEFAULT_TABLE), Category::Other);
    }

    #[test]
    fn test_custom_table_order_matters() {
        let movies: &[&str] = &[r"\bmovies?\b"];
        let kids: &[&str] = &[r"scooby doo"];
        let table = PatternTable::new(
            &[(Category::Movies, movies), (Category::Kids, kids)],
            Category::Other,
        )
        .unwrap();
        assert_eq!(classify("Scooby Doo Movie Marathon", &table), Category::Movies);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let broken: &[&str] = &["(unclosed"];
        assert!(PatternTable::new(&[(Category::Kids, broken)], Category::Other).is_err());
    }

    #[test]
    fn test_split_bulk_group() {
        let records = vec![
            ChannelRecord::new("24/7 Paw Patrol", "http://x/1").with_attribute(GROUP_TITLE, BULK_GROUP),
            ChannelRecord::new("24/7 Rocky", "http://x/2").with_attribute(GROUP_TITLE, BULK_GROUP),
            ChannelRecord::new("CNN", "http://x/3").with_attribute(GROUP_TITLE, "US| News"),
            ChannelRecord::new("24/7 Fireplace", "http://x/4").with_attribute(GROUP_TITLE, BULK_GROUP),
        ];
        let buckets = split_bulk_group(&records, BULK_GROUP, &DEFAULT_TABLE);
        let categories: Vec<Category> = buckets.iter().map(|b| b.category).collect();
        assert_eq!(categories, Category::all());

        assert_eq!(buckets[0].records.len(), 1);
        assert_eq!(buckets[0].records[0].group_title(), Some("24/7 Kids"));
        assert_eq!(buckets[1].records[0].display_name, "24/7 Rocky");
        assert!(buckets[2].records.is_empty());
        assert_eq!(buckets[3].records[0].group_title(), Some("24/7 Other"));

        let total: usize = buckets.iter().map(|b| b.records.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::TvShows.group_title(), "24/7 TV Shows");
        assert_eq!(Category::TvShows.slug(), "tv_shows");
    }
}
