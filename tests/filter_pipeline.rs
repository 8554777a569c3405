use iptv_curator_lib::classifier::{split_bulk_group, BULK_GROUP, DEFAULT_TABLE};
use iptv_curator_lib::config::{GroupConfigEntry, GroupConfigStore};
use iptv_curator_lib::filter::{filter, BulkMerge, FilterEngine, FilterOptions};
use iptv_curator_lib::parser::{parse_file, parse_playlist, ParseOptions, ParsedPlaylist};
use iptv_curator_lib::serializer::{serialize, write_playlist};
use std::fs;

const UPSTREAM: &str = r#####"#EXTM3U
#EXTINF:-1 tvg-id="cnn.us" tvg-name="CNN" group-title="US| News ᴴᴰ",CNN
http://DNS/live/USERNAME/PASSWORD/1.ts
#EXTINF:-1 tvg-name="Hot" group-title="FR|Adult SD",Hot
http://DNS/live/USERNAME/PASSWORD/2.ts
#EXTINF:-1 tvg-name="#### FRANCE ####" group-title="FR| Cinema",#### FRANCE ####
http://DNS/live/USERNAME/PASSWORD/3.ts
#EXTINF:-1 tvg-name="Canal" group-title="FR| Cinema",Canal+ Cinema
http://DNS/live/USERNAME/PASSWORD/4.ts
#EXTINF:-1 tvg-name="Late" group-title="FR|Adult HD",Late Night
http://DNS/live/USERNAME/PASSWORD/5.ts
#EXTINF:-1 tvg-name="Arte" group-title="FR|Documentaries",Arte
http://DNS/live/USERNAME/PASSWORD/6.ts
#EXTINF:-1 tvg-name="Paw" group-title="24/7 Channels",24/7 Paw Patrol
http://DNS/live/USERNAME/PASSWORD/7.ts
#EXTINF:-1 tvg-name="Seinfeld" group-title="24/7 Channels",24/7 Seinfeld
http://DNS/live/USERNAME/PASSWORD/8.ts
#EXTINF:-1 tvg-name="BBC" group-title="UK| News",BBC News
http://DNS/live/USERNAME/PASSWORD/9.ts
"#####;

fn config() -> GroupConfigStore {
    let mut news = GroupConfigEntry::new("US| News ᴴᴰ", false, 2);
    news.override_title = Some("US News".to_string());
    GroupConfigStore::new(vec![
        news,
        GroupConfigEntry::new("FR| Cinema", false, 1),
        GroupConfigEntry::new("FR|Adult SD", true, 3),
        GroupConfigEntry::new("UK| News", true, 4),
        GroupConfigEntry::new("24/7 Kids", false, 5),
        GroupConfigEntry::new("24/7 TV Shows", false, 6),
        GroupConfigEntry::new(BULK_GROUP, false, 7),
    ])
}

#[test]
fn test_full_pipeline_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("downloaded_file.m3u");
    fs::write(&input, UPSTREAM).unwrap();

    let parsed = parse_file(&input, &ParseOptions::default()).unwrap();
    assert_eq!(parsed.stats.placeholders, 1);

    let outcome = filter(vec![parsed], &config());
    let names: Vec<&str> = outcome.records.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Canal+ Cinema", "CNN", "24/7 Paw Patrol", "24/7 Seinfeld", "Arte"]
    );
    assert_eq!(outcome.records[1].group_title(), Some("US News"));

    let r = &outcome.report;
    assert_eq!(r.total, 8);
    assert_eq!(r.included_known, 4);
    assert_eq!(r.included_unknown, 1);
    assert_eq!(r.excluded_known, 2);
    assert_eq!(r.excluded_unknown, 1);
    assert_eq!(r.overridden, 1);
    assert!(r.is_balanced());

    let output = dir.path().join("out").join("filtered.m3u");
    write_playlist(&output, &outcome.records).unwrap();
    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("#EXTM3U\n"));
    assert!(written.contains("http://DNS/live/USERNAME/PASSWORD/1.ts"));
}

#[test]
fn test_second_pass_is_identical() {
    let parsed = parse_playlist(UPSTREAM, "upstream", &ParseOptions::default());
    let first = serialize(&filter(vec![parsed], &config()).records);
    let reparsed = parse_playlist(&first, "first", &ParseOptions::default());
    let second = serialize(&filter(vec![reparsed], &config()).records);
    assert_eq!(first, second);
}

#[test]
fn test_split_then_merge_bulk_group() {
    let parsed = parse_playlist(UPSTREAM, "upstream", &ParseOptions::default());
    let buckets = split_bulk_group(&parsed.records, BULK_GROUP, &DEFAULT_TABLE);
    let subcategories: Vec<ParsedPlaylist> = buckets
        .into_iter()
        .map(|b| ParsedPlaylist::from_records(&b.category.slug(), b.records))
        .collect();

    let options = FilterOptions {
        bulk_merge: Some(BulkMerge {
            placeholder_group: BULK_GROUP.to_string(),
            subcategories,
        }),
        ..Default::default()
    };
    let outcome = FilterEngine::new(&config(), options).filter(vec![parsed]);

    let groups: Vec<&str> = outcome.groups.iter().map(|g| g.title.as_str()).collect();
    assert_eq!(
        groups,
        vec!["FR| Cinema", "US News", "24/7 Kids", "24/7 TV Shows", "FR|Documentaries"]
    );
    assert_eq!(outcome.report.merge.removed, 2);
    assert_eq!(outcome.report.merge.appended, 2);
    assert!(outcome
        .records
        .iter()
        .all(|r| r.group_title() != Some(BULK_GROUP)));
}

#[test]
fn test_multiple_sources_keep_arrival_order() {
    let a = parse_playlist(
        "#EXTINF:-1 group-title=\"FR| Cinema\",A1\nhttp://a/1\n#EXTINF:-1 group-title=\"Zed\",Z1\nhttp://a/2\n",
        "a",
        &ParseOptions::default(),
    );
    let b = parse_playlist(
        "#EXTINF:-1 group-title=\"Zed\",Z2\nhttp://b/1\n#EXTINF:-1 group-title=\"FR| Cinema\",A2\nhttp://b/2\n",
        "b",
        &ParseOptions::default(),
    );
    let outcome = filter(vec![a, b], &config());
    let names: Vec<&str> = outcome.records.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, vec!["A1", "A2", "Z1", "Z2"]);
}
