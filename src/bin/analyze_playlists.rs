use iptv_curator_lib::parser::{group_counts, parse_file, ParseOptions};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: analyze_playlists <playlist.m3u>...");
        std::process::exit(2);
    }

    println!("=== Playlist Group Analysis ===\n");

    for path in paths {
        let parsed = parse_file(&path, &ParseOptions::default())?;
        let mut counts = group_counts(&parsed.records);
        println!("{}", path.display());
        println!(
            "  {} channels in {} groups ({} without URL, {} placeholders)",
            parsed.len(),
            counts.len(),
            parsed.stats.missing_url,
            parsed.stats.placeholders
        );

        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        println!("  Top groups:");
        for (title, count) in counts.iter().take(20) {
            println!("    {:>5}  {}", count, title);
        }
        if counts.len() > 20 {
            println!("    ... and {} more", counts.len() - 20);
        }
        println!();
    }

    Ok(())
}
