use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use iptv_curator_lib::classifier::{split_bulk_group, Category, BULK_GROUP, DEFAULT_TABLE};
use iptv_curator_lib::config::{
    find_config_file, BulkDisposition, GroupConfigEntry, GroupConfigStore, GROUP_CONFIG_FILE,
};
use iptv_curator_lib::credentials::{load_credentials, write_templated, CREDENTIALS_FILE};
use iptv_curator_lib::errors::CuratorError;
use iptv_curator_lib::filter::{BulkMerge, DedupPolicy, FilterEngine, FilterOptions};
use iptv_curator_lib::guide_override::{
    apply_guide_overrides, channel_identifier, find_channels, guide_entries, GuideOverrides,
    GUIDE_GROUP, GUIDE_OVERRIDES_FILE,
};
use iptv_curator_lib::parser::{group_counts, parse_file, ParseOptions, ParsedPlaylist};
use iptv_curator_lib::report::validate;
use iptv_curator_lib::serializer::write_playlist;
use iptv_curator_lib::source::PlaylistSource;

#[derive(Parser, Debug)]
#[command(version, about = "Curate IPTV M3U playlists by group", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Filter playlists against the group configuration
    Filter {
        /// Group configuration JSON (searched for when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input playlists, merged in the order given
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "data/filtered_playlist_final.m3u")]
        output: PathBuf,

        /// Exclude every group missing from the configuration
        #[arg(long)]
        no_auto_include: bool,

        #[arg(long, value_enum, default_value_t = DedupPolicy::KeepAll)]
        dedup: DedupPolicy,

        /// Categorised playlists that replace the bulk 24/7 group
        #[arg(long = "merge-subcategory")]
        merge_subcategories: Vec<PathBuf>,

        /// Drop the built-in block-listed groups while parsing
        #[arg(long)]
        curated: bool,

        /// Write newly discovered groups to <config>_updated.json
        #[arg(long)]
        write_discovered: bool,
    },

    /// Split the bulk 24/7 group into category playlists
    SplitBulk {
        input: PathBuf,

        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, default_value = BULK_GROUP)]
        bulk_group: String,
    },

    /// Insert split category groups into the configuration after the bulk entry
    IntegrateSubgroups {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON array of new group entries (as written by split-bulk)
        #[arg(long, default_value = "new_247_groups.json")]
        new_groups: PathBuf,

        #[arg(long, default_value = BULK_GROUP)]
        bulk_group: String,

        #[arg(long, value_enum, default_value_t = BulkDisposition::RenameToOther)]
        disposition: BulkDisposition,

        /// Channel count recorded on the renamed Other entry
        #[arg(long)]
        other_count: Option<u64>,
    },

    /// Report group titles configured more than once
    CheckDuplicates {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Remove configured groups that no longer appear in a playlist
    RemoveMissing {
        #[arg(short, long)]
        config: Option<PathBuf>,

        input: PathBuf,

        /// Only list what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Sort configuration entries: included first, then by order
    SortConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Simulate a filter run and report known, unknown and drifted groups
    Validate {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long)]
        curated: bool,
    },

    /// Replace UK TV guide channels with other playlist channels
    GuideOverride {
        input: PathBuf,

        /// Where to write the playlist with overrides applied
        #[arg(short, long, required_unless_present_any = ["list", "find"])]
        output: Option<PathBuf>,

        /// Override rules (searched for when omitted)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        #[arg(long, default_value = GUIDE_GROUP)]
        guide_group: String,

        /// List the guide group's channels and exit
        #[arg(long, conflicts_with = "find")]
        list: bool,

        /// Search channels by name and print their identifiers
        #[arg(long)]
        find: Option<String>,
    },

    /// Write one copy of a playlist per account with real credentials
    ApplyCredentials {
        input: PathBuf,

        #[arg(long, default_value = CREDENTIALS_FILE)]
        credentials: PathBuf,

        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, default_value = "8k")]
        prefix: String,
    },

    /// Download a playlist from a URL or an Xtream server
    Fetch {
        #[arg(long, conflicts_with = "server")]
        url: Option<String>,

        #[arg(long, requires_all = ["username", "password"])]
        server: Option<String>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        password: Option<String>,

        #[arg(short, long, default_value = "data/downloaded_file.m3u")]
        output: PathBuf,
    },
}

fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| find_config_file(GROUP_CONFIG_FILE))
}

fn parse_options(curated: bool) -> ParseOptions {
    if curated {
        ParseOptions::curated()
    } else {
        ParseOptions::default()
    }
}

fn parse_all(
    paths: &[PathBuf],
    options: &ParseOptions,
) -> Result<Vec<ParsedPlaylist>, CuratorError> {
    paths.iter().map(|p| parse_file(p, options)).collect()
}

/// `dir/name.json` -> `dir/name_updated.json`
fn updated_path(config: &Path) -> PathBuf {
    let stem = config
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "group_titles".to_string());
    config.with_file_name(format!("{}_updated.json", stem))
}

#[allow(clippy::too_many_arguments)]
fn run_filter(
    config: Option<PathBuf>,
    inputs: Vec<PathBuf>,
    output: PathBuf,
    no_auto_include: bool,
    dedup: DedupPolicy,
    merge_subcategories: Vec<PathBuf>,
    curated: bool,
    write_discovered: bool,
) -> anyhow::Result<()> {
    let config = config_path(config);
    let mut store = GroupConfigStore::load_or_empty(&config)?;
    let options = parse_options(curated);
    let playlists = parse_all(&inputs, &options)?;

    let bulk_merge = if merge_subcategories.is_empty() {
        None
    } else {
        Some(BulkMerge {
            placeholder_group: BULK_GROUP.to_string(),
            subcategories: parse_all(&merge_subcategories, &ParseOptions::default())?,
        })
    };
    let filter_options = FilterOptions {
        auto_include_unknown: !no_auto_include,
        dedup,
        bulk_merge,
    };

    let outcome = FilterEngine::new(&store, filter_options).filter(playlists);
    write_playlist(&output, &outcome.records)?;
    println!("{}", outcome.report);
    println!(
        "Wrote {} channels in {} groups to {}",
        outcome.records.len(),
        outcome.groups.len(),
        output.display()
    );

    let (auto_included, auto_excluded) = (outcome.auto_included(), outcome.auto_excluded());
    if write_discovered && !(auto_included.is_empty() && auto_excluded.is_empty()) {
        let counts: HashMap<String, usize> = outcome.seen_counts.into_iter().collect();
        let added = store.append_discovered(&auto_included, &auto_excluded, &counts);
        let target = updated_path(&config);
        store.save(&target)?;
        println!(
            "Added {} discovered groups; review {} before replacing the configuration",
            added,
            target.display()
        );
    }
    Ok(())
}

fn run_split_bulk(input: PathBuf, output_dir: PathBuf, bulk_group: String) -> anyhow::Result<()> {
    let playlist = parse_file(&input, &ParseOptions::default())?;
    let buckets = split_bulk_group(&playlist.records, &bulk_group, &DEFAULT_TABLE);
    let total: usize = buckets.iter().map(|b| b.records.len()).sum();
    if total == 0 {
        warn!("No '{}' channels found in {}", bulk_group, input.display());
    }

    let mut new_groups = Vec::new();
    for bucket in &buckets {
        let path = output_dir.join(format!("247_channels_{}.m3u", bucket.category.slug()));
        write_playlist(&path, &bucket.records)?;
        println!(
            "{:<10} {:>6} channels -> {}",
            bucket.category.display_name(),
            bucket.records.len(),
            path.display()
        );

        if bucket.category != Category::Other {
            let mut entry = GroupConfigEntry::new(&bucket.category.group_title(), false, 0);
            entry.order = None;
            entry.channel_count = bucket.records.len() as u64;
            new_groups.push(entry);
        }
    }

    let groups_path = output_dir.join("new_247_groups.json");
    let json = serde_json::to_string_pretty(&new_groups)?;
    std::fs::write(&groups_path, json)
        .with_context(|| format!("writing {}", groups_path.display()))?;
    info!("Wrote {} new group entries to {}", new_groups.len(), groups_path.display());
    Ok(())
}

fn run_integrate(
    config: Option<PathBuf>,
    new_groups: PathBuf,
    bulk_group: String,
    disposition: BulkDisposition,
    other_count: Option<u64>,
) -> anyhow::Result<()> {
    let config = config_path(config);
    let mut store = GroupConfigStore::load(&config)?;
    let subgroups = GroupConfigStore::load(&new_groups)?.into_entries();
    let leftover = other_count
        .or_else(|| store.lookup(&bulk_group).map(|e| e.channel_count))
        .unwrap_or(0);
    let count = subgroups.len();

    if !store.integrate_subgroups(&bulk_group, subgroups, disposition, leftover) {
        bail!("'{}' is not in {}", bulk_group, config.display());
    }
    if let Some(backup) = store.save(&config)? {
        println!("Backup: {}", backup.display());
    }
    println!("Integrated up to {} groups after '{}' in {}", count, bulk_group, config.display());
    Ok(())
}

fn run_check_duplicates(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = config_path(config);
    let store = GroupConfigStore::load(&config)?;
    let duplicates = store.duplicates();
    if duplicates.is_empty() {
        println!("No duplicate group titles in {} ({} entries)", config.display(), store.len());
        return Ok(());
    }
    println!("Found {} duplicated group titles:", duplicates.len());
    for dup in &duplicates {
        println!("  '{}' x{}", dup.group_title, dup.entries.len());
        for entry in &dup.entries {
            println!(
                "      exclude={} order={} channels={}",
                entry.exclude,
                entry.order.map_or("-".to_string(), |o| o.to_string()),
                entry.channel_count
            );
        }
    }
    Ok(())
}

fn run_remove_missing(
    config: Option<PathBuf>,
    input: PathBuf,
    dry_run: bool,
) -> anyhow::Result<()> {
    let config = config_path(config);
    let mut store = GroupConfigStore::load(&config)?;
    let playlist = parse_file(&input, &ParseOptions::default())?;
    let present: BTreeSet<String> = group_counts(&playlist.records)
        .into_iter()
        .map(|(g, _)| g)
        .collect();

    let missing: Vec<String> = store
        .missing_from(&present)
        .iter()
        .map(|e| e.group_title.clone())
        .collect();
    println!("{} configured groups are not in {}", missing.len(), input.display());
    for title in &missing {
        println!("  {}", title);
    }
    if dry_run || missing.is_empty() {
        return Ok(());
    }

    store.remove_missing(&present);
    if let Some(backup) = store.save(&config)? {
        println!("Backup: {}", backup.display());
    }
    println!("Removed {} entries; {} remain", missing.len(), store.len());
    Ok(())
}

fn run_sort_config(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = config_path(config);
    let mut store = GroupConfigStore::load(&config)?;
    store.sort_by_flag_and_order();
    if let Some(backup) = store.save(&config)? {
        println!("Backup: {}", backup.display());
    }
    let included = store.entries().iter().filter(|e| !e.exclude).count();
    println!("Sorted {} entries ({} included first)", store.len(), included);
    Ok(())
}

fn run_validate(
    config: Option<PathBuf>,
    inputs: Vec<PathBuf>,
    curated: bool,
) -> anyhow::Result<()> {
    let config = config_path(config);
    let store = GroupConfigStore::load_or_empty(&config)?;
    let playlists = parse_all(&inputs, &parse_options(curated))?;
    let report = validate(playlists, &store, FilterOptions::default());
    println!("{}", report);
    if report.has_warnings() {
        warn!("Configuration has data-quality warnings");
    }
    Ok(())
}

fn run_guide_override(
    input: PathBuf,
    output: Option<PathBuf>,
    rules: Option<PathBuf>,
    guide_group: String,
    list: bool,
    find: Option<String>,
) -> anyhow::Result<()> {
    let playlist = parse_file(&input, &ParseOptions::default())?;

    if list {
        let entries = guide_entries(&playlist.records, &guide_group);
        println!("{} channels in '{}':", entries.len(), guide_group);
        for entry in entries {
            println!(
                "  {} (tvg-id: {})",
                entry.display_name,
                entry.attribute("tvg-id").unwrap_or("-")
            );
        }
        return Ok(());
    }
    if let Some(term) = find {
        let matches = find_channels(&playlist.records, &term);
        println!("{} channels match '{}':", matches.len(), term);
        for entry in matches {
            println!("  {}", channel_identifier(entry));
        }
        return Ok(());
    }

    let Some(output) = output else {
        bail!("--output is required unless --list or --find is given");
    };
    let rules = rules.unwrap_or_else(|| find_config_file(GUIDE_OVERRIDES_FILE));
    let overrides = GuideOverrides::load(&rules)?;
    if overrides.is_empty() {
        println!("No overrides configured in {}; nothing to do", rules.display());
        return Ok(());
    }

    let (records, stats) = apply_guide_overrides(playlist.records, &overrides, &guide_group);
    write_playlist(&output, &records)?;
    println!(
        "Replaced {} guide channels ({} unresolved); wrote {}",
        stats.replaced,
        stats.unresolved.len(),
        output.display()
    );
    Ok(())
}

fn run_apply_credentials(
    input: PathBuf,
    credentials: PathBuf,
    output_dir: PathBuf,
    prefix: String,
) -> anyhow::Result<()> {
    let sets = load_credentials(&credentials)?;
    for (path, count) in write_templated(&input, &sets, &output_dir, &prefix)? {
        println!("{}: replaced credentials in {} URLs", path.display(), count);
    }
    Ok(())
}

async fn run_fetch(
    url: Option<String>,
    server: Option<String>,
    username: Option<String>,
    password: Option<String>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let source = match (url, server, username, password) {
        (Some(url), None, _, _) => PlaylistSource::Url(url),
        (None, Some(server), Some(username), Some(password)) => PlaylistSource::Xtream {
            server,
            username,
            password,
        },
        _ => bail!("give either --url or --server with --username and --password"),
    };

    let playlist = source
        .load(&ParseOptions::default())
        .await
        .with_context(|| format!("fetching {}", source.describe()))?;
    write_playlist(&output, &playlist.records)?;
    println!(
        "Saved {} channels from {} to {}",
        playlist.len(),
        source.describe(),
        output.display()
    );
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Filter {
            config,
            inputs,
            output,
            no_auto_include,
            dedup,
            merge_subcategories,
            curated,
            write_discovered,
        } => run_filter(
            config,
            inputs,
            output,
            no_auto_include,
            dedup,
            merge_subcategories,
            curated,
            write_discovered,
        ),
        Command::SplitBulk {
            input,
            output_dir,
            bulk_group,
        } => run_split_bulk(input, output_dir, bulk_group),
        Command::IntegrateSubgroups {
            config,
            new_groups,
            bulk_group,
            disposition,
            other_count,
        } => run_integrate(config, new_groups, bulk_group, disposition, other_count),
        Command::CheckDuplicates { config } => run_check_duplicates(config),
        Command::RemoveMissing {
            config,
            input,
            dry_run,
        } => run_remove_missing(config, input, dry_run),
        Command::SortConfig { config } => run_sort_config(config),
        Command::Validate {
            config,
            inputs,
            curated,
        } => run_validate(config, inputs, curated),
        Command::GuideOverride {
            input,
            output,
            rules,
            guide_group,
            list,
            find,
        } => run_guide_override(input, output, rules, guide_group, list, find),
        Command::ApplyCredentials {
            input,
            credentials,
            output_dir,
            prefix,
        } => run_apply_credentials(input, credentials, output_dir, prefix),
        Command::Fetch {
            url,
            server,
            username,
            password,
            output,
        } => run_fetch(url, server, username, password, output).await,
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        match e.downcast_ref::<CuratorError>() {
            Some(err) => {
                eprintln!("Error: {:#}", e);
                eprintln!("\n{}", err.diagnostics());
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}
