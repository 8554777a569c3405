use directories::ProjectDirs;
use iptv_curator_lib::config::{find_config_file, CONFIG_DIR, GROUP_CONFIG_FILE};
use iptv_curator_lib::credentials::CREDENTIALS_FILE;
use std::path::Path;

fn main() {
    println!("Search order: {}/<file>, ./<file>, user config dir", CONFIG_DIR);
    if let Some(proj_dirs) = ProjectDirs::from("com", "iptv-curator", "iptv-curator") {
        println!("User config dir: {:?}", proj_dirs.config_dir());
    } else {
        println!("Could not determine user config dir");
    }

    for name in [GROUP_CONFIG_FILE, CREDENTIALS_FILE] {
        let path = find_config_file(name);
        let state = if Path::new(&path).exists() { "found" } else { "missing" };
        println!("{:<32} -> {:?} ({})", name, path, state);
    }
}
