//! Credential templating: swaps the `DNS`, `USERNAME` and `PASSWORD`
//! placeholders in stream URLs for real values, one output per account.

use crate::api::{PASSWORD_TOKEN, USERNAME_TOKEN};
use crate::errors::CuratorError;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DNS_TOKEN: &str = "DNS";
pub const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Credentials {
    #[serde(default)]
    pub name: Option<String>,
    pub dns: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Label used in output file names; defaults to the username
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }

    /// Host part of `dns` (scheme and trailing slash removed)
    fn host(&self) -> &str {
        let dns = self.dns.trim().trim_end_matches('/');
        dns.split_once("://").map_or(dns, |(_, host)| host)
    }

    fn validate(&self) -> Result<(), CuratorError> {
        for (field, value) in [
            ("dns", &self.dns),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(CuratorError::Credentials(format!(
                    "'{}' is empty for account '{}'",
                    field,
                    self.label()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsFile {
    Many(Vec<Credentials>),
    One(Credentials),
}

/// Load one credential object or an array of them
pub fn load_credentials(path: &Path) -> Result<Vec<Credentials>, CuratorError> {
    if !path.exists() {
        return Err(CuratorError::InputMissing(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|e| CuratorError::io(path, e))?;
    let sets = match serde_json::from_str::<CredentialsFile>(&content).map_err(|source| {
        CuratorError::ConfigParse {
            path: path.to_path_buf(),
            source,
        }
    })? {
        CredentialsFile::Many(sets) => sets,
        CredentialsFile::One(set) => vec![set],
    };
    if sets.is_empty() {
        return Err(CuratorError::Credentials(format!(
            "no credential sets in {}",
            path.display()
        )));
    }
    for set in &sets {
        set.validate()?;
    }
    Ok(sets)
}

/// Substitute placeholders in URL lines. Metadata and comment lines are
/// copied untouched. Returns the text and the number of URLs rewritten.
pub fn apply_credentials(text: &str, creds: &Credentials) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut rewritten = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with('#') || line.trim().is_empty() {
            out.push_str(line);
            continue;
        }
        let replaced = line
            .replace(DNS_TOKEN, creds.host())
            .replace(USERNAME_TOKEN, &creds.username)
            .replace(PASSWORD_TOKEN, &creds.password);
        if replaced != line {
            rewritten += 1;
        }
        out.push_str(&replaced);
    }
    (out, rewritten)
}

/// `<dir>/<prefix>_<label>.m3u`
pub fn output_path(dir: &Path, prefix: &str, creds: &Credentials) -> PathBuf {
    dir.join(format!("{}_{}.m3u", prefix, creds.label()))
}

/// Write one templated copy of `input` per credential set
pub fn write_templated(
    input: &Path,
    sets: &[Credentials],
    dir: &Path,
    prefix: &str,
) -> Result<Vec<(PathBuf, usize)>, CuratorError> {
    if !input.exists() {
        return Err(CuratorError::InputMissing(input.to_path_buf()));
    }
    let text = fs::read_to_string(input).map_err(|e| CuratorError::io(input, e))?;
    fs::create_dir_all(dir).map_err(|e| CuratorError::output(dir, e))?;

    let mut written = Vec::with_capacity(sets.len());
    for creds in sets {
        let (out, count) = apply_credentials(&text, creds);
        let path = output_path(dir, prefix, creds);
        fs::write(&path, out).map_err(|e| CuratorError::output(&path, e))?;
        info!("Created {} ({} URLs rewritten)", path.display(), count);
        written.push((path, count));
    }
    Ok(written)
}
