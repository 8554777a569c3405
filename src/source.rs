//! Where raw playlists come from. The filtering core only ever sees the
//! parsed result; all network access lives here.

use crate::api::XtreamClient;
use crate::errors::CuratorError;
use crate::parser::{parse_file, parse_playlist, ParseOptions, ParsedPlaylist};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistSource {
    File(PathBuf),
    Url(String),
    Xtream {
        server: String,
        username: String,
        password: String,
    },
}

impl PlaylistSource {
    pub fn describe(&self) -> String {
        match self {
            PlaylistSource::File(path) => path.display().to_string(),
            PlaylistSource::Url(url) => url.clone(),
            PlaylistSource::Xtream { server, .. } => format!("{} (Xtream API)", server),
        }
    }

    /// Load and parse this source
    pub async fn load(&self, options: &ParseOptions) -> Result<ParsedPlaylist, CuratorError> {
        match self {
            PlaylistSource::File(path) => parse_file(path, options),
            PlaylistSource::Url(url) => {
                let text = download_text(url).await?;
                Ok(parse_playlist(&text, url, options))
            }
            PlaylistSource::Xtream {
                server,
                username,
                password,
            } => {
                let client = XtreamClient::new(server.clone(), username.clone(), password.clone());
                if client.authenticate().await?.is_none() {
                    return Err(CuratorError::Api(format!(
                        "authentication rejected by {}",
                        server
                    )));
                }
                let records = client.live_playlist().await?;
                Ok(ParsedPlaylist::from_records(&self.describe(), records))
            }
        }
    }
}

/// Download a playlist body as text
pub async fn download_text(url: &str) -> Result<String, CuratorError> {
    let download_err = |reason: String| CuratorError::Download {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .user_agent("IPTV Smarters Pro")
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| download_err(e.to_string()))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_err(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(download_err(format!("HTTP {}", resp.status())));
    }
    let text = resp.text().await.map_err(|e| download_err(e.to_string()))?;
    info!("Downloaded {} bytes from {}", text.len(), url);
    Ok(text)
}
