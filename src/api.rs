use crate::errors::CuratorError;
use crate::parser::{ChannelRecord, GROUP_TITLE, TVG_NAME};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Credential tokens written into converted URLs instead of real values
pub const USERNAME_TOKEN: &str = "USERNAME";
pub const PASSWORD_TOKEN: &str = "PASSWORD";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    pub category_id: String,
    pub category_name: String,
    #[serde(default)]
    pub parent_id: serde_json::Value, // frequent null or 0
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Stream {
    pub name: String,

    #[serde(default)]
    pub stream_type: String,

    pub stream_id: serde_json::Value, // Can be int or string

    pub stream_icon: Option<String>,
    pub epg_channel_id: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserInfo {
    pub auth: i32,
    pub status: Option<String>,
    pub exp_date: Option<serde_json::Value>,
}

/// Render an id that may arrive as number or string
fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct XtreamClient {
    pub base_url: String,
    pub username: String,
    pub password: String,
    client: reqwest::Client,
}

impl XtreamClient {
    pub fn new(base_url: String, username: String, password: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .user_agent("IPTV Smarters Pro")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url,
            username,
            password,
            client,
        }
    }

    fn action_url(&self, action: &str) -> String {
        format!(
            "{}/player_api.php?username={}&password={}&action={}",
            self.base_url, self.username, self.password, action
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        action: &str,
    ) -> Result<T, CuratorError> {
        let resp = self
            .client
            .get(self.action_url(action))
            .send()
            .await
            .map_err(|e| CuratorError::Api(format!("{} request failed: {}", action, e)))?;
        if !resp.status().is_success() {
            return Err(CuratorError::Api(format!("{} returned HTTP {}", action, resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| CuratorError::Api(format!("{} returned unexpected JSON: {}", action, e)))
    }

    pub async fn authenticate(&self) -> Result<Option<UserInfo>, CuratorError> {
        #[derive(Deserialize)]
        struct AuthResponse {
            user_info: Option<UserInfo>,
        }

        let url = format!(
            "{}/player_api.php?username={}&password={}",
            self.base_url, self.username, self.password
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CuratorError::Api(format!("authentication request failed: {}", e)))?;

        if let Ok(json) = resp.json::<AuthResponse>().await {
            if let Some(info) = json.user_info {
                return Ok((info.auth == 1).then_some(info));
            }
        }
        Ok(None)
    }

    pub async fn get_live_categories(&self) -> Result<Vec<Category>, CuratorError> {
        self.get_json("get_live_categories").await
    }

    pub async fn get_live_streams(
        &self,
        category_id: Option<&str>,
    ) -> Result<Vec<Stream>, CuratorError> {
        match category_id {
            Some(id) => self.get_json(&format!("get_live_streams&category_id={}", id)).await,
            None => self.get_json("get_live_streams").await,
        }
    }

    /// All live channels as records carrying placeholder credentials
    pub async fn live_playlist(&self) -> Result<Vec<ChannelRecord>, CuratorError> {
        let categories = self.get_live_categories().await?;
        let streams = self.get_live_streams(None).await?;
        info!(
            "Fetched {} live streams in {} categories from {}",
            streams.len(),
            categories.len(),
            self.base_url
        );
        Ok(streams_to_records(&self.base_url, &streams, &categories))
    }
}

/// `{server}/live/USERNAME/PASSWORD/{id}.ts`
pub fn placeholder_stream_url(server: &str, stream_id: &str) -> String {
    format!(
        "{}/live/{}/{}/{}.ts",
        server.trim_end_matches('/'),
        USERNAME_TOKEN,
        PASSWORD_TOKEN,
        stream_id
    )
}

/// Convert API streams into playlist records. Empty attributes are left out;
/// `group-title` falls back to `Category <id>` for unknown category ids.
pub fn streams_to_records(
    server: &str,
    streams: &[Stream],
    categories: &[Category],
) -> Vec<ChannelRecord> {
    let names: HashMap<&str, &str> = categories
        .iter()
        .map(|c| (c.category_id.as_str(), c.category_name.as_str()))
        .collect();

    streams
        .iter()
        .map(|stream| {
            let id = value_text(&stream.stream_id);
            let mut record = ChannelRecord::new(&stream.name, &placeholder_stream_url(server, &id));
            let attributes = [
                ("CUID", id.as_str()),
                (TVG_NAME, stream.name.as_str()),
                ("tvg-id", stream.epg_channel_id.as_deref().unwrap_or("")),
                ("tvg-logo", stream.stream_icon.as_deref().unwrap_or("")),
            ];
            for (key, value) in attributes {
                if !value.is_empty() {
                    record.set_attribute(key, value);
                }
            }
            let group = match stream.category_id.as_deref() {
                Some(cid) => names
                    .get(cid)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("Category {}", cid)),
                None => "API Channels".to_string(),
            };
            record.set_attribute(GROUP_TITLE, &group);
            debug!("Converted stream {} into group {}", id, group);
            record
        })
        .collect()
}
