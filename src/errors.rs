use std::path::PathBuf;
use thiserror::Error;

/// Stage of a run at which a fatal error surfaced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunStage {
    /// Reading playlist sources
    Input,
    /// Loading or saving the group configuration
    Configuration,
    /// Writing filtered output
    Output,
    /// Talking to a remote playlist provider
    Fetch,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl RunStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            RunStage::Input => "Playlist Input",
            RunStage::Configuration => "Group Configuration",
            RunStage::Output => "Playlist Output",
            RunStage::Fetch => "Remote Fetch",
        }
    }

    /// Get actionable suggestion for fixing the issue at this stage
    pub fn suggestion(&self) -> &'static str {
        match self {
            RunStage::Input => {
                "Check that the playlist path exists. Run the fetch step first if the file is downloaded."
            }
            RunStage::Configuration => {
                "Fix the JSON at the reported line/column, or restore the most recent .backup_ copy."
            }
            RunStage::Output => "Check that the output directory exists and is writable.",
            RunStage::Fetch => "Verify the server URL and credentials, then run the fetch again.",
        }
    }
}

/// Errors raised by the curation toolkit
#[derive(Debug, Error)]
pub enum CuratorError {
    /// A required input file does not exist
    #[error("Input file not found: {0}")]
    InputMissing(PathBuf),

    /// Reading or writing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a playlist or report failed
    #[error("Failed to write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The group configuration could not be parsed as JSON
    #[error("Failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The group configuration could not be serialized
    #[error("Failed to write configuration {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Credential sets are missing or invalid
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// A playlist download failed
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    /// An Xtream API call failed or returned something unexpected
    #[error("Provider API error: {0}")]
    Api(String),
}

impl CuratorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CuratorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CuratorError::Output {
            path: path.into(),
            source,
        }
    }

    pub fn stage(&self) -> RunStage {
        match self {
            CuratorError::InputMissing(_) | CuratorError::Io { .. } => RunStage::Input,
            CuratorError::ConfigParse { .. }
            | CuratorError::ConfigWrite { .. }
            | CuratorError::Credentials(_) => RunStage::Configuration,
            CuratorError::Output { .. } => RunStage::Output,
            CuratorError::Download { .. } | CuratorError::Api(_) => RunStage::Fetch,
        }
    }

    /// Get detailed diagnostic information about the error
    pub fn diagnostics(&self) -> String {
        match self {
            CuratorError::InputMissing(path) => {
                format!(
                    "Input Missing\nPath: {}\nSuggestion: {}",
                    path.display(),
                    self.stage().suggestion()
                )
            }
            CuratorError::Io { path, source } => {
                format!(
                    "I/O Error\nPath: {}\nError: {}\nSuggestion: Check file permissions",
                    path.display(),
                    source
                )
            }
            CuratorError::Output { path, source } => {
                format!(
                    "Output Error\nPath: {}\nError: {}\nSuggestion: {}",
                    path.display(),
                    source,
                    self.stage().suggestion()
                )
            }
            CuratorError::ConfigParse { path, source } => {
                format!(
                    "Configuration Parse Error\nPath: {}\nLine: {}, Column: {}\nError: {}\nSuggestion: {}",
                    path.display(),
                    source.line(),
                    source.column(),
                    source,
                    self.stage().suggestion()
                )
            }
            CuratorError::ConfigWrite { path, source } => {
                format!(
                    "Configuration Write Error\nPath: {}\nError: {}",
                    path.display(),
                    source
                )
            }
            CuratorError::Credentials(reason) => {
                format!(
                    "Credentials Error\nReason: {}\nSuggestion: Each entry needs dns, username and password",
                    reason
                )
            }
            CuratorError::Download { url, reason } => {
                format!(
                    "Download Error\nURL: {}\nReason: {}\nSuggestion: {}",
                    url,
                    reason,
                    self.stage().suggestion()
                )
            }
            CuratorError::Api(message) => {
                format!(
                    "Provider API Error\nMessage: {}\nSuggestion: {}",
                    message,
                    self.stage().suggestion()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_diagnostics_include_position() {
        let source = serde_json::from_str::<serde_json::Value>("[{\"a\": }]").unwrap_err();
        let err = CuratorError::ConfigParse {
            path: PathBuf::from("groups.json"),
            source,
        };
        let text = err.diagnostics();
        assert!(text.contains("groups.json"));
        assert!(text.contains("Line: 1"));
        assert_eq!(err.stage(), RunStage::Configuration);
    }

    #[test]
    fn test_missing_input_message() {
        let err = CuratorError::InputMissing(PathBuf::from("data/downloaded_file.m3u"));
        assert_eq!(
            err.to_string(),
            "Input file not found: data/downloaded_file.m3u"
        );
        assert_eq!(err.stage(), RunStage::Input);
    }
}
