//! M3U writer.
//!
//! Attributes are written in the record's own order: source order for parsed
//! records, with any attribute added later (e.g. a new `group-title`) appended.
//! The same input therefore always yields the same bytes.

use crate::errors::CuratorError;
use crate::parser::{ChannelRecord, EXTINF, HEADER};
use std::fmt::Write as _;
use std::path::Path;

/// Render one record as its `#EXTINF` line (no trailing newline)
pub fn metadata_line(record: &ChannelRecord) -> String {
    let mut line = String::with_capacity(128);
    line.push_str(EXTINF);
    line.push_str(if record.duration.is_empty() {
        "-1"
    } else {
        &record.duration
    });
    for (key, value) in &record.attributes {
        let _ = write!(line, " {}=\"{}\"", key, value.replace('"', "\\\""));
    }
    line.push(',');
    line.push_str(&record.display_name);
    line
}

/// Render records as playlist text. The header is always emitted.
pub fn serialize(records: &[ChannelRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 160 + HEADER.len() + 1);
    out.push_str(HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&metadata_line(record));
        out.push('\n');
        out.push_str(&record.stream_url);
        out.push('\n');
    }
    out
}

pub fn write_playlist(path: &Path, records: &[ChannelRecord]) -> Result<(), CuratorError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CuratorError::output(parent, e))?;
    }
    std::fs::write(path, serialize(records)).map_err(|e| CuratorError::output(path, e))
}
