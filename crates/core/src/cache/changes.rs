//! Append-only change log of content-hash transitions.
//!
//! One JSON object per line. Lines are appended with a single write so
//! concurrent writers in one process do not interleave records.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::meta::ChangeEvent;
use crate::Error;

/// Append one event to the log at `path`, creating the file if needed.
pub async fn append(path: &Path, event: &ChangeEvent) -> Result<(), Error> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    file.write_all(&line).await.map_err(|e| Error::io(path, e))?;
    file.flush().await.map_err(|e| Error::io(path, e))
}

/// Read every parseable event from the log. A missing log reads as empty.
pub async fn read_all(path: &Path) -> Result<Vec<ChangeEvent>, Error> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(path, e)),
    };

    let mut events = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChangeEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(line = line_no + 1, error = %e, "skipping unparseable change log line"),
        }
    }
    Ok(events)
}
