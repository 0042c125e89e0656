//! Append-only JSON-lines audit sink.
//!
//! Each event is one line of JSON in `audit.jsonl`. Sequence numbers resume
//! from the last line when the log is reopened. Concurrent processes each
//! number their own appends, so sequences are only ordered per process.
//!
//! An append interrupted mid-write leaves a final line with no newline.
//! Readers skip that torn tail, and reopening the log truncates it so the
//! next append starts on a fresh line.

use async_trait::async_trait;
use cap_std::fs_utf8::{Dir, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::audit::{
    domain::{AuditEntry, AuditEvent, AuditFilter},
    ports::{AuditError, AuditResult, AuditSink},
};
use crate::workflow::adapters::fs::run_blocking;

/// File name of the log inside its directory.
pub const AUDIT_FILE_NAME: &str = "audit.jsonl";

/// Audit sink backed by a JSON-lines file.
#[derive(Debug)]
pub struct JsonLinesAuditLog {
    dir: Arc<Dir>,
    next_sequence: Mutex<u64>,
}

impl JsonLinesAuditLog {
    /// Opens (or starts) the log inside `dir`, dropping a torn final line.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when an existing log cannot be read or
    /// repaired, or holds a corrupt complete line.
    pub fn open(dir: Dir) -> AuditResult<Self> {
        let contents = read_log(&dir)?;
        let log = split_log(&contents)?;
        if !log.torn_tail.is_empty() {
            truncate_log(&dir, log.complete_len)?;
        }
        let last = log.events.last().map_or(0, |event| event.sequence);
        Ok(Self {
            dir: Arc::new(dir),
            next_sequence: Mutex::new(last.saturating_add(1)),
        })
    }
}

/// Decoded log contents.
struct ParsedLog<'a> {
    events: Vec<AuditEvent>,
    complete_len: usize,
    torn_tail: &'a str,
}

fn read_log(dir: &Dir) -> AuditResult<String> {
    match dir.read_to_string(AUDIT_FILE_NAME) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(AuditError::persistence(err)),
    }
}

fn split_log(contents: &str) -> AuditResult<ParsedLog<'_>> {
    let complete_len = contents.rfind('\n').map_or(0, |end| end.saturating_add(1));
    let (complete, torn_tail) = contents
        .split_at_checked(complete_len)
        .unwrap_or((contents, ""));
    if !torn_tail.trim().is_empty() {
        warn!(
            file = AUDIT_FILE_NAME,
            bytes = torn_tail.len(),
            "skipping torn final audit line"
        );
    }
    let events = complete
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|err| AuditError::CorruptRecord {
                line: index.saturating_add(1),
                reason: err.to_string(),
            })
        })
        .collect::<AuditResult<Vec<AuditEvent>>>()?;
    Ok(ParsedLog {
        events,
        complete_len,
        torn_tail,
    })
}

fn truncate_log(dir: &Dir, len: usize) -> AuditResult<()> {
    let len = u64::try_from(len).map_err(AuditError::persistence)?;
    let mut options = OpenOptions::new();
    options.write(true);
    let file = dir
        .open_with(AUDIT_FILE_NAME, &options)
        .map_err(AuditError::persistence)?;
    file.set_len(len).map_err(AuditError::persistence)?;
    file.sync_all().map_err(AuditError::persistence)
}

fn append(dir: &Dir, event: &AuditEvent) -> AuditResult<()> {
    let mut line = serde_json::to_string(event).map_err(AuditError::persistence)?;
    line.push('\n');
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    let mut file = dir
        .open_with(AUDIT_FILE_NAME, &options)
        .map_err(AuditError::persistence)?;
    file.write_all(line.as_bytes())
        .map_err(AuditError::persistence)?;
    file.sync_data().map_err(AuditError::persistence)
}

#[async_trait]
impl AuditSink for JsonLinesAuditLog {
    async fn record(&self, entry: AuditEntry) -> AuditResult<AuditEvent> {
        let mut next = self.next_sequence.lock().await;
        let event = entry.into_event(*next);
        let dir = Arc::clone(&self.dir);
        let event = run_blocking(
            move || append(&dir, &event).map(|()| event),
            AuditError::persistence,
        )
        .await?;
        *next = next.saturating_add(1);
        Ok(event)
    }

    async fn query(&self, filter: &AuditFilter) -> AuditResult<Vec<AuditEvent>> {
        let dir = Arc::clone(&self.dir);
        let events = run_blocking(
            move || {
                let contents = read_log(&dir)?;
                split_log(&contents).map(|log| log.events)
            },
            AuditError::persistence,
        )
        .await?;
        Ok(filter.apply(events.iter()))
    }
}
