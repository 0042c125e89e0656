//! Human-readable per-spec status board: `<specId>.md` holding one table.

use async_trait::async_trait;
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

use super::blocking::run_blocking;
use crate::task::domain::{Assignment, Priority, SpecId, TaskId, TaskKey, TaskStatus};
use crate::workflow::{
    domain::{SpecStateSnapshot, TaskStateEntry},
    ports::{StateView, StateViewError, StateViewResult},
};

const VIEW_NAME: &str = "human";
const HEADER: &str = "| Task | Status | Priority | Assignee | Started |";
const DIVIDER: &str = "| --- | --- | --- | --- | --- |";
const EMPTY_CELL: &str = "-";

/// Markdown status boards, one file per spec.
///
/// The board carries status, priority, assignee and start time; it does
/// not carry confidence or readiness timestamps.
#[derive(Debug)]
pub struct MarkdownStatusBoard {
    dir: Arc<Dir>,
}

fn board_name(spec_id: &SpecId) -> String {
    format!("{spec_id}.md")
}

fn render(snapshot: &SpecStateSnapshot) -> String {
    let mut out = format!("# Status: {}\n\n{HEADER}\n{DIVIDER}\n", snapshot.spec_id());
    for (task_id, entry) in snapshot.entries() {
        let assignee = entry.assignee().unwrap_or(EMPTY_CELL);
        let started = entry.started_at().map_or_else(
            || EMPTY_CELL.to_owned(),
            |at| at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
        // Writing to a String cannot fail.
        let _written = writeln!(
            out,
            "| {task_id} | {} | {} | {assignee} | {started} |",
            entry.status, entry.priority
        );
    }
    out
}

fn cell(value: &str) -> Option<&str> {
    (value != EMPTY_CELL).then_some(value)
}

fn parse_row(spec_id: &SpecId, row: &str) -> Result<(TaskId, TaskStateEntry), String> {
    let cells: Vec<&str> = row
        .trim()
        .trim_matches('|')
        .split('|')
        .map(str::trim)
        .collect();
    let [task, status, priority, assignee, started] = cells.as_slice() else {
        return Err(format!("expected 5 cells, found {}", cells.len()));
    };
    let task_id = TaskId::new(*task).map_err(|err| err.to_string())?;
    let status = TaskStatus::try_from(*status).map_err(|err| err.to_string())?;
    let priority = Priority::try_from(*priority).map_err(|err| err.to_string())?;
    let assignment = match (cell(assignee), cell(started)) {
        (Some(agent), Some(raw_started)) => {
            let started_at = DateTime::parse_from_rfc3339(raw_started)
                .map_err(|err| format!("bad start time '{raw_started}': {err}"))?
                .with_timezone(&Utc);
            let key = TaskKey::new(spec_id.clone(), task_id.clone());
            Some(Assignment::new(key, agent, started_at))
        }
        (None, None) => None,
        _ => return Err("assignee and start time must appear together".to_owned()),
    };
    Ok((
        task_id,
        TaskStateEntry {
            status,
            priority,
            ready_since: None,
            assignment,
        },
    ))
}

/// Rows after the table header are read until the first non-table line.
fn parse(spec_id: &SpecId, document: &str) -> StateViewResult<SpecStateSnapshot> {
    let mut snapshot = SpecStateSnapshot::new(spec_id.clone());
    let mut in_table = false;
    for (index, line) in document.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed == HEADER {
            in_table = true;
            continue;
        }
        if !in_table || trimmed == DIVIDER {
            continue;
        }
        if !trimmed.starts_with('|') {
            break;
        }
        let (task_id, entry) = parse_row(spec_id, trimmed).map_err(|reason| {
            StateViewError::corrupt(
                VIEW_NAME,
                format!("{}.md line {}: {reason}", spec_id, index.saturating_add(1)),
            )
        })?;
        snapshot.insert(task_id, entry);
    }
    Ok(snapshot)
}

impl MarkdownStatusBoard {
    /// Creates boards stored in `dir`.
    #[must_use]
    pub fn new(dir: Dir) -> Self {
        Self { dir: Arc::new(dir) }
    }
}

#[async_trait]
impl StateView for MarkdownStatusBoard {
    fn name(&self) -> &'static str {
        VIEW_NAME
    }

    async fn load(&self, spec_id: &SpecId) -> StateViewResult<Option<SpecStateSnapshot>> {
        let dir = Arc::clone(&self.dir);
        let owned = spec_id.clone();
        run_blocking(
            move || {
                let document = match dir.read_to_string(board_name(&owned)) {
                    Ok(document) => document,
                    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                    Err(err) => return Err(StateViewError::persistence(err)),
                };
                let snapshot = parse(&owned, &document)?;
                Ok((!snapshot.is_empty()).then_some(snapshot))
            },
            StateViewError::persistence,
        )
        .await
    }

    async fn store(&self, snapshot: &SpecStateSnapshot) -> StateViewResult<()> {
        let dir = Arc::clone(&self.dir);
        let name = board_name(snapshot.spec_id());
        let document = render(snapshot);
        run_blocking(
            move || {
                let temp_name = format!("{name}.{}.tmp", Uuid::new_v4());
                dir.write(&temp_name, document)
                    .map_err(StateViewError::persistence)?;
                dir.rename(&temp_name, &dir, &name)
                    .map_err(StateViewError::persistence)
            },
            StateViewError::persistence,
        )
        .await
    }

    async fn clear(&self, spec_id: &SpecId) -> StateViewResult<()> {
        let dir = Arc::clone(&self.dir);
        let name = board_name(spec_id);
        run_blocking(
            move || match dir.remove_file(&name) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(StateViewError::persistence(err)),
            },
            StateViewError::persistence,
        )
        .await
    }
}
