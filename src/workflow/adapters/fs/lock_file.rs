//! Lock files created with `create_new`.
//!
//! A lock file holds its owner's token and acquisition time. A lock older
//! than the lease expiry may be stolen, but only by whoever holds its steal
//! marker, `<name>.steal`. The marker is itself a lock file claimed the
//! same way, so a marker left behind by a crashed stealer expires too.
//! Holding the marker, the stealer re-reads the lock and replaces it only
//! if it still belongs to the expired holder it first saw. Releases take
//! the marker as well, so a holder never removes a lock that a stealer has
//! just replaced.

use cap_std::fs_utf8::{Dir, OpenOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Contents of a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LockRecord {
    pub token: Uuid,
    pub acquired_at: DateTime<Utc>,
}

/// Successful claim of a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Claim {
    pub record: LockRecord,
    pub stolen_from: Option<Uuid>,
}

fn steal_marker(name: &str) -> String {
    format!("{name}.steal")
}

fn try_create(dir: &Dir, name: &str, record: &LockRecord) -> io::Result<bool> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    match dir.open_with(name, &options) {
        Ok(mut file) => {
            let bytes = serde_json::to_vec(record).map_err(io::Error::other)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    }
}

fn remove_if_present(dir: &Dir, name: &str) -> io::Result<()> {
    match dir.remove_file(name) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Current holder as seen on disk. A record that cannot be decoded (for
/// example one still being written) is aged by the file's modification
/// time instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Holder {
    token: Option<Uuid>,
    since: DateTime<Utc>,
}

fn read_holder(dir: &Dir, name: &str) -> io::Result<Option<Holder>> {
    let contents = match dir.read_to_string(name) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    if let Ok(record) = serde_json::from_str::<LockRecord>(&contents) {
        return Ok(Some(Holder {
            token: Some(record.token),
            since: record.acquired_at,
        }));
    }
    let modified = match dir.metadata(name) {
        Ok(metadata) => metadata.modified()?.into_std(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };
    Ok(Some(Holder {
        token: None,
        since: DateTime::<Utc>::from(modified),
    }))
}

fn is_expired(holder: &Holder, now: DateTime<Utc>, expiry: Duration) -> bool {
    now.signed_duration_since(holder.since)
        .to_std()
        .is_ok_and(|age| age >= expiry)
}

/// Removes a steal marker this process claimed.
fn clear_marker(dir: &Dir, marker: &str, token: Uuid) {
    let cleared = read_holder(dir, marker).and_then(|holder| match holder {
        Some(held) if held.token == Some(token) => remove_if_present(dir, marker),
        _ => Ok(()),
    });
    if let Err(err) = cleared {
        warn!(marker, error = %err, "failed to clear lock steal marker");
    }
}

/// Replaces the lock at `name` with `record` if `expected` still holds it.
fn replace_if_unchanged(
    dir: &Dir,
    name: &str,
    expected: Holder,
    record: &LockRecord,
) -> io::Result<bool> {
    if read_holder(dir, name)? != Some(expected) {
        return Ok(false);
    }
    remove_if_present(dir, name)?;
    try_create(dir, name, record)
}

/// Attempts to claim `name` once, stealing it if the holder expired.
pub(crate) fn claim(
    dir: &Dir,
    name: &str,
    now: DateTime<Utc>,
    expiry: Duration,
) -> io::Result<Option<Claim>> {
    let record = LockRecord {
        token: Uuid::new_v4(),
        acquired_at: now,
    };
    if try_create(dir, name, &record)? {
        return Ok(Some(Claim {
            record,
            stolen_from: None,
        }));
    }
    let Some(holder) = read_holder(dir, name)? else {
        return Ok(None);
    };
    if !is_expired(&holder, now, expiry) {
        return Ok(None);
    }
    let marker = steal_marker(name);
    let Some(guard) = claim(dir, &marker, now, expiry)? else {
        return Ok(None);
    };
    let replaced = replace_if_unchanged(dir, name, holder, &record);
    clear_marker(dir, &marker, guard.record.token);
    Ok(replaced?.then_some(Claim {
        record,
        stolen_from: Some(holder.token.unwrap_or_else(Uuid::nil)),
    }))
}

/// Removes `name` if `token` still owns it. Returns `false` when the lock
/// had been stolen, is being stolen, or was already gone.
pub(crate) fn release(
    dir: &Dir,
    name: &str,
    token: Uuid,
    now: DateTime<Utc>,
    expiry: Duration,
) -> io::Result<bool> {
    let marker = steal_marker(name);
    let Some(guard) = claim(dir, &marker, now, expiry)? else {
        return Ok(false);
    };
    let released = read_holder(dir, name).and_then(|holder| match holder {
        Some(held) if held.token == Some(token) => remove_if_present(dir, name).map(|()| true),
        _ => Ok(false),
    });
    clear_marker(dir, &marker, guard.record.token);
    released
}
