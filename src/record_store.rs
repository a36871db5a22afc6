//! User access records persisted one per line as `username|password|status|expiry`.
//!
//! The store is an upsert table keyed by username. Every upsert rewrites
//! the whole file; an updated record keeps its original position and
//! unrelated lines are carried over verbatim.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::codec;
use crate::errors::{SafeLock, SyncError, SyncResult};
use crate::input_validator::{validate_field, validate_key};

/// Number of fields in a user record line.
pub const USER_RECORD_ARITY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    /// Stored as given; the file format has no hashing.
    pub password: String,
    pub status: String,
    pub expiry: String,
}

impl UserRecord {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        status: impl Into<String>,
        expiry: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            status: status.into(),
            expiry: expiry.into(),
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        validate_key("username", &self.username)?;
        validate_field("password", &self.password)?;
        validate_field("status", &self.status)?;
        validate_field("expiry", &self.expiry)
    }

    pub fn encode(&self) -> SyncResult<String> {
        codec::encode(&[
            &self.username,
            &self.password,
            &self.status,
            &self.expiry,
        ])
    }

    pub fn decode(line: &str) -> SyncResult<Self> {
        let mut fields = codec::decode_exact(line, USER_RECORD_ARITY)?.into_iter();
        // decode_exact guarantees four fields
        let mut next = || fields.next().unwrap_or_default();
        Ok(Self {
            username: next(),
            password: next(),
            status: next(),
            expiry: next(),
        })
    }
}

/// Outcome of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Insert-or-update table of user records.
///
/// `lookup` distinguishes a missing key (`NotFound`) from a missing or
/// unreadable backing store (`StorageUnavailable`).
pub trait RecordStore: Send + Sync {
    fn upsert(&self, record: &UserRecord) -> SyncResult<UpsertOutcome>;

    fn lookup(&self, username: &str) -> SyncResult<UserRecord>;
}

/// Line-oriented text file implementation of [`RecordStore`].
pub struct TextRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TextRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_existing(&self) -> SyncResult<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(SyncError::storage("reading user file", e)),
        }
    }

    fn write_replacing(&self, content: &str) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| SyncError::storage("creating storage directory", e))?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path)
            .map_err(|e| SyncError::storage("creating temporary user file", e))?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| SyncError::storage("writing temporary user file", e))?;

        fs::rename(&tmp_path, &self.path)
            .map_err(|e| SyncError::storage("replacing user file", e))
    }
}

fn first_field(line: &str) -> &str {
    line.trim()
        .split(codec::DELIMITER)
        .next()
        .unwrap_or("")
}

impl RecordStore for TextRecordStore {
    fn upsert(&self, record: &UserRecord) -> SyncResult<UpsertOutcome> {
        record.validate()?;
        let new_line = record.encode()?;

        let _guard = self.lock.safe_lock("user_file")?;
        let existing = self.read_existing()?;

        let mut output = String::with_capacity(existing.len() + new_line.len());
        let mut outcome = UpsertOutcome::Inserted;

        for line in existing.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if first_field(line) == record.username {
                if outcome == UpsertOutcome::Inserted {
                    output.push_str(&new_line);
                    outcome = UpsertOutcome::Updated;
                } else {
                    tracing::warn!(
                        username = %record.username,
                        "dropping duplicate user record line"
                    );
                }
                continue;
            }
            output.push_str(line);
            output.push('\n');
        }

        if outcome == UpsertOutcome::Inserted {
            output.push_str(&new_line);
        }

        self.write_replacing(&output)?;
        tracing::info!(
            username = %record.username,
            status = %record.status,
            outcome = ?outcome,
            "user record upserted"
        );
        Ok(outcome)
    }

    fn lookup(&self, username: &str) -> SyncResult<UserRecord> {
        let _guard = self.lock.safe_lock("user_file")?;

        let file = File::open(&self.path).map_err(|e| {
            tracing::debug!(path = %self.path.display(), error = %e, "user file unavailable");
            SyncError::storage_unavailable(&self.path)
        })?;

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|_| SyncError::storage_unavailable(&self.path))?;
            if line.trim().is_empty() {
                continue;
            }
            // Hand-edited lines may carry stray surrounding whitespace.
            match UserRecord::decode(line.trim()) {
                Ok(record) if record.username == username => return Ok(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(line = idx + 1, error = %e, "skipping malformed user record");
                }
            }
        }

        tracing::debug!(username, "user record not found");
        Err(SyncError::not_found("user", username))
    }
}
