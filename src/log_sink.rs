// Append-only event logs: chat messages, analysis events and consent entries.
// Each category owns one file; entries are only ever appended.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::codec;
use crate::config::StoragePaths;
use crate::consent::ConsentEntry;
use crate::errors::{SafeLock, SyncError, SyncResult};
use crate::input_validator::{validate_field, validate_identifier, validate_key};

pub const CHAT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const ANALYSIS_DATE_FORMAT: &str = "%Y-%m-%d";
pub const ANALYSIS_TIME_FORMAT: &str = "%H:%M:%S";

/// LogCategory selects the backing file of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Chat,
    Analysis,
    Consent,
}

impl LogCategory {
    /// Field count of a pipe-delimited line; `None` for JSON-line logs.
    pub fn arity(self) -> Option<usize> {
        match self {
            LogCategory::Chat => Some(3),
            LogCategory::Analysis => Some(8),
            LogCategory::Consent => None,
        }
    }

    fn resource(self) -> &'static str {
        match self {
            LogCategory::Chat => "chat_log",
            LogCategory::Analysis => "issue_log",
            LogCategory::Consent => "consent_log",
        }
    }
}

/// A chat message as stored: `user_id|YYYY-MM-DD HH:MM:SS|message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl ChatEntry {
    /// Builds an entry, sanitizing `raw_message` so it fits on one line.
    pub fn new(user_id: impl Into<String>, raw_message: &str, at: NaiveDateTime) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: at,
            message: codec::sanitize_free_text(raw_message),
        }
    }

    pub fn now(user_id: impl Into<String>, raw_message: &str) -> Self {
        Self::new(user_id, raw_message, Local::now().naive_local())
    }

    pub fn fields(&self) -> [String; 3] {
        [
            self.user_id.clone(),
            self.timestamp.format(CHAT_TIMESTAMP_FORMAT).to_string(),
            self.message.clone(),
        ]
    }
}

/// Analysis request outcome as reported by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisEvent {
    pub user_id: String,
    /// gpt, gemini, offline, ...
    pub engine: String,
    /// pareto, fishbone, ...
    pub method: String,
    pub status: String,
    pub download_flag: String,
    pub report_flag: String,
}

impl AnalysisEvent {
    pub fn at(self, when: NaiveDateTime) -> AnalysisEntry {
        AnalysisEntry {
            user_id: self.user_id,
            engine: self.engine,
            method: self.method,
            date: when.format(ANALYSIS_DATE_FORMAT).to_string(),
            time: when.format(ANALYSIS_TIME_FORMAT).to_string(),
            status: self.status,
            download_flag: self.download_flag,
            report_flag: self.report_flag,
        }
    }

    pub fn now(self) -> AnalysisEntry {
        self.at(Local::now().naive_local())
    }
}

/// `user_id|engine|method|YYYY-MM-DD|HH:MM:SS|status|download_flag|report_flag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisEntry {
    pub user_id: String,
    pub engine: String,
    pub method: String,
    pub date: String,
    pub time: String,
    pub status: String,
    pub download_flag: String,
    pub report_flag: String,
}

impl AnalysisEntry {
    pub fn fields(&self) -> [&str; 8] {
        [
            &self.user_id,
            &self.engine,
            &self.method,
            &self.date,
            &self.time,
            &self.status,
            &self.download_flag,
            &self.report_flag,
        ]
    }
}

/// Write-only sink over the three event logs.
pub struct AppendLogSink {
    paths: StoragePaths,
    chat_lock: Mutex<()>,
    issue_lock: Mutex<()>,
    consent_lock: Mutex<()>,
}

impl AppendLogSink {
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            chat_lock: Mutex::new(()),
            issue_lock: Mutex::new(()),
            consent_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn path_for(&self, category: LogCategory) -> &Path {
        match category {
            LogCategory::Chat => &self.paths.chat_log,
            LogCategory::Analysis => &self.paths.issue_log,
            LogCategory::Consent => &self.paths.consent_log,
        }
    }

    fn lock_for(&self, category: LogCategory) -> &Mutex<()> {
        match category {
            LogCategory::Chat => &self.chat_lock,
            LogCategory::Analysis => &self.issue_lock,
            LogCategory::Consent => &self.consent_lock,
        }
    }

    /// Append one pipe-delimited line to `category`'s log.
    ///
    /// The field count must match the category; consent entries go through
    /// [`AppendLogSink::append_consent`].
    pub fn append<S: AsRef<str>>(&self, category: LogCategory, fields: &[S]) -> SyncResult<()> {
        let Some(arity) = category.arity() else {
            return Err(SyncError::validation(
                "category",
                "consent entries are JSON documents",
            ));
        };
        if fields.len() != arity {
            return Err(SyncError::validation(
                "fields",
                format!("{category:?} entries have {arity} fields, got {}", fields.len()),
            ));
        }
        let line = codec::encode(fields)?;
        self.append_line(category, &line)?;
        tracing::info!(category = ?category, "log entry appended");
        Ok(())
    }

    pub fn append_chat(&self, entry: &ChatEntry) -> SyncResult<()> {
        validate_key("user_id", &entry.user_id)?;
        self.append(LogCategory::Chat, &entry.fields())
    }

    pub fn append_analysis(&self, entry: &AnalysisEntry) -> SyncResult<()> {
        validate_key("user_id", &entry.user_id)?;
        for (name, value) in [
            ("engine", &entry.engine),
            ("method", &entry.method),
            ("status", &entry.status),
            ("download", &entry.download_flag),
            ("report", &entry.report_flag),
        ] {
            validate_field(name, value)?;
        }
        self.append(LogCategory::Analysis, &entry.fields())
    }

    /// Append a consent entry to the master log, then overwrite the user's
    /// snapshot document. Returns the snapshot path.
    pub fn append_consent(&self, entry: &ConsentEntry) -> SyncResult<PathBuf> {
        validate_identifier("user_id", &entry.user_id)?;

        let mut line = serde_json::to_string(entry)
            .map_err(|e| SyncError::serialization("consent log entry", e))?;
        line.push('\n');
        let snapshot = serde_json::to_string_pretty(entry)
            .map_err(|e| SyncError::serialization("consent snapshot", e))?;

        let snapshot_path = self.paths.consent_snapshot(&entry.user_id);
        {
            let _guard = self.consent_lock.safe_lock(LogCategory::Consent.resource())?;
            self.write_appending(LogCategory::Consent, &line)?;
            fs::write(&snapshot_path, snapshot)
                .map_err(|e| SyncError::storage("writing consent snapshot", e))?;
        }

        tracing::info!(
            user_id = %entry.user_id,
            agreed = entry.agreed,
            snapshot = %snapshot_path.display(),
            "consent recorded"
        );
        Ok(snapshot_path)
    }

    fn append_line(&self, category: LogCategory, line: &str) -> SyncResult<()> {
        let _guard = self.lock_for(category).safe_lock(category.resource())?;
        self.write_appending(category, line)
    }

    // Caller holds the category lock.
    fn write_appending(&self, category: LogCategory, line: &str) -> SyncResult<()> {
        let path = self.path_for(category);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| SyncError::storage("creating storage directory", e))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SyncError::storage(format!("opening {}", category.resource()), e))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| SyncError::storage(format!("appending to {}", category.resource()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn chat_message_is_sanitized() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));

        sink.append_chat(&ChatEntry::new("u1", "line1\nline2|x", at()))
            .unwrap();

        assert_eq!(
            read(&sink.paths().chat_log),
            "u1|2025-01-02 03:04:05|line1 line2/x\n"
        );
    }

    #[test]
    fn chat_user_id_only_needs_to_be_a_key() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));

        sink.append_chat(&ChatEntry::new("john..doe", "hi", at())).unwrap();
        assert!(sink.append_chat(&ChatEntry::new("a|b", "hi", at())).is_err());

        assert_eq!(read(&sink.paths().chat_log), "john..doe|2025-01-02 03:04:05|hi\n");
    }

    #[test]
    fn append_to_unwritable_root_is_storage_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(&blocker));

        let err = sink
            .append_chat(&ChatEntry::new("u1", "hi", at()))
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage { .. }), "got {err:?}");
    }

    #[test]
    fn duplicates_are_appended_not_merged() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));
        let entry = ChatEntry::new("u1", "hello", at());

        for _ in 0..3 {
            sink.append_chat(&entry).unwrap();
        }
        assert_eq!(read(&sink.paths().chat_log).lines().count(), 3);
    }

    #[test]
    fn analysis_line_has_eight_fields() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));
        let entry = AnalysisEvent {
            user_id: "u1".into(),
            engine: "gpt".into(),
            method: "pareto".into(),
            status: "success".into(),
            download_flag: "Y".into(),
            report_flag: "N".into(),
        }
        .at(at());

        sink.append_analysis(&entry).unwrap();
        let content = read(&sink.paths().issue_log);
        assert_eq!(content, "u1|gpt|pareto|2025-01-02|03:04:05|success|Y|N\n");
        assert_eq!(codec::decode_exact(&content, 8).unwrap().len(), 8);
    }

    #[test]
    fn analysis_rejects_delimiter() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));
        let entry = AnalysisEvent {
            user_id: "u1".into(),
            engine: "gpt|4".into(),
            method: "pareto".into(),
            status: "success".into(),
            download_flag: "Y".into(),
            report_flag: "N".into(),
        }
        .at(at());

        assert!(matches!(
            sink.append_analysis(&entry),
            Err(SyncError::InvalidField { .. })
        ));
        assert!(!sink.paths().issue_log.exists());
    }

    #[test]
    fn generic_append_checks_arity_and_category() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));

        assert!(sink.append(LogCategory::Chat, &["u1", "ts"]).is_err());
        assert!(sink.append(LogCategory::Consent, &["x"]).is_err());
        sink.append(LogCategory::Chat, &["u1", "ts", "hi"]).unwrap();
        assert_eq!(read(&sink.paths().chat_log), "u1|ts|hi\n");
    }

    #[test]
    fn consent_appends_history_and_overwrites_snapshot() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));
        let mut entry = ConsentEntry {
            timestamp: "2025-01-02 03:04:05.000000".into(),
            user_id: "bob".into(),
            full_name: "Bob".into(),
            mobile: "555".into(),
            device_id: "host-user".into(),
            agreed: true,
            consent_text: "I agree to terms and conditions.".into(),
        };

        sink.append_consent(&entry).unwrap();
        entry.mobile = "777".into();
        let snapshot = sink.append_consent(&entry).unwrap();

        let log = read(&sink.paths().consent_log);
        assert_eq!(log.lines().count(), 2);
        let first: ConsentEntry = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert_eq!(first.mobile, "555");

        assert_eq!(snapshot, dir.path().join("bob.json"));
        let latest: ConsentEntry = serde_json::from_str(&read(&snapshot)).unwrap();
        assert_eq!(latest, entry);
        assert!(read(&snapshot).contains("\n  \"user_id\": \"bob\""));
    }

    #[test]
    fn consent_keys_keep_documented_order() {
        let dir = tempdir().unwrap();
        let sink = AppendLogSink::new(StoragePaths::new(dir.path()));
        let entry = ConsentEntry {
            timestamp: "t".into(),
            user_id: "u".into(),
            full_name: "f".into(),
            mobile: "m".into(),
            device_id: "d".into(),
            agreed: true,
            consent_text: "c".into(),
        };
        sink.append_consent(&entry).unwrap();
        assert_eq!(
            read(&sink.paths().consent_log),
            "{\"timestamp\":\"t\",\"user_id\":\"u\",\"full_name\":\"f\",\"mobile\":\"m\",\"device_id\":\"d\",\"agreed\":true,\"consent_text\":\"c\"}\n"
        );
    }
}
