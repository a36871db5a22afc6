//! Consent records and the consent gate.
//!
//! Consent entries are JSON lines in the master consent log. The gate is a
//! pure predicate over that log, re-read on every call.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::DeviceIdentity;
use crate::errors::{SyncError, SyncResult};
use crate::input_validator::validate_identifier;

pub const DEFAULT_CONSENT_TEXT: &str = "I agree to terms and conditions.";

/// Timestamp layout of consent entries, microsecond precision.
pub const CONSENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn default_consent_text() -> String {
    DEFAULT_CONSENT_TEXT.to_string()
}

/// One consent record, as written to the master log and the per-user snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentEntry {
    pub timestamp: String,
    pub user_id: String,
    pub full_name: String,
    pub mobile: String,
    pub device_id: String,
    pub agreed: bool,
    pub consent_text: String,
}

/// Consent form as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentSubmission {
    pub user_id: String,
    pub full_name: String,
    pub mobile: String,
    pub agreed: bool,
    /// Falls back to the server's device identity when omitted.
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "default_consent_text")]
    pub consent_text: String,
}

impl ConsentSubmission {
    /// A submission is only recorded when every required field is present
    /// and the user actually agreed.
    pub fn validate(&self) -> SyncResult<()> {
        if self.user_id.trim().is_empty()
            || self.full_name.trim().is_empty()
            || self.mobile.trim().is_empty()
            || !self.agreed
        {
            return Err(SyncError::validation(
                "consent",
                "Missing required consent fields.",
            ));
        }
        validate_identifier("user_id", &self.user_id)
    }

    pub fn into_entry(self, at: NaiveDateTime, device: &DeviceIdentity) -> ConsentEntry {
        let device_id = self
            .device_id
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| device.as_str().to_string());
        ConsentEntry {
            timestamp: at.format(CONSENT_TIMESTAMP_FORMAT).to_string(),
            user_id: self.user_id,
            full_name: self.full_name,
            mobile: self.mobile,
            device_id,
            agreed: self.agreed,
            consent_text: self.consent_text,
        }
    }
}

/// Only the two keys the gate looks at; other keys are ignored.
#[derive(Deserialize)]
struct ConsentProbe {
    user_id: String,
    #[serde(default)]
    agreed: bool,
}

/// Answers "has this user consented?" from the master consent log.
///
/// A missing file, an unreadable file, and the absence of an affirmative
/// entry all answer `false`. Any affirmative entry counts, not only the
/// latest one.
#[derive(Debug, Clone)]
pub struct ConsentGate {
    log_path: PathBuf,
}

impl ConsentGate {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn has_consented(&self, user_id: &str) -> bool {
        let file = match File::open(&self.log_path) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(path = %self.log_path.display(), error = %e, "consent log unavailable");
                return false;
            }
        };

        for line in BufReader::new(file).lines() {
            let Ok(line) = line else {
                tracing::warn!(path = %self.log_path.display(), "consent log read failed");
                return false;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ConsentProbe>(&line) {
                Ok(probe) if probe.user_id == user_id && probe.agreed => {
                    tracing::debug!(user_id, "consent verified");
                    return true;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping unparsable consent line"),
            }
        }
        false
    }
}
