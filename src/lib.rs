//! Library root for the `harmony_sync` crate
//! Flat-file admin backend: user access records, event logs and consent.

// Core error handling
pub mod api_errors;
pub mod errors;

// Line codec and storage
pub mod codec;
pub mod consent;
pub mod log_sink;
pub mod record_store;

// Configuration & CLI
pub mod cli;
pub mod config;
pub mod config_loader;

// Storage bootstrap and input checks
pub mod bootstrap;
pub mod input_validator;

// Web server interface
pub mod app_state;
pub mod syncweb;

pub use consent::{ConsentEntry, ConsentGate, ConsentSubmission};
pub use errors::{SyncError, SyncResult};
pub use log_sink::{AnalysisEntry, AnalysisEvent, AppendLogSink, ChatEntry, LogCategory};
pub use record_store::{RecordStore, TextRecordStore, UpsertOutcome, UserRecord};
