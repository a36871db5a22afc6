use std::sync::Arc;

use crate::{
    config::{DeviceIdentity, StoragePaths, SyncConfig},
    consent::ConsentGate,
    log_sink::AppendLogSink,
    record_store::{RecordStore, TextRecordStore},
};

/// Everything a request handler needs. Built once at startup; the
/// storage location and device identity are fixed values from then on.
pub struct AppState {
    pub paths: StoragePaths,
    pub device: DeviceIdentity,
    pub records: Arc<dyn RecordStore>,
    pub logs: AppendLogSink,
    pub consent: ConsentGate,
}

impl AppState {
    pub fn new(paths: StoragePaths, device: DeviceIdentity) -> Self {
        let records: Arc<dyn RecordStore> = Arc::new(TextRecordStore::new(paths.user_file.clone()));
        Self::with_record_store(paths, device, records)
    }

    pub fn with_record_store(
        paths: StoragePaths,
        device: DeviceIdentity,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            consent: ConsentGate::new(paths.consent_log.clone()),
            logs: AppendLogSink::new(paths.clone()),
            records,
            device,
            paths,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.paths(), config.device_identity())
    }
}
