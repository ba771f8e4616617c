//! Local record of every data object seen in the portal and its transfer
//! state towards the ERDDAP server.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::ObjectId;
use crate::error::PortalError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub new: bool,
    pub updated: bool,
    pub deleted: bool,
    #[serde(default)]
    pub deleted_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetStatus {
    pub pid: String,
    pub new: bool,
    pub update: bool,
    pub delete: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    data_objects: BTreeMap<String, LedgerRecord>,
}

/// Mutations stay in memory until [`Ledger::save`].
#[derive(Debug)]
pub struct Ledger {
    path: Utf8PathBuf,
    records: BTreeMap<String, LedgerRecord>,
}

impl Ledger {
    /// Loads the ledger, starting an empty one when the file does not exist.
    pub fn open(path: &Path) -> Result<Self, PortalError> {
        let path = Utf8PathBuf::from_path_buf(path.to_path_buf())
            .map_err(|_| PortalError::Filesystem("invalid ledger path".to_string()))?;
        debug!(%path, "opening ledger");
        if !path.as_std_path().exists() {
            info!(%path, "initialising new ledger");
            let ledger = Self {
                path,
                records: BTreeMap::new(),
            };
            ledger.save()?;
            return Ok(ledger);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| PortalError::Filesystem(err.to_string()))?;
        let file: LedgerFile = serde_json::from_str(&content)
            .map_err(|err| PortalError::LedgerParse(err.to_string()))?;
        Ok(Self {
            path,
            records: file.data_objects,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn contains(&self, pid: &ObjectId) -> bool {
        debug!(%pid, "checking ledger for PID");
        self.records.contains_key(pid.as_str())
    }

    pub fn is_deleted(&self, pid: &ObjectId) -> Result<bool, PortalError> {
        Ok(self.record(pid)?.deleted)
    }

    /// Adds a PID with no metadata and its `new` flag set.
    pub fn add_pid(&mut self, pid: &ObjectId) {
        info!(%pid, "adding PID to ledger");
        self.records.insert(
            pid.to_string(),
            LedgerRecord {
                id: pid.to_string(),
                metadata: None,
                new: true,
                updated: false,
                deleted: false,
                deleted_time: None,
            },
        );
    }

    pub fn undelete(&mut self, pid: &ObjectId) -> Result<(), PortalError> {
        info!(%pid, "removing delete flag");
        let record = self.record_mut(pid)?;
        record.deleted = false;
        record.deleted_time = None;
        record.updated = true;
        Ok(())
    }

    pub fn mark_deleted(&mut self, pid: &ObjectId) -> Result<(), PortalError> {
        info!(%pid, "marking PID as deleted");
        let record = self.record_mut(pid)?;
        record.deleted = true;
        record.deleted_time = Some(Utc::now());
        Ok(())
    }

    /// PIDs not marked deleted, sorted.
    pub fn active_pids(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|record| !record.deleted)
            .map(|record| record.id.clone())
            .collect()
    }

    /// Stored metadata, or an empty object when none has been recorded yet.
    pub fn metadata(&self, pid: &ObjectId) -> Result<Value, PortalError> {
        Ok(self
            .record(pid)?
            .metadata
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    /// Stores metadata; flags the record as updated unless it is still new.
    pub fn set_metadata(&mut self, pid: &ObjectId, metadata: Value) -> Result<(), PortalError> {
        info!(%pid, "updating metadata");
        let record = self.record_mut(pid)?;
        record.metadata = Some(metadata);
        if !record.new {
            record.updated = true;
        }
        Ok(())
    }

    pub fn clear_new(&mut self, pid: &ObjectId) -> Result<(), PortalError> {
        debug!(%pid, "clearing new flag");
        self.record_mut(pid)?.new = false;
        Ok(())
    }

    pub fn statuses(&self) -> Vec<DatasetStatus> {
        self.records
            .values()
            .map(|record| DatasetStatus {
                pid: record.id.clone(),
                new: record.new,
                update: record.updated,
                delete: record.deleted,
            })
            .collect()
    }

    /// File name recorded in the PID's metadata, if any.
    pub fn file_name(&self, pid: &ObjectId) -> Result<Option<String>, PortalError> {
        Ok(self
            .record(pid)?
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("file_name"))
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()))
    }

    fn record(&self, pid: &ObjectId) -> Result<&LedgerRecord, PortalError> {
        self.records
            .get(pid.as_str())
            .ok_or_else(|| PortalError::UnknownPid(pid.to_string()))
    }

    fn record_mut(&mut self, pid: &ObjectId) -> Result<&mut LedgerRecord, PortalError> {
        self.records
            .get_mut(pid.as_str())
            .ok_or_else(|| PortalError::UnknownPid(pid.to_string()))
    }

    /// Writes every record back to the ledger file in one atomic replace.
    pub fn save(&self) -> Result<(), PortalError> {
        debug!(path = %self.path, records = self.records.len(), "saving ledger");
        let file = LedgerFile {
            data_objects: self.records.clone(),
        };
        let content = serde_json::to_vec_pretty(&file)
            .map_err(|err| PortalError::Filesystem(err.to_string()))?;
        write_atomic(&self.path, &content)
    }
}

/// Writes through a temporary file in the destination directory and renames it into place.
pub fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), PortalError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("cp-retriever")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    Ok(())
}
