use std::collections::BTreeSet;
use std::fs;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{ObjectId, StationId};
use crate::error::PortalError;
use crate::ledger::{Ledger, write_atomic};
use crate::queries::catalog::list_data_objects;
use crate::queries::dataset::{DatasetQuery, DatasetRecord};
use crate::queries::station::{StationQuery, StationRow};
use crate::retrieval::CsvFetcher;
use crate::sparql::SparqlClient;
use crate::temporal::DateWindow;

/// Objects per dataset metadata query during a sync.
pub const METADATA_BATCH: usize = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub undeleted: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDownload {
    pub pid: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PopulateReport {
    pub downloaded: Vec<String>,
    pub failed: Vec<FailedDownload>,
}

pub struct App<S: SparqlClient, F: CsvFetcher> {
    config: ResolvedConfig,
    sparql: S,
    fetcher: F,
}

impl<S: SparqlClient, F: CsvFetcher> App<S, F> {
    pub fn new(config: ResolvedConfig, sparql: S, fetcher: F) -> Self {
        Self {
            config,
            sparql,
            fetcher,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn station_metadata(
        &self,
        station: &str,
        window: DateWindow,
    ) -> Result<Vec<StationRow>, PortalError> {
        let station = StationId::resolve(station, &self.config.station_base)?;
        StationQuery::new(station, window).run(&self.sparql)
    }

    pub fn dataset_metadata(&self, pids: Vec<ObjectId>) -> Result<Vec<DatasetRecord>, PortalError> {
        DatasetQuery::new(pids, self.config.object_base.clone())?.run(&self.sparql)
    }

    pub fn list_objects(&self) -> Result<Vec<ObjectId>, PortalError> {
        list_data_objects(&self.sparql, &self.config.object_specs)
    }

    /// Reconciles the ledger with the portal catalog and refreshes stored
    /// metadata where it changed. The ledger is saved once, on success.
    pub fn update_from_portal(&self, ledger: &mut Ledger) -> Result<SyncReport, PortalError> {
        let mut report = SyncReport::default();
        let portal_pids = self.list_objects()?;
        info!(objects = portal_pids.len(), "portal catalog retrieved");

        for pid in &portal_pids {
            if !ledger.contains(pid) {
                ledger.add_pid(pid);
                report.added.push(pid.to_string());
            } else if ledger.is_deleted(pid)? {
                ledger.undelete(pid)?;
                report.undeleted.push(pid.to_string());
            }
        }

        for batch in portal_pids.chunks(METADATA_BATCH) {
            for record in self.dataset_metadata(batch.to_vec())? {
                let metadata = serde_json::to_value(&record)
                    .map_err(|err| PortalError::LedgerParse(err.to_string()))?;
                if ledger.metadata(&record.pid)? != metadata {
                    ledger.set_metadata(&record.pid, metadata)?;
                    report.updated.push(record.pid.to_string());
                }
            }
        }

        let known = portal_pids
            .iter()
            .map(|pid| pid.as_str().to_string())
            .collect::<BTreeSet<_>>();
        for active in ledger.active_pids() {
            if known.contains(&active) {
                continue;
            }
            let pid: ObjectId = active.parse()?;
            ledger.mark_deleted(&pid)?;
            report.deleted.push(active);
        }

        ledger.save()?;
        Ok(report)
    }

    /// Downloads the CSV of every new, non-deleted ledger entry into
    /// `<datasets_dir>/<pid>/`. Failures are reported per dataset; the ledger
    /// is saved after every completed download.
    pub fn populate(&self, ledger: &mut Ledger) -> Result<PopulateReport, PortalError> {
        let datasets_dir = Utf8PathBuf::from_path_buf(self.config.datasets_dir.clone())
            .map_err(|_| PortalError::Filesystem("invalid datasets directory".to_string()))?;
        fs::create_dir_all(datasets_dir.as_std_path()).map_err(|err| {
            PortalError::Filesystem(format!("cannot create datasets directory: {err}"))
        })?;
        info!("checking for required ERDDAP updates");

        let mut report = PopulateReport::default();
        for status in ledger.statuses() {
            if !status.new || status.delete {
                continue;
            }
            let pid: ObjectId = status.pid.parse()?;
            info!(%pid, "downloading dataset");
            let file_name = ledger
                .file_name(&pid)?
                .filter(|name| is_plain_file_name(name))
                .unwrap_or_else(|| format!("{pid}.csv"));
            let destination = datasets_dir.join(pid.as_str()).join(&file_name);

            let written = self
                .fetcher
                .fetch_csv(&pid)
                .map_err(|failure| failure.into_portal_error(&pid))
                .and_then(|bytes| write_atomic(&destination, &bytes));
            match written {
                Ok(()) => {
                    ledger.clear_new(&pid)?;
                    ledger.save()?;
                    report.downloaded.push(pid.to_string());
                }
                Err(err) => {
                    error!(%pid, error = %err, "unable to download dataset");
                    report.failed.push(FailedDownload {
                        pid: pid.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "some datasets were not downloaded");
        }
        Ok(report)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
