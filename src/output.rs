use std::io::{self, Write};

use serde::Serialize;

use crate::app::{PopulateReport, SyncReport};
use crate::domain::ObjectId;
use crate::queries::dataset::DatasetRecord;
use crate::queries::station::StationRow;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_station(rows: &[StationRow]) -> io::Result<()> {
        Self::print_json(&rows)
    }

    pub fn print_datasets(records: &[DatasetRecord]) -> io::Result<()> {
        Self::print_json(&records)
    }

    pub fn print_objects(pids: &[ObjectId]) -> io::Result<()> {
        Self::print_json(&pids)
    }

    pub fn print_sync(report: &SyncReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_populate(report: &PopulateReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
