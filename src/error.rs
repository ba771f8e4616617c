use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PortalError {
    #[error("invalid station identifier: {0}")]
    InvalidStationId(String),

    #[error("invalid data object PID: {0}")]
    InvalidPid(String),

    #[error("invalid IRI: {0}")]
    InvalidIri(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("dataset query needs at least one data object")]
    EmptyObjectSet,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("SPARQL request failed: {0}")]
    SparqlHttp(String),

    #[error("SPARQL endpoint returned status {status}: {message}")]
    SparqlStatus { status: u16, message: String },

    #[error("malformed SPARQL results: {0}")]
    SparqlResults(String),

    #[error("CSV request failed: {0}")]
    CsvHttp(String),

    #[error("data object {pid} returned status {status}: {message}")]
    CsvStatus {
        pid: String,
        status: u16,
        message: String,
    },

    #[error("PID {0} not in ledger")]
    UnknownPid(String),

    #[error("failed to parse ledger: {0}")]
    LedgerParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("server error: {0}")]
    Server(String),
}
