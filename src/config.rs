use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_OBJECT_BASE, DEFAULT_STATION_BASE, Iri};
use crate::error::PortalError;
use crate::queries::catalog::DEFAULT_OBJECT_SPECS;

pub const CONFIG_FILE: &str = "cp-retriever.json";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sparql_endpoint: String,
    pub data_endpoint: String,
    pub station_base: String,
    pub object_base: String,
    pub object_specs: Vec<String>,
    pub bind: String,
    pub timeout_secs: u64,
    pub datasets_dir: String,
    pub ledger_path: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sparql_endpoint: "https://meta.icos-cp.eu/sparql".to_string(),
            data_endpoint: "https://data.icos-cp.eu".to_string(),
            station_base: DEFAULT_STATION_BASE.to_string(),
            object_base: DEFAULT_OBJECT_BASE.to_string(),
            object_specs: DEFAULT_OBJECT_SPECS.iter().map(|s| s.to_string()).collect(),
            bind: "127.0.0.1:5000".to_string(),
            timeout_secs: 60,
            datasets_dir: "datasets".to_string(),
            ledger_path: "erddap_transfer.json".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub sparql_endpoint: Iri,
    pub data_endpoint: Iri,
    pub station_base: Iri,
    pub object_base: Iri,
    pub object_specs: Vec<Iri>,
    pub bind: SocketAddr,
    pub timeout: Duration,
    pub datasets_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub log_level: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist. Without one, `cp-retriever.json` in the
    /// working directory and then in the user config directory are tried,
    /// falling back to defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PortalError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::default_locations()
                .into_iter()
                .find(|candidate| candidate.exists()),
        };

        let config = match config_path {
            Some(config_path) => {
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| PortalError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| PortalError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PortalError> {
        let iri = |field: &str, value: &str| {
            value
                .parse::<Iri>()
                .map_err(|_| PortalError::InvalidConfig(format!("{field}: {value}")))
        };

        let object_specs = config
            .object_specs
            .iter()
            .map(|spec| iri("object_specs", spec))
            .collect::<Result<Vec<_>, PortalError>>()?;

        let bind = config
            .bind
            .parse::<SocketAddr>()
            .map_err(|_| PortalError::InvalidConfig(format!("bind: {}", config.bind)))?;

        if config.timeout_secs == 0 {
            return Err(PortalError::InvalidConfig(
                "timeout_secs must be positive".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            sparql_endpoint: iri("sparql_endpoint", &config.sparql_endpoint)?,
            data_endpoint: iri("data_endpoint", &config.data_endpoint)?,
            station_base: iri("station_base", &config.station_base)?,
            object_base: iri("object_base", &config.object_base)?,
            object_specs,
            bind,
            timeout: Duration::from_secs(config.timeout_secs),
            datasets_dir: PathBuf::from(config.datasets_dir),
            ledger_path: PathBuf::from(config.ledger_path),
            log_level: config.log_level,
        })
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dirs) = BaseDirs::new() {
            locations.push(dirs.config_dir().join("cp-retriever").join(CONFIG_FILE));
        }
        locations
    }
}
