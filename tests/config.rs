use assert_matches::assert_matches;

use carbon_portal_retriever::config::{Config, ConfigLoader};
use carbon_portal_retriever::error::PortalError;

#[test]
fn partial_file_fills_in_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cp-retriever.json");
    std::fs::write(
        &path,
        r#"{"bind": "0.0.0.0:8080", "object_specs": ["http://example.org/spec/a"]}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.bind.port(), 8080);
    assert_eq!(resolved.object_specs.len(), 1);
    assert_eq!(
        resolved.sparql_endpoint.as_str(),
        "https://meta.icos-cp.eu/sparql"
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(PortalError::ConfigRead(_))
    );
}

#[test]
fn invalid_values_are_rejected() {
    let mut config = Config::default();
    config.sparql_endpoint = "not an endpoint".to_string();
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(PortalError::InvalidConfig(_))
    );

    let mut config = Config::default();
    config.bind = "localhost".to_string();
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(PortalError::InvalidConfig(_))
    );
}

#[test]
fn malformed_json_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cp-retriever.json");
    std::fs::write(&path, "{ nope").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(PortalError::ConfigParse(_))
    );
}
