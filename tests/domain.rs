use assert_matches::assert_matches;

use carbon_portal_retriever::domain::{Iri, ObjectId, StationId};
use carbon_portal_retriever::error::PortalError;

#[test]
fn parse_pid_valid() {
    let pid: ObjectId = "qbnUz2pNx8g9tXUFf5Kx9Xau".parse().unwrap();
    assert_eq!(pid.as_str(), "qbnUz2pNx8g9tXUFf5Kx9Xau");
}

#[test]
fn parse_pid_invalid() {
    let too_long = "x".repeat(129);
    for value in ["", "a/b", "../etc", "with space", " abc", "abc\n", too_long.as_str()] {
        let err = value.parse::<ObjectId>().unwrap_err();
        assert_matches!(err, PortalError::InvalidPid(_));
    }
}

#[test]
fn pid_from_object_iri() {
    let iri: Iri = "https://meta.icos-cp.eu/objects/qbnUz2pNx8g9tXUFf5Kx9Xau"
        .parse()
        .unwrap();
    let pid = ObjectId::from_iri(&iri).unwrap();
    assert_eq!(pid.as_str(), "qbnUz2pNx8g9tXUFf5Kx9Xau");

    let base: Iri = "https://meta.icos-cp.eu/objects/".parse().unwrap();
    assert_eq!(pid.iri(&base).unwrap(), iri);
}

#[test]
fn station_accepts_full_iri_or_code() {
    let base: Iri = "http://example.org/stations".parse().unwrap();
    let code = StationId::resolve("OS_11SS", &base).unwrap();
    assert_eq!(code.as_str(), "http://example.org/stations/OS_11SS");

    let full = StationId::resolve("http://meta.icos-cp.eu/resources/stations/OS_11SS", &base)
        .unwrap();
    assert_eq!(
        full.as_str(),
        "http://meta.icos-cp.eu/resources/stations/OS_11SS"
    );

    assert_matches!(
        StationId::resolve("S1> } ?x ?y ?z {", &base),
        Err(PortalError::InvalidStationId(_))
    );
}

#[test]
fn pid_is_validated_when_deserialized() {
    let pid: ObjectId = serde_json::from_str(r#""abc-1""#).unwrap();
    assert_eq!(pid.as_str(), "abc-1");
    assert_eq!(serde_json::to_string(&pid).unwrap(), r#""abc-1""#);

    assert!(serde_json::from_str::<ObjectId>(r#""../etc""#).is_err());
    assert!(serde_json::from_str::<ObjectId>(r#"" abc""#).is_err());
}
