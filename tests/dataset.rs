use assert_matches::assert_matches;

use carbon_portal_retriever::domain::{Iri, ObjectId};
use carbon_portal_retriever::error::PortalError;
use carbon_portal_retriever::queries::catalog::list_data_objects;
use carbon_portal_retriever::queries::dataset::{DatasetQuery, DatasetRecord, expocode};
use carbon_portal_retriever::sparql::{QueryRow, SparqlClient};
use carbon_portal_retriever::temporal::parse_timestamp;

const OBJECTS: &str = "https://meta.icos-cp.eu/objects/";

struct FixedSparql(Vec<QueryRow>);

impl SparqlClient for FixedSparql {
    fn select(&self, _query: &str) -> Result<Vec<QueryRow>, PortalError> {
        Ok(self.0.clone())
    }
}

struct FailingSparql;

impl SparqlClient for FailingSparql {
    fn select(&self, _query: &str) -> Result<Vec<QueryRow>, PortalError> {
        Err(PortalError::SparqlStatus {
            status: 400,
            message: "Query parse error".to_string(),
        })
    }
}

fn base() -> Iri {
    OBJECTS.parse().unwrap()
}

fn object_row(pid: &str, file_name: &str) -> QueryRow {
    QueryRow::new()
        .with_iri("dobj", &format!("{OBJECTS}{pid}"))
        .with_iri(
            "spec",
            "http://meta.icos-cp.eu/resources/cpmeta/icosOtcL2Product",
        )
        .with_literal("fileName", file_name)
        .with_iri("station", "http://meta.icos-cp.eu/resources/stations/OS_11SS")
}

fn pids(values: &[&str]) -> Vec<ObjectId> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

#[test]
fn missing_objects_produce_no_row() {
    let client = FixedSparql(vec![object_row("D1", "11SS20200101.csv")]);
    let query = DatasetQuery::new(pids(&["D1", "D2"]), base()).unwrap();
    let records = query.run(&client).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pid.as_str(), "D1");
    assert_eq!(records[0].expocode, "11SS20200101");
}

#[test]
fn direct_start_time_wins_over_acquisition() {
    let row = object_row("D1", "a.csv")
        .with_literal("directStart", "2020-02-01T00:00:00Z")
        .with_literal("acqStart", "2019-01-01T00:00:00Z")
        .with_literal("acqEnd", "2020-05-01T00:00:00Z");
    let record = DatasetRecord::from_row(&row).unwrap();
    assert_eq!(record.start_time, parse_timestamp("2020-02-01T00:00:00Z"));
    assert_eq!(record.end_time, parse_timestamp("2020-05-01T00:00:00Z"));
}

#[test]
fn optional_fields_do_not_affect_inclusion() {
    let record = DatasetRecord::from_row(&object_row("D1", "plain")).unwrap();
    assert_eq!(record.rows, None);
    assert_eq!(record.citation, None);
    assert!(record.keywords.is_empty());
    assert_eq!(record.start_time, None);
    assert_eq!(record.expocode, "plain");

    let full = object_row("D1", "x.csv")
        .with_literal("rows", "1200")
        .with_literal("citation", "Doe J. (2020)")
        .with_literal("keywords", "ocean,fCO2");
    let record = DatasetRecord::from_row(&full).unwrap();
    assert_eq!(record.rows, Some(1200));
    assert_eq!(record.keywords, vec!["ocean", "fCO2"]);
}

#[test]
fn records_follow_request_order_and_collapse_duplicates() {
    let client = FixedSparql(vec![
        object_row("B", "b1.csv"),
        object_row("A", "a.csv"),
        object_row("B", "b2.csv"),
    ]);
    let query = DatasetQuery::new(pids(&["A", "B"]), base()).unwrap();
    let records = query.run(&client).unwrap();
    let names = records
        .iter()
        .map(|record| record.file_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["a.csv", "b1.csv"]);
}

#[test]
fn engine_failures_propagate() {
    let query = DatasetQuery::new(pids(&["D1"]), base()).unwrap();
    let err = query.run(&FailingSparql).unwrap_err();
    assert_matches!(err, PortalError::SparqlStatus { status: 400, .. });
}

#[test]
fn expocode_examples() {
    assert_eq!(expocode("ABC.csv"), "ABC");
    assert_eq!(expocode("ABC"), "ABC");
}

#[test]
fn catalog_lists_sorted_unique_pids() {
    let client = FixedSparql(vec![
        QueryRow::new().with_iri("dobj", &format!("{OBJECTS}zz")),
        QueryRow::new().with_iri("dobj", &format!("{OBJECTS}aa")),
        QueryRow::new().with_iri("dobj", &format!("{OBJECTS}zz")),
    ]);
    let specs = vec![
        "http://meta.icos-cp.eu/resources/cpmeta/icosOtcL2Product"
            .parse()
            .unwrap(),
    ];
    let listed = list_data_objects(&client, &specs).unwrap();
    assert_eq!(listed, pids(&["aa", "zz"]));
}
