use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Iri, ObjectId};
use crate::error::PortalError;
use crate::sparql::{QueryRow, SparqlClient};
use crate::template::{Binding, Bindings, Template, VALUES};

/// File suffix removed to form an expocode.
pub const CSV_SUFFIX: &str = ".csv";

pub const DATASET_TEMPLATE: Template = Template::new(
    r#"prefix cpmeta: <http://meta.icos-cp.eu/ontologies/cpmeta/>
prefix prov: <http://www.w3.org/ns/prov#>

SELECT ?dobj ?spec ?rows ?fileName ?citation ?keywords
       ?directStart ?directEnd ?acqStart ?acqEnd ?station
WHERE {
  VALUES ?dobj { %%VALUES%% }
  ?dobj cpmeta:hasObjectSpec ?spec ;
        cpmeta:hasName ?fileName ;
        cpmeta:wasAcquiredBy ?acquisition .
  ?acquisition prov:wasAssociatedWith ?station .
  OPTIONAL { ?dobj cpmeta:hasNumberOfRows ?rows }
  OPTIONAL { ?dobj cpmeta:hasCitationString ?citation }
  OPTIONAL { ?dobj cpmeta:hasKeywords ?keywords }
  OPTIONAL { ?dobj cpmeta:hasStartTime ?directStart }
  OPTIONAL { ?dobj cpmeta:hasEndTime ?directEnd }
  OPTIONAL { ?acquisition prov:startedAtTime ?acqStart }
  OPTIONAL { ?acquisition prov:endedAtTime ?acqEnd }
}
"#,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub pid: ObjectId,
    pub iri: Iri,
    pub spec: Iri,
    pub rows: Option<u64>,
    pub file_name: String,
    pub citation: Option<String>,
    pub keywords: Vec<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub station: Iri,
    pub expocode: String,
}

impl DatasetRecord {
    pub fn from_row(row: &QueryRow) -> Option<Self> {
        let iri = row.iri("dobj")?;
        let pid = ObjectId::from_iri(&iri).ok()?;
        let file_name = row.text("fileName")?;
        Some(Self {
            pid,
            iri,
            spec: row.iri("spec")?,
            rows: row.count("rows"),
            citation: row.text("citation"),
            keywords: row
                .text("keywords")
                .map(|value| split_keywords(&value))
                .unwrap_or_default(),
            start_time: row
                .timestamp("directStart")
                .or_else(|| row.timestamp("acqStart")),
            end_time: row
                .timestamp("directEnd")
                .or_else(|| row.timestamp("acqEnd")),
            station: row.iri("station")?,
            expocode: expocode(&file_name).to_string(),
            file_name,
        })
    }
}

/// File name without a trailing `.csv`; unchanged when there is none.
pub fn expocode(file_name: &str) -> &str {
    file_name.strip_suffix(CSV_SUFFIX).unwrap_or(file_name)
}

fn split_keywords(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct DatasetQuery {
    objects: Vec<ObjectId>,
    object_base: Iri,
}

impl DatasetQuery {
    pub fn new(objects: Vec<ObjectId>, object_base: Iri) -> Result<Self, PortalError> {
        if objects.is_empty() {
            return Err(PortalError::EmptyObjectSet);
        }
        Ok(Self {
            objects,
            object_base,
        })
    }

    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    pub fn render(&self) -> Result<String, PortalError> {
        let iris = self
            .objects
            .iter()
            .map(|pid| pid.iri(&self.object_base))
            .collect::<Result<Vec<_>, PortalError>>()?;
        let bindings = Bindings::new().bind(VALUES, Binding::Values(iris));
        Ok(DATASET_TEMPLATE.render(&bindings))
    }

    /// At most one record per requested object, in request order.
    pub fn run<S: SparqlClient + ?Sized>(
        &self,
        client: &S,
    ) -> Result<Vec<DatasetRecord>, PortalError> {
        let rows = client.select(&self.render()?)?;
        let mut found: HashMap<ObjectId, DatasetRecord> = HashMap::new();
        for row in &rows {
            if let Some(record) = DatasetRecord::from_row(row) {
                found.entry(record.pid.clone()).or_insert(record);
            }
        }
        let mut records = Vec::with_capacity(found.len());
        for pid in &self.objects {
            if let Some(record) = found.remove(pid) {
                records.push(record);
            }
        }
        debug!(
            requested = self.objects.len(),
            found = records.len(),
            "dataset metadata assembled"
        );
        Ok(records)
    }
}
