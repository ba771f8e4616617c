use std::collections::BTreeSet;

use tracing::debug;

use crate::domain::{Iri, ObjectId};
use crate::error::PortalError;
use crate::sparql::SparqlClient;
use crate::template::{Binding, Bindings, Template, VALUES};

pub const DEFAULT_OBJECT_SPECS: [&str; 2] = [
    "http://meta.icos-cp.eu/resources/cpmeta/icosOtcL2Product",
    "http://meta.icos-cp.eu/resources/cpmeta/icosOtcFosL2Product",
];

pub const CATALOG_TEMPLATE: Template = Template::new(
    r#"prefix cpmeta: <http://meta.icos-cp.eu/ontologies/cpmeta/>

SELECT ?dobj WHERE {
  VALUES ?spec { %%VALUES%% }
  ?dobj cpmeta:hasObjectSpec ?spec .
}
"#,
);

/// PIDs of every data object with one of `specs`, sorted and unique.
pub fn list_data_objects<S: SparqlClient + ?Sized>(
    client: &S,
    specs: &[Iri],
) -> Result<Vec<ObjectId>, PortalError> {
    if specs.is_empty() {
        return Ok(Vec::new());
    }
    let bindings = Bindings::new().bind(VALUES, Binding::Values(specs.to_vec()));
    let rows = client.select(&CATALOG_TEMPLATE.render(&bindings))?;
    let pids = rows
        .iter()
        .filter_map(|row| row.iri("dobj"))
        .filter_map(|iri| ObjectId::from_iri(&iri).ok())
        .collect::<BTreeSet<_>>();
    debug!(objects = pids.len(), "collected data object ids");
    Ok(pids.into_iter().collect())
}
