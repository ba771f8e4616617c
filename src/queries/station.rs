//! Denormalized station metadata: people, platforms, instruments and sensors
//! that were active at a station during a date window.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::domain::{Iri, StationId};
use crate::error::PortalError;
use crate::sparql::{QueryRow, SparqlClient};
use crate::temporal::{DateWindow, Validity};
use crate::template::{Binding, Bindings, STATION, Template};

pub const ACADEMIC_INSTITUTION: &str =
    "http://meta.icos-cp.eu/ontologies/otcmeta/AcademicInstitution";
pub const COMMERCIAL_COMPANY: &str = "http://meta.icos-cp.eu/ontologies/otcmeta/CommercialCompany";

pub const STATION_TEMPLATE: Template = Template::new(
    r#"prefix otcmeta: <http://meta.icos-cp.eu/ontologies/otcmeta/>
prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#>
prefix skos: <http://www.w3.org/2004/02/skos/core#>

SELECT
  ?station ?stationName ?stationLabel ?responsibleOrg ?responsibleOrgName
  ?person ?affStart ?affEnd ?weight
  ?title ?firstName ?middleName ?lastName ?email ?orcid
  ?employer ?employerName ?employerType ?empStart ?empEnd
  ?platformDeployment ?pdStart ?pdEnd
  ?platform ?platformName ?platformCode ?schedule ?samplingMethod
  ?intakePosition ?exhaustPosition ?portOfCall ?platformOwner ?platformOwnerName
  ?instrumentDeployment ?idStart ?idEnd ?instrument
  ?instManufacturer ?instModel ?instSerial ?instDocComment ?instDocReference
  ?instSamplingFrequency ?instReportingFrequency ?instTaxonomy
  ?sensorDeployment ?sdStart ?sdEnd ?sensor
  ?sensManufacturer ?sensModel ?sensSerial ?sensDocComment ?sensDocReference
  ?sensSamplingFrequency ?sensReportingFrequency ?sensTaxonomy
  ?variable ?variableName ?variableMatch
WHERE {
  VALUES ?station { %%STATION%% }
  ?station otcmeta:hasName ?stationName ;
           rdfs:label ?stationLabel .
  OPTIONAL {
    ?station otcmeta:hasResponsibleOrganization ?responsibleOrg .
    ?responsibleOrg otcmeta:hasName ?responsibleOrgName .
  }

  ?affiliation a otcmeta:StationAffiliation ;
               otcmeta:atStation ?station ;
               otcmeta:hasHolder ?person .
  OPTIONAL { ?affiliation otcmeta:hasStartTime ?affStart }
  OPTIONAL { ?affiliation otcmeta:hasEndTime ?affEnd }
  OPTIONAL { ?affiliation otcmeta:hasAttributionWeight ?weight }
  FILTER(!BOUND(?affStart) || ?affStart <= %%END_DATE%%)
  FILTER(!BOUND(?affEnd) || ?affEnd >= %%START_DATE%%)

  ?person otcmeta:hasFirstName ?firstName ;
          otcmeta:hasLastName ?lastName .
  OPTIONAL { ?person otcmeta:hasTitle ?title }
  OPTIONAL { ?person otcmeta:hasMiddleName ?middleName }
  OPTIONAL { ?person otcmeta:hasEmail ?email }
  OPTIONAL { ?person otcmeta:hasOrcidId ?orcid }

  OPTIONAL {
    VALUES ?employerType { otcmeta:AcademicInstitution otcmeta:CommercialCompany }
    ?employment a otcmeta:Employment ;
                otcmeta:hasHolder ?person ;
                otcmeta:atOrganization ?employer .
    ?employer a ?employerType ;
              otcmeta:hasName ?employerName .
    OPTIONAL { ?employment otcmeta:hasStartTime ?empStart }
    OPTIONAL { ?employment otcmeta:hasEndTime ?empEnd }
    FILTER(!BOUND(?empStart) || ?empStart <= %%END_DATE%%)
    FILTER(!BOUND(?empEnd) || ?empEnd >= %%START_DATE%%)
  }

  ?platformDeployment a otcmeta:PlatformDeployment ;
                      otcmeta:toStation ?station ;
                      otcmeta:ofPlatform ?platform .
  OPTIONAL { ?platformDeployment otcmeta:hasStartTime ?pdStart }
  OPTIONAL { ?platformDeployment otcmeta:hasEndTime ?pdEnd }
  FILTER(!BOUND(?pdStart) || ?pdStart <= %%END_DATE%%)
  FILTER(!BOUND(?pdEnd) || ?pdEnd >= %%START_DATE%%)

  ?platform otcmeta:hasName ?platformName ;
            otcmeta:hasPlatformCode ?platformCode .
  OPTIONAL { ?platform otcmeta:hasSchedule ?schedule }
  OPTIONAL { ?platform otcmeta:hasSamplingMethod ?samplingMethod }
  OPTIONAL { ?platform otcmeta:hasIntakePosition ?intakePosition }
  OPTIONAL { ?platform otcmeta:hasExhaustPosition ?exhaustPosition }
  OPTIONAL { ?platform otcmeta:hasPortOfCall ?portOfCall }
  OPTIONAL {
    ?platform otcmeta:hasOwner ?platformOwner .
    ?platformOwner otcmeta:hasName ?platformOwnerName .
  }

  ?instrumentDeployment a otcmeta:InstrumentDeployment ;
                        otcmeta:toPlatform ?platform ;
                        otcmeta:ofInstrument ?instrument .
  OPTIONAL { ?instrumentDeployment otcmeta:hasStartTime ?idStart }
  OPTIONAL { ?instrumentDeployment otcmeta:hasEndTime ?idEnd }
  FILTER(!BOUND(?idStart) || ?idStart <= %%END_DATE%%)
  FILTER(!BOUND(?idEnd) || ?idEnd >= %%START_DATE%%)

  ?instrument otcmeta:hasDevice ?instDevice .
  ?instDevice otcmeta:hasManufacturer ?instManufacturer ;
              otcmeta:hasModelName ?instModel .
  OPTIONAL { ?instDevice otcmeta:hasSerialNumber ?instSerial }
  OPTIONAL { ?instDevice otcmeta:hasDocumentationComment ?instDocComment }
  OPTIONAL { ?instDevice otcmeta:hasDocumentationReference ?instDocReference }
  OPTIONAL { ?instDevice otcmeta:hasSamplingFrequency ?instSamplingFrequency }
  OPTIONAL { ?instDevice otcmeta:hasReportingFrequency ?instReportingFrequency }
  OPTIONAL { ?instDevice skos:exactMatch ?instTaxonomy }

  OPTIONAL {
    ?sensorDeployment a otcmeta:SensorDeployment ;
                      otcmeta:toInstrument ?instrument ;
                      otcmeta:ofSensor ?sensor .
    OPTIONAL { ?sensorDeployment otcmeta:hasStartTime ?sdStart }
    OPTIONAL { ?sensorDeployment otcmeta:hasEndTime ?sdEnd }
    FILTER(!BOUND(?sdStart) || ?sdStart <= %%END_DATE%%)
    FILTER(!BOUND(?sdEnd) || ?sdEnd >= %%START_DATE%%)

    ?sensor otcmeta:hasDevice ?sensDevice .
    ?sensDevice otcmeta:hasManufacturer ?sensManufacturer ;
                otcmeta:hasModelName ?sensModel .
    OPTIONAL { ?sensDevice otcmeta:hasSerialNumber ?sensSerial }
    OPTIONAL { ?sensDevice otcmeta:hasDocumentationComment ?sensDocComment }
    OPTIONAL { ?sensDevice otcmeta:hasDocumentationReference ?sensDocReference }
    OPTIONAL { ?sensDevice otcmeta:hasSamplingFrequency ?sensSamplingFrequency }
    OPTIONAL { ?sensDevice otcmeta:hasReportingFrequency ?sensReportingFrequency }
    OPTIONAL { ?sensDevice skos:exactMatch ?sensTaxonomy }
    OPTIONAL {
      ?sensor otcmeta:measures ?variable .
      ?variable otcmeta:hasName ?variableName .
      OPTIONAL { ?variable skos:exactMatch ?variableMatch }
    }
  }
}
ORDER BY DESC(COALESCE(?weight, 0))
"#,
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organization {
    pub id: Iri,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationInfo {
    pub id: Iri,
    pub name: String,
    pub label: String,
    pub responsible_organization: Option<Organization>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonInfo {
    pub id: Iri,
    pub title: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Validity,
    /// Attribution weight as stored; `None` sorts as 0.
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Employment {
    pub organization: Organization,
    pub organization_type: Iri,
    pub validity: Validity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformInfo {
    pub deployment: Iri,
    pub validity: Validity,
    pub id: Iri,
    pub name: String,
    pub code: String,
    pub schedule: Option<String>,
    pub sampling_method: Option<String>,
    pub intake_position: Option<String>,
    pub exhaust_position: Option<String>,
    pub port_of_call: Option<String>,
    pub owner: Option<Organization>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub documentation_comment: Option<String>,
    pub documentation_reference: Option<String>,
    pub sampling_frequency: Option<String>,
    pub reporting_frequency: Option<String>,
    pub taxonomy: Option<Iri>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentInfo {
    pub deployment: Iri,
    pub validity: Validity,
    pub id: Iri,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub id: Iri,
    pub name: String,
    pub taxonomy_match: Option<Iri>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorInfo {
    pub deployment: Iri,
    pub validity: Validity,
    pub id: Iri,
    pub device: DeviceInfo,
    pub variable: Option<VariableInfo>,
}

/// One (person, employer, platform, instrument, sensor) combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRow {
    pub station: StationInfo,
    pub person: PersonInfo,
    pub employment: Option<Employment>,
    pub platform: PlatformInfo,
    pub instrument: InstrumentInfo,
    pub sensor: Option<SensorInfo>,
}

impl StationRow {
    /// Reads a solution; `None` when a required binding is missing.
    pub fn from_row(row: &QueryRow) -> Option<Self> {
        let station = StationInfo {
            id: row.iri("station")?,
            name: row.text("stationName")?,
            label: row.text("stationLabel")?,
            responsible_organization: organization(row, "responsibleOrg", "responsibleOrgName"),
        };

        let person = PersonInfo {
            id: row.iri("person")?,
            title: row.text("title"),
            first_name: row.text("firstName")?,
            middle_name: row.text("middleName"),
            last_name: row.text("lastName")?,
            email: row.text("email"),
            orcid: row.text("orcid"),
            affiliation: validity(row, "affStart", "affEnd"),
            weight: row.number("weight"),
        };

        let employment = organization(row, "employer", "employerName").and_then(|org| {
            Some(Employment {
                organization: org,
                organization_type: row.iri("employerType")?,
                validity: validity(row, "empStart", "empEnd"),
            })
        });

        let platform = PlatformInfo {
            deployment: row.iri("platformDeployment")?,
            validity: validity(row, "pdStart", "pdEnd"),
            id: row.iri("platform")?,
            name: row.text("platformName")?,
            code: row.text("platformCode")?,
            schedule: row.text("schedule"),
            sampling_method: row.text("samplingMethod"),
            intake_position: row.text("intakePosition"),
            exhaust_position: row.text("exhaustPosition"),
            port_of_call: row.text("portOfCall"),
            owner: organization(row, "platformOwner", "platformOwnerName"),
        };

        let instrument = InstrumentInfo {
            deployment: row.iri("instrumentDeployment")?,
            validity: validity(row, "idStart", "idEnd"),
            id: row.iri("instrument")?,
            device: device(row, "inst")?,
        };

        let sensor = sensor(row);

        Some(Self {
            station,
            person,
            employment,
            platform,
            instrument,
            sensor,
        })
    }

    pub fn weight_for_ordering(&self) -> f64 {
        self.person
            .weight
            .filter(|weight| weight.is_finite())
            .unwrap_or(0.0)
    }

    fn group_key(&self) -> (&Iri, &Iri, &Iri, &Iri) {
        (
            &self.station.id,
            &self.person.id,
            &self.platform.deployment,
            &self.instrument.deployment,
        )
    }

    /// True when `other` is this row with some optional branches unset.
    fn covers(&self, other: &StationRow) -> bool {
        self != other
            && self.station == other.station
            && self.person == other.person
            && self.platform == other.platform
            && self.instrument == other.instrument
            && (other.employment.is_none() || other.employment == self.employment)
            && (other.sensor.is_none() || other.sensor == self.sensor)
    }
}

fn organization(row: &QueryRow, id: &str, name: &str) -> Option<Organization> {
    Some(Organization {
        id: row.iri(id)?,
        name: row.text(name)?,
    })
}

fn validity(row: &QueryRow, start: &str, end: &str) -> Validity {
    Validity::new(row.timestamp(start), row.timestamp(end))
}

fn device(row: &QueryRow, prefix: &str) -> Option<DeviceInfo> {
    let var = |name: &str| format!("{prefix}{name}");
    Some(DeviceInfo {
        manufacturer: row.text(&var("Manufacturer"))?,
        model: row.text(&var("Model"))?,
        serial_number: row.text(&var("Serial")),
        documentation_comment: row.text(&var("DocComment")),
        documentation_reference: row.text(&var("DocReference")),
        sampling_frequency: row.text(&var("SamplingFrequency")),
        reporting_frequency: row.text(&var("ReportingFrequency")),
        taxonomy: row.iri(&var("Taxonomy")),
    })
}

fn sensor(row: &QueryRow) -> Option<SensorInfo> {
    let variable = row.iri("variable").and_then(|id| {
        Some(VariableInfo {
            id,
            name: row.text("variableName")?,
            taxonomy_match: row.iri("variableMatch"),
        })
    });
    Some(SensorInfo {
        deployment: row.iri("sensorDeployment")?,
        validity: validity(row, "sdStart", "sdEnd"),
        id: row.iri("sensor")?,
        device: device(row, "sens")?,
        variable,
    })
}

pub fn is_employer_type(iri: &Iri) -> bool {
    matches!(iri.as_str(), ACADEMIC_INSTITUTION | COMMERCIAL_COMPANY)
}

#[derive(Debug, Clone)]
pub struct StationQuery {
    pub station: StationId,
    pub window: DateWindow,
}

impl StationQuery {
    pub fn new(station: StationId, window: DateWindow) -> Self {
        Self { station, window }
    }

    pub fn render(&self) -> String {
        let bindings = Bindings::new()
            .bind(STATION, Binding::Iri(self.station.iri().clone()))
            .window(&self.window);
        STATION_TEMPLATE.render(&bindings)
    }

    pub fn run<S: SparqlClient + ?Sized>(
        &self,
        client: &S,
    ) -> Result<Vec<StationRow>, PortalError> {
        let rows = client.select(&self.render())?;
        let assembled = assemble(&rows, &self.window);
        debug!(
            station = %self.station,
            window = %self.window,
            solutions = rows.len(),
            rows = assembled.len(),
            "station metadata assembled"
        );
        Ok(assembled)
    }
}

/// Applies the window and employer-type rules to raw solutions, flattens,
/// de-duplicates and orders by descending attribution weight.
pub fn assemble(rows: &[QueryRow], window: &DateWindow) -> Vec<StationRow> {
    let mut candidates = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(mut candidate) = StationRow::from_row(row) else {
            continue;
        };
        let required_in_window = candidate.person.affiliation.overlaps(window)
            && candidate.platform.validity.overlaps(window)
            && candidate.instrument.validity.overlaps(window);
        if !required_in_window {
            continue;
        }
        let employment_ok = candidate.employment.as_ref().is_some_and(|employment| {
            is_employer_type(&employment.organization_type)
                && employment.validity.overlaps(window)
        });
        if !employment_ok {
            candidate.employment = None;
        }
        if candidate
            .sensor
            .as_ref()
            .is_some_and(|sensor| !sensor.validity.overlaps(window))
        {
            candidate.sensor = None;
        }
        candidates.push(candidate);
    }

    // Repeats and covered rows can only share a station/person/platform/instrument key.
    let mut groups: HashMap<_, Vec<usize>> = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        groups.entry(candidate.group_key()).or_default().push(index);
    }

    let mut assembled: Vec<StationRow> = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let group = groups
            .get(&candidate.group_key())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let repeated = group
            .iter()
            .take_while(|&&other| other < index)
            .any(|&other| candidates[other] == *candidate);
        let covered = group
            .iter()
            .any(|&other| candidates[other].covers(candidate));
        if !repeated && !covered {
            assembled.push(candidate.clone());
        }
    }

    assembled.sort_by(|a, b| b.weight_for_ordering().total_cmp(&a.weight_for_ordering()));
    assembled
}
