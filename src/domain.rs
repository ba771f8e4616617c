use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortalError;

pub const DEFAULT_STATION_BASE: &str = "http://meta.icos-cp.eu/resources/stations/";
pub const DEFAULT_OBJECT_BASE: &str = "https://meta.icos-cp.eu/objects/";

const MAX_PID_LEN: usize = 128;

/// An absolute IRI that is safe to place between `<` and `>` in a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri(String);

impl Iri {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a local name, inserting `/` unless the base already ends in a separator.
    pub fn join(&self, local: &str) -> Result<Iri, PortalError> {
        let joined = if self.0.ends_with('/') || self.0.ends_with('#') {
            format!("{}{}", self.0, local)
        } else {
            format!("{}/{}", self.0, local)
        };
        joined.parse()
    }

    /// The segment after the last `/` or `#`.
    pub fn local_name(&self) -> &str {
        self.0
            .rsplit(['/', '#'])
            .next()
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Iri {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let has_scheme = value
            .split_once(':')
            .map(|(scheme, rest)| {
                !scheme.is_empty()
                    && !rest.is_empty()
                    && scheme
                        .chars()
                        .next()
                        .map(|ch| ch.is_ascii_alphabetic())
                        .unwrap_or(false)
                    && scheme
                        .chars()
                        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
            })
            .unwrap_or(false);
        let has_forbidden = value.chars().any(|ch| {
            ch.is_whitespace()
                || ch.is_control()
                || matches!(ch, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
        });
        if !has_scheme || has_forbidden {
            return Err(PortalError::InvalidIri(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for Iri {
    type Error = PortalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Iri> for String {
    fn from(value: Iri) -> Self {
        value.0
    }
}

/// A station, always held as its full IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationId(Iri);

impl StationId {
    /// Accepts either an absolute IRI or a short station code resolved against `base`.
    pub fn resolve(value: &str, base: &Iri) -> Result<Self, PortalError> {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let iri = trimmed
                .parse()
                .map_err(|_| PortalError::InvalidStationId(value.to_string()))?;
            return Ok(Self(iri));
        }
        let is_valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if !is_valid {
            return Err(PortalError::InvalidStationId(value.to_string()));
        }
        let iri = base
            .join(trimmed)
            .map_err(|_| PortalError::InvalidStationId(value.to_string()))?;
        Ok(Self(iri))
    }

    pub fn iri(&self) -> &Iri {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StationId {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let base = Iri(DEFAULT_STATION_BASE.to_string());
        Self::resolve(value, &base)
    }
}

/// PID of a data object: the last segment of its landing-page IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn iri(&self, base: &Iri) -> Result<Iri, PortalError> {
        base.join(&self.0)
    }

    pub fn from_iri(iri: &Iri) -> Result<Self, PortalError> {
        iri.local_name().parse()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let is_valid = !value.is_empty()
            && value.len() <= MAX_PID_LEN
            && value
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'));
        if !is_valid {
            return Err(PortalError::InvalidPid(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for ObjectId {
    type Error = PortalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(value: ObjectId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn iri_rejects_injection() {
        let err = "http://example.org/a> } DROP ALL {".parse::<Iri>().unwrap_err();
        assert_matches!(err, PortalError::InvalidIri(_));
        assert!("not an iri".parse::<Iri>().is_err());
    }

    #[test]
    fn iri_join_and_local_name() {
        let base: Iri = "https://meta.icos-cp.eu/objects".parse().unwrap();
        let joined = base.join("abc").unwrap();
        assert_eq!(joined.as_str(), "https://meta.icos-cp.eu/objects/abc");
        assert_eq!(joined.local_name(), "abc");
    }

    #[test]
    fn station_short_code_uses_default_base() {
        let station: StationId = "S1".parse().unwrap();
        assert_eq!(
            station.as_str(),
            "http://meta.icos-cp.eu/resources/stations/S1"
        );
    }
}
