use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::domain::Iri;
use crate::error::PortalError;
use crate::temporal::parse_timestamp;

pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// An RDF term as it appears in a SPARQL JSON result binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    Uri {
        value: String,
    },
    #[serde(alias = "typed-literal")]
    Literal {
        value: String,
        #[serde(default)]
        datatype: Option<String>,
        #[serde(default, rename = "xml:lang")]
        lang: Option<String>,
    },
    Bnode {
        value: String,
    },
}

impl Term {
    pub fn value(&self) -> &str {
        match self {
            Term::Uri { value } | Term::Literal { value, .. } | Term::Bnode { value } => value,
        }
    }
}

/// One solution: variable name to bound term. Unbound variables are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct QueryRow {
    terms: HashMap<String, Term>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iri(mut self, name: &str, value: &str) -> Self {
        self.terms.insert(
            name.to_string(),
            Term::Uri {
                value: value.to_string(),
            },
        );
        self
    }

    pub fn with_literal(mut self, name: &str, value: &str) -> Self {
        self.terms.insert(
            name.to_string(),
            Term::Literal {
                value: value.to_string(),
                datatype: None,
                lang: None,
            },
        );
        self
    }

    pub fn term(&self, name: &str) -> Option<&Term> {
        self.terms.get(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.terms.contains_key(name)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.term(name).map(|term| term.value().to_string())
    }

    pub fn iri(&self, name: &str) -> Option<Iri> {
        match self.term(name)? {
            Term::Uri { value } => value.parse().ok(),
            _ => None,
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.term(name).and_then(|term| parse_timestamp(term.value()))
    }

    /// Finite numeric value; `NaN` and infinities read as unbound.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.term(name)
            .and_then(|term| term.value().trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        self.term(name)
            .and_then(|term| term.value().trim().parse::<u64>().ok())
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<QueryRow>,
}

/// Parses a `application/sparql-results+json` SELECT response.
pub fn parse_results(body: &str) -> Result<Vec<QueryRow>, PortalError> {
    let parsed: SparqlResults =
        serde_json::from_str(body).map_err(|err| PortalError::SparqlResults(err.to_string()))?;
    Ok(parsed.results.bindings)
}

pub trait SparqlClient: Send + Sync {
    fn select(&self, query: &str) -> Result<Vec<QueryRow>, PortalError>;
}

#[derive(Clone)]
pub struct SparqlHttpClient {
    client: Client,
    endpoint: Iri,
}

impl SparqlHttpClient {
    pub fn new(endpoint: Iri, timeout: Duration) -> Result<Self, PortalError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cp-retriever/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PortalError::SparqlHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(SPARQL_RESULTS_JSON));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PortalError::SparqlHttp(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Iri {
        &self.endpoint
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, PortalError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "SPARQL request failed".to_string());
        Err(PortalError::SparqlStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, PortalError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(PortalError::SparqlHttp(err.to_string()));
                }
            }
        }
    }
}

impl SparqlClient for SparqlHttpClient {
    fn select(&self, query: &str) -> Result<Vec<QueryRow>, PortalError> {
        debug!(endpoint = %self.endpoint, "SPARQL query:\n{query}");
        let response = self.send_with_retries(|| {
            self.client
                .post(self.endpoint.as_str())
                .form(&[("query", query)])
        })?;
        let response = Self::handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| PortalError::SparqlHttp(err.to_string()))?;
        let rows = parse_results(&body)?;
        debug!(rows = rows.len(), "SPARQL query returned");
        Ok(rows)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
