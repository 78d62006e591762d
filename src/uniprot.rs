use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{CanonicalId, XrefDatabase};
use crate::error::ProbeError;

const SEARCH_URL: &str = "https://rest.uniprot.org/uniprotkb/search";
const GENE_ID_PROPERTY: &str = "GeneId";

pub trait IdentifierResolver {
    fn resolve(&self, symbol: &str) -> Option<CanonicalId>;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    database: XrefDatabase,
}

impl UniprotHttpClient {
    pub fn new(database: XrefDatabase) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("expression-probe/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ProbeError::UniprotHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ProbeError::UniprotHttp(err.to_string()))?;
        Ok(Self { client, database })
    }

    pub fn search(&self, symbol: &str) -> Result<Value, ProbeError> {
        let field = self.database.field_name();
        let response = self.send_with_retries(|| {
            self.client.get(SEARCH_URL).query(&[
                ("query", symbol),
                ("fields", field.as_str()),
                ("format", "json"),
                ("size", "1"),
            ])
        })?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| ProbeError::UniprotHttp(err.to_string()))
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, ProbeError>
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
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ProbeError::UniprotHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ProbeError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "UniProt request failed".to_string());
        Err(ProbeError::UniprotStatus { status, message })
    }
}

impl IdentifierResolver for UniprotHttpClient {
    fn resolve(&self, symbol: &str) -> Option<CanonicalId> {
        let raw = match self.search(symbol) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(symbol, error = %err, "identifier lookup failed");
                return None;
            }
        };
        let id = extract_gene_id(&raw, &self.database);
        match &id {
            Some(id) => debug!(symbol, gene_id = %id, "symbol resolved"),
            None => warn!(
                symbol,
                database = %self.database,
                "no {} gene id in search result",
                self.database
            ),
        }
        id
    }
}

/// Pulls the gene identifier out of a UniProt search response.
///
/// Only the first result is considered. Among its cross-references whose `database`
/// equals `database` exactly, the first one (in listed order) carrying a `GeneId`
/// property wins; the value is returned without its version suffix. Later candidates
/// and later `GeneId` properties are ignored.
pub fn extract_gene_id(raw: &Value, database: &XrefDatabase) -> Option<CanonicalId> {
    let xrefs = raw
        .get("results")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("uniProtKBCrossReferences"))
        .and_then(|v| v.as_array())?;

    xrefs
        .iter()
        .filter(|xref| xref.get("database").and_then(|v| v.as_str()) == Some(database.as_str()))
        .find_map(gene_id_property)
}

fn gene_id_property(xref: &Value) -> Option<CanonicalId> {
    xref.get("properties")
        .and_then(|v| v.as_array())?
        .iter()
        .find(|prop| prop.get("key").and_then(|v| v.as_str()) == Some(GENE_ID_PROPERTY))
        .and_then(|prop| prop.get("value"))
        .and_then(|v| v.as_str())
        .and_then(CanonicalId::new)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
