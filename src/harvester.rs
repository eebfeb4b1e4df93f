//! Client for the external metadata harvester service.
//!
//! Wire contract: `GET {base}/health` answers 2xx when the service is up;
//! `POST {base}/metadata` with `{"accessions": [...]}` answers
//! `{"records": [{...}], "errors": [{"accession": "...", "message": "..."}]}`.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::AccessionId;
use crate::error::KiraError;
use crate::metadata::MetadataRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestError {
    pub accession: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct HarvestResponse {
    pub records: Vec<MetadataRecord>,
    pub errors: Vec<HarvestError>,
}

pub trait HarvesterClient: Send + Sync {
    fn service_url(&self) -> &str;
    fn is_reachable(&self, timeout: Duration) -> bool;
    /// One call for the whole accession set. `Err` means the call as a whole
    /// failed; per-accession problems come back in `HarvestResponse::errors`.
    fn fetch(&self, accessions: &[AccessionId]) -> Result<HarvestResponse, KiraError>;
}

#[derive(Clone)]
pub struct HarvesterHttpClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct HarvestRequest<'a> {
    accessions: Vec<&'a str>,
}

#[derive(Deserialize)]
struct RawHarvestResponse {
    #[serde(default)]
    records: Vec<Value>,
    #[serde(default)]
    errors: Vec<HarvestError>,
}

impl HarvesterHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gr/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::HarvesterHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::HarvesterHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl HarvesterClient for HarvesterHttpClient {
    fn service_url(&self) -> &str {
        &self.base_url
    }

    fn is_reachable(&self, timeout: Duration) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .timeout(timeout)
            .send()
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    fn fetch(&self, accessions: &[AccessionId]) -> Result<HarvestResponse, KiraError> {
        let request = HarvestRequest {
            accessions: accessions.iter().map(|acc| acc.as_str()).collect(),
        };
        let response = self
            .client
            .post(format!("{}/metadata", self.base_url))
            .json(&request)
            .send()
            .map_err(|err| KiraError::HarvesterHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "harvester request failed".to_string());
            return Err(KiraError::HarvesterStatus { status, message });
        }
        let raw: Value = response
            .json()
            .map_err(|err| KiraError::HarvesterPayload(err.to_string()))?;
        parse_harvest_response(raw)
    }
}

pub fn parse_harvest_response(raw: Value) -> Result<HarvestResponse, KiraError> {
    let raw: RawHarvestResponse = serde_json::from_value(raw)
        .map_err(|err| KiraError::HarvesterPayload(err.to_string()))?;
    let records = raw
        .records
        .into_iter()
        .map(|value| {
            MetadataRecord::from_json(value)
                .ok_or_else(|| KiraError::HarvesterPayload("record is not an object".to_string()))
        })
        .collect::<Result<Vec<_>, KiraError>>()?;
    Ok(HarvestResponse {
        records,
        errors: raw.errors,
    })
}
