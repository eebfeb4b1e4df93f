use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::warn;

use crate::domain::AccessionId;
use crate::error::KiraError;
use crate::metadata::{FieldValue, MetadataRecord, fields};

/// E-utilities accepts up to a few hundred ids per esummary call.
pub const ESUMMARY_CHUNK: usize = 200;

#[derive(Debug, Clone)]
pub struct DownloadInfo {
    pub path: PathBuf,
    pub bytes: u64,
}

pub trait NcbiClient: Send + Sync {
    /// Writes `<destination>/<accession>.fasta`.
    fn download_sequence(
        &self,
        accession: &AccessionId,
        destination: &Path,
    ) -> Result<DownloadInfo, KiraError>;

    /// Direct nucleotide summary lookup. Partial results are fine; an error
    /// means nothing at all could be fetched.
    fn fetch_metadata_batch(
        &self,
        accessions: &[AccessionId],
    ) -> Result<Vec<MetadataRecord>, KiraError>;
}

#[derive(Clone)]
pub struct NcbiHttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NcbiHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gr/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::NcbiHttp(err.to_string()))?,
        );

        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            api_key,
        })
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "nuccore".to_string()),
            ("tool", "kira-gr".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "NCBI request failed".to_string());
        Err(KiraError::NcbiStatus { status, message })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, KiraError>
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
                    return Err(KiraError::NcbiHttp(err.to_string()));
                }
            }
        }
    }

    fn fetch_summary_chunk(&self, chunk: &[AccessionId]) -> Result<Vec<MetadataRecord>, KiraError> {
        let url = format!("{}/esummary.fcgi", self.base_url);
        let ids = chunk
            .iter()
            .map(|acc| acc.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let mut params = self.common_params();
        params.push(("id", ids));
        params.push(("retmode", "json".to_string()));

        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        let response = Self::handle_status(response)?;
        let raw: Value = response
            .json()
            .map_err(|err| KiraError::NcbiPayload(err.to_string()))?;
        parse_esummary(&raw)
    }
}

impl NcbiClient for NcbiHttpClient {
    fn download_sequence(
        &self,
        accession: &AccessionId,
        destination: &Path,
    ) -> Result<DownloadInfo, KiraError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let mut params = self.common_params();
        params.push(("id", accession.as_str().to_string()));
        params.push(("rettype", "fasta".to_string()));
        params.push(("retmode", "text".to_string()));

        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        let mut response = Self::handle_status(response)?;
        let mut body = Vec::new();
        response
            .read_to_end(&mut body)
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))?;
        if !body.starts_with(b">") {
            let preview = String::from_utf8_lossy(&body[..body.len().min(120)]).to_string();
            return Err(KiraError::NcbiPayload(format!(
                "{} did not return FASTA: {}",
                accession,
                preview.trim()
            )));
        }

        let target = destination.join(format!("{}.fasta", accession.as_str()));
        let mut temp = tempfile::Builder::new()
            .prefix("kira-gr-fasta")
            .tempfile_in(destination)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.write_all(&body)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(&target)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;

        Ok(DownloadInfo {
            path: target,
            bytes: body.len() as u64,
        })
    }

    fn fetch_metadata_batch(
        &self,
        accessions: &[AccessionId],
    ) -> Result<Vec<MetadataRecord>, KiraError> {
        let mut records = Vec::new();
        let mut last_error = None;
        for chunk in accessions.chunks(ESUMMARY_CHUNK) {
            match self.fetch_summary_chunk(chunk) {
                Ok(mut fetched) => records.append(&mut fetched),
                Err(err) => {
                    warn!(ids = chunk.len(), error = %err, "esummary chunk failed");
                    last_error = Some(err);
                }
            }
        }
        match last_error {
            Some(err) if records.is_empty() && !accessions.is_empty() => Err(err),
            _ => Ok(records),
        }
    }
}

/// Maps an esummary (db=nuccore, retmode=json) document to records.
pub fn parse_esummary(raw: &Value) -> Result<Vec<MetadataRecord>, KiraError> {
    let result = raw
        .get("result")
        .ok_or_else(|| KiraError::NcbiPayload("missing result object".to_string()))?;
    let uids = result
        .get("uids")
        .and_then(|value| value.as_array())
        .ok_or_else(|| KiraError::NcbiPayload("missing uids list".to_string()))?;

    let mut records = Vec::new();
    for uid in uids.iter().filter_map(|value| value.as_str()) {
        let Some(doc) = result.get(uid) else {
            continue;
        };
        if doc.get("error").is_some() {
            continue;
        }
        records.push(summary_to_record(doc));
    }
    Ok(records)
}

fn summary_to_record(doc: &Value) -> MetadataRecord {
    let text = |key: &str| {
        doc.get(key)
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let mut record = MetadataRecord::default();
    let accession = text("accessionversion").or_else(|| text("caption"));
    record.set(fields::ACCESSION, accession.clone());
    record.set(fields::GENOME_ID, text("caption").or(accession));
    record.set(fields::TITLE, text("title"));
    record.set(fields::ORGANISM, text("organism"));
    record.set(fields::STRAIN, text("strain"));
    record.set(fields::BIOSAMPLE, text("biosample"));
    record.set("completeness", text("completeness"));
    record.set("create_date", text("createdate"));
    if let Some(taxid) = doc.get("taxid").and_then(|value| value.as_u64()) {
        record.set("taxid", taxid);
    }
    if let Some(length) = doc.get("slen").and_then(|value| value.as_u64()) {
        record.set("sequence_length", length);
    }

    let qualifiers = parse_subtype_pairs(
        text("subtype").as_deref().unwrap_or_default(),
        text("subname").as_deref().unwrap_or_default(),
    );
    let mut extra = BTreeMap::new();
    for (key, value) in qualifiers {
        match key.as_str() {
            "country" | "geo_loc_name" => record.set_if_absent(fields::COUNTRY, value),
            "host" => record.set_if_absent(fields::HOST, value),
            "isolation_source" => record.set_if_absent(fields::ISOLATION_SOURCE, value),
            "collection_date" => record.set_if_absent(fields::COLLECTION_DATE, value),
            "strain" => record.set_if_absent(fields::STRAIN, value),
            _ => {
                extra.insert(key, FieldValue::Text(value));
            }
        }
    }
    if !extra.is_empty() {
        record.set("source_qualifiers", FieldValue::Record(extra));
    }
    record.set(fields::METADATA_SOURCE, "ncbi");
    record.derive_taxonomy();
    record
}

/// Zips the pipe-separated `subtype` keys with their `subname` values.
pub fn parse_subtype_pairs(subtype: &str, subname: &str) -> Vec<(String, String)> {
    if subtype.trim().is_empty() {
        return Vec::new();
    }
    subtype
        .split('|')
        .zip(subname.split('|'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .collect()
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
