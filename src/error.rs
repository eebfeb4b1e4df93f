use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid accession: {0}")]
    InvalidAccession(String),

    #[error("invalid genome type: {0}")]
    InvalidGenomeType(String),

    #[error("failed to read accession list at {path}: {message}")]
    AccessionListRead { path: PathBuf, message: String },

    #[error("destination is not writable: {path}: {message}")]
    DestinationNotWritable { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("NCBI returned an unexpected payload: {0}")]
    NcbiPayload(String),

    #[error("harvester request failed: {0}")]
    HarvesterHttp(String),

    #[error("harvester returned status {status}: {message}")]
    HarvesterStatus { status: u16, message: String },

    #[error("harvester returned a malformed response: {0}")]
    HarvesterPayload(String),

    #[error("failed to parse annotation file {path}: {message}")]
    AnnotationParse { path: PathBuf, message: String },

    #[error("failed to serialize metadata: {0}")]
    Serialization(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
