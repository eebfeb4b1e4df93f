use std::fs;
use std::path::Path;

use bio::io::fasta;
use serde::Serialize;

use crate::error::KiraError;
use crate::metadata::{MetadataRecord, fields};

const HEADER_PREVIEW: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FastaStatus {
    #[serde(rename = "OK")]
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastaSummary {
    pub accession: String,
    pub file_name: String,
    pub file_size_mb: Option<f64>,
    pub sequences: Option<u64>,
    pub header: Option<String>,
    pub status: FastaStatus,
}

impl FastaSummary {
    pub fn to_record(&self) -> MetadataRecord {
        let mut record = MetadataRecord::default();
        record.set(fields::ACCESSION, self.accession.as_str());
        self.enrich(&mut record);
        record.set("header", self.header.clone());
        record.set(
            "status",
            match self.status {
                FastaStatus::Ok => "OK",
                FastaStatus::Failed => "Failed",
            },
        );
        record
    }

    /// Adds file statistics to a resolved record without touching other fields.
    pub fn enrich(&self, record: &mut MetadataRecord) {
        record.set("file_name", self.file_name.as_str());
        if let Some(size) = self.file_size_mb {
            record.set("file_size_mb", size);
        }
        if let Some(count) = self.sequences {
            record.set("sequences", count);
        }
    }
}

/// Summary of one FASTA file. Unreadable files yield a `Failed` summary.
pub fn summarize_fasta(path: &Path) -> FastaSummary {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let accession = file_name
        .strip_suffix(".fasta")
        .or_else(|| file_name.strip_suffix(".fa"))
        .unwrap_or(&file_name)
        .to_string();

    match read_stats(path) {
        Ok((size, sequences, header)) => FastaSummary {
            accession,
            file_name,
            file_size_mb: Some((size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0),
            sequences: Some(sequences),
            header: Some(header),
            status: FastaStatus::Ok,
        },
        Err(_) => FastaSummary {
            accession,
            file_name,
            file_size_mb: None,
            sequences: None,
            header: None,
            status: FastaStatus::Failed,
        },
    }
}

/// Size in bytes, record count and the first record's header line.
fn read_stats(path: &Path) -> Result<(u64, u64, String), String> {
    let size = fs::metadata(path).map_err(|err| err.to_string())?.len();
    let reader = fasta::Reader::from_file(path).map_err(|err| err.to_string())?;
    let mut header = None;
    let mut sequences = 0u64;
    for record in reader.records() {
        let record = record.map_err(|err| err.to_string())?;
        if header.is_none() {
            let line = match record.desc() {
                Some(desc) => format!(">{} {desc}", record.id()),
                None => format!(">{}", record.id()),
            };
            header = Some(line.chars().take(HEADER_PREVIEW).collect::<String>());
        }
        sequences += 1;
    }
    Ok((size, sequences, header.unwrap_or_default()))
}

/// `*.fasta` and `*.fa` files directly under `dir`, sorted by file name.
pub fn inventory(dir: &Path) -> Result<Vec<FastaSummary>, KiraError> {
    let entries = fs::read_dir(dir)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", dir.display())))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| KiraError::Filesystem(err.to_string()))?
            .path();
        let is_fasta = path.is_file()
            && path
                .extension()
                .map(|ext| ext == "fasta" || ext == "fa")
                .unwrap_or(false);
        if is_fasta {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths.iter().map(|path| summarize_fasta(path)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_counts_records() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("CP012345.fasta");
        fs::write(&path, ">CP012345.1 Escherichia coli chromosome\nACGT\n>p1\nTT\n").unwrap();
        let summary = summarize_fasta(&path);
        assert_eq!(summary.accession, "CP012345");
        assert_eq!(summary.sequences, Some(2));
        assert_eq!(summary.status, FastaStatus::Ok);
        assert_eq!(
            summary.header.as_deref(),
            Some(">CP012345.1 Escherichia coli chromosome")
        );
    }

    #[test]
    fn empty_file_has_no_records() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("NC_2.fasta");
        fs::write(&path, "").unwrap();
        let summary = summarize_fasta(&path);
        assert_eq!(summary.status, FastaStatus::Ok);
        assert_eq!(summary.sequences, Some(0));
        assert_eq!(summary.header.as_deref(), Some(""));
    }

    #[test]
    fn text_without_record_marker_is_failed() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("NC_3.fasta");
        fs::write(&path, "Error: sequence not found\n").unwrap();
        let summary = summarize_fasta(&path);
        assert_eq!(summary.status, FastaStatus::Failed);
        assert_eq!(summary.sequences, None);
    }

    #[test]
    fn long_header_is_truncated() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("NC_4.fasta");
        let desc = "x".repeat(200);
        fs::write(&path, format!(">NC_4.1 {desc}\nACGT\n")).unwrap();
        let summary = summarize_fasta(&path);
        assert_eq!(summary.header.as_deref().map(|h| h.chars().count()), Some(80));
    }

    #[test]
    fn missing_file_is_failed_not_error() {
        let summary = summarize_fasta(Path::new("/nonexistent/NC_1.fa"));
        assert_eq!(summary.accession, "NC_1");
        assert_eq!(summary.status, FastaStatus::Failed);
        assert!(summary.to_record().get("file_size_mb").is_none());
    }

    #[test]
    fn inventory_lists_sorted_fasta_only() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("b.fa"), ">b\n").unwrap();
        fs::write(temp.path().join("a.fasta"), ">a\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "x").unwrap();
        let items = inventory(temp.path()).unwrap();
        let names: Vec<&str> = items.iter().map(|item| item.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.fasta", "b.fa"]);
    }
}
