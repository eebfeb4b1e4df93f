use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::warn;

use crate::classify::classify_by_pattern;
use crate::config::ResolvedConfig;
use crate::domain::{AccessionId, GenomeType};
use crate::download::{BatchReport, DownloadOrchestrator, DownloadOutcome, ensure_destination};
use crate::error::KiraError;
use crate::fasta::{FastaStatus, summarize_fasta};
use crate::filter::TypeFilter;
use crate::harvester::HarvesterClient;
use crate::metadata::{FieldValue, MetadataRecord, fields};
use crate::ncbi::NcbiClient;
use crate::resolver::{
    HarvesterStage, LocalAnnotationStage, MetadataResolver, NcbiStage, Resolution,
    ResolutionEvent,
};
use crate::serialize::{PRIORITY_COLUMNS, write_metadata_file};

pub const METADATA_BASENAME: &str = "accession_metadata";

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct FilteredAccession {
    pub accession: AccessionId,
    pub genome_type: GenomeType,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub requested: usize,
    pub considered: usize,
    pub filtered_out: Vec<FilteredAccession>,
    pub downloaded: usize,
    pub failed: Vec<DownloadOutcome>,
    pub batches: Vec<BatchReport>,
    pub resolved: usize,
    pub unresolved: Vec<AccessionId>,
    pub metadata_events: Vec<ResolutionEvent>,
    pub metadata_path: Utf8PathBuf,
    pub metadata_shell: bool,
    pub elapsed_ms: u128,
}

#[derive(Clone)]
pub struct App<N: NcbiClient, H: HarvesterClient> {
    ncbi: N,
    harvester: Option<H>,
}

impl<N: NcbiClient, H: HarvesterClient> App<N, H> {
    pub fn new(ncbi: N, harvester: Option<H>) -> Self {
        Self { ncbi, harvester }
    }

    pub fn ncbi(&self) -> &N {
        &self.ncbi
    }

    /// Reads the list, filters, downloads, resolves metadata and writes the
    /// metadata artifact. Only an unreadable list or an unwritable
    /// destination abort the run.
    pub fn run(
        &self,
        input: &Utf8Path,
        destination: &Utf8Path,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, KiraError> {
        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        sink.event(ProgressEvent {
            message: format!("phase=Read; {input}"),
            elapsed: None,
        });
        let mut accessions = read_accession_list(input)?;
        let requested = accessions.len();
        if let Some(limit) = config.max_genomes.filter(|limit| *limit > 0) {
            accessions.truncate(limit);
        }
        let considered = accessions.len();
        ensure_destination(destination.as_std_path())?;

        let resolver = self.resolver(config, destination);
        let (accessions, filtered_out, mut prefetched) =
            self.prefilter(&accessions, config, &resolver, sink);

        sink.event(ProgressEvent {
            message: format!(
                "phase=Download; {} accessions with {} workers",
                accessions.len(),
                config.workers
            ),
            elapsed: None,
        });
        let orchestrator = DownloadOrchestrator::new(config.workers).with_pacing(config.pacing);
        let summary = orchestrator.run(
            &self.ncbi,
            &accessions,
            destination.as_std_path(),
            sink,
        );
        let downloaded: BTreeSet<AccessionId> = summary.succeeded_accessions().into_iter().collect();
        let ordered: Vec<AccessionId> = accessions
            .iter()
            .filter(|acc| downloaded.contains(*acc))
            .cloned()
            .collect();

        let mut resolution = Resolution::default();
        if !config.skip_metadata && !ordered.is_empty() {
            let missing: Vec<AccessionId> = ordered
                .iter()
                .filter(|acc| !prefetched.contains_key(*acc))
                .cloned()
                .collect();
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Metadata; {} reused, {} to resolve via {}",
                    ordered.len() - missing.len(),
                    missing.len(),
                    resolver.stage_names().join(" -> ")
                ),
                elapsed: None,
            });
            resolution = resolver.resolve(&missing);
            for accession in &ordered {
                if let Some(record) = prefetched.remove(accession) {
                    resolution.records.insert(accession.clone(), record);
                }
            }
        }

        let mut records: Vec<MetadataRecord> = ordered
            .iter()
            .filter_map(|acc| resolution.records.remove(acc))
            .collect();
        for record in &mut records {
            let Some(accession) = record.accession().map(str::to_string) else {
                continue;
            };
            let summary = summarize_fasta(&destination.as_std_path().join(format!("{accession}.fasta")));
            if summary.status == FastaStatus::Ok {
                summary.enrich(record);
            }
        }

        let metadata_shell = records.is_empty();
        if metadata_shell {
            records = ordered.iter().map(shell_record).collect();
            if !config.skip_metadata && !ordered.is_empty() {
                warn!("no metadata could be resolved, writing an empty metadata table");
            }
        }
        let metadata_path =
            destination.join(format!("{METADATA_BASENAME}.{}", config.output_format.extension()));
        write_metadata_file(&records, config.output_format, &metadata_path)?;
        sink.event(ProgressEvent {
            message: format!("phase=Store; wrote {metadata_path}"),
            elapsed: Some(start.elapsed()),
        });

        let resolved = if metadata_shell { 0 } else { records.len() };
        Ok(RunReport {
            started_at,
            requested,
            considered,
            filtered_out,
            downloaded: summary.succeeded(),
            failed: summary
                .outcomes
                .iter()
                .filter(|outcome| !outcome.succeeded)
                .cloned()
                .collect(),
            batches: summary.batches,
            resolved,
            unresolved: resolution.unresolved,
            metadata_events: resolution.events,
            metadata_path,
            metadata_shell,
            elapsed_ms: start.elapsed().as_millis(),
        })
    }

    /// Resolves metadata for arbitrary accessions without downloading.
    pub fn resolve_metadata(
        &self,
        accessions: &[AccessionId],
        config: &ResolvedConfig,
        destination: &Utf8Path,
    ) -> Resolution {
        self.resolver(config, destination).resolve(accessions)
    }

    fn resolver(&self, config: &ResolvedConfig, destination: &Utf8Path) -> MetadataResolver<'_> {
        let mut resolver = MetadataResolver::new();
        if config.prefer_remote {
            match &self.harvester {
                Some(harvester) => {
                    resolver = resolver
                        .with_stage(HarvesterStage::new(harvester, config.harvester_timeout));
                }
                None => warn!("remote metadata requested but no harvester URL is configured"),
            }
        }
        let annotation_dir = config
            .annotation_dir
            .clone()
            .unwrap_or_else(|| destination.as_std_path().to_path_buf());
        resolver
            .with_stage(LocalAnnotationStage::new(vec![annotation_dir]))
            .with_stage(NcbiStage::new(&self.ncbi))
    }

    fn prefilter(
        &self,
        accessions: &[AccessionId],
        config: &ResolvedConfig,
        resolver: &MetadataResolver<'_>,
        sink: &dyn ProgressSink,
    ) -> (
        Vec<AccessionId>,
        Vec<FilteredAccession>,
        BTreeMap<AccessionId, MetadataRecord>,
    ) {
        let filter: &TypeFilter = &config.type_filter;
        if filter.is_trivial() {
            return (accessions.to_vec(), Vec::new(), BTreeMap::new());
        }

        let mut prefetched = BTreeMap::new();
        let split = if config.skip_metadata || config.pattern_only {
            sink.event(ProgressEvent {
                message: "phase=Filter; pattern classification".to_string(),
                elapsed: None,
            });
            filter.retain(accessions, |acc| classify_by_pattern(acc.as_str()))
        } else {
            sink.event(ProgressEvent {
                message: "phase=Filter; resolving metadata for classification".to_string(),
                elapsed: None,
            });
            prefetched = resolver.resolve(accessions).records;
            filter.retain(accessions, |acc| {
                prefetched
                    .get(acc)
                    .and_then(MetadataRecord::genome_type)
                    .unwrap_or_else(|| classify_by_pattern(acc.as_str()))
            })
        };

        sink.event(ProgressEvent {
            message: format!(
                "phase=Filter; kept {}, filtered out {}",
                split.kept.len(),
                split.dropped.len()
            ),
            elapsed: None,
        });
        let filtered_out = split
            .dropped
            .into_iter()
            .map(|(accession, genome_type)| FilteredAccession {
                accession,
                genome_type,
            })
            .collect();
        (split.kept, filtered_out, prefetched)
    }
}

/// Shell row: every priority column present, only `accession` filled.
fn shell_record(accession: &AccessionId) -> MetadataRecord {
    let mut record = MetadataRecord::default();
    for column in PRIORITY_COLUMNS {
        record.set(column, FieldValue::Absent);
    }
    record.set(fields::ACCESSION, accession.as_str());
    record
}

/// One accession per line; blanks and `#` comments skipped, anything after
/// the first token ignored, duplicates dropped keeping the first occurrence.
pub fn read_accession_list(path: &Utf8Path) -> Result<Vec<AccessionId>, KiraError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
        KiraError::AccessionListRead {
            path: PathBuf::from(path.as_std_path()),
            message: err.to_string(),
        }
    })?;
    Ok(parse_accession_list(&content))
}

pub fn parse_accession_list(content: &str) -> Vec<AccessionId> {
    let mut seen = BTreeSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|token| token.parse::<AccessionId>().ok())
        .filter(|acc| seen.insert(acc.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_skips_blanks_comments_and_duplicates() {
        let list = parse_accession_list("# header\nCP012345\n\n  NC_000913.3  chromosome\nCP012345\n");
        let values: Vec<&str> = list.iter().map(|acc| acc.as_str()).collect();
        assert_eq!(values, vec!["CP012345", "NC_000913.3"]);
    }

    #[test]
    fn shell_record_carries_priority_columns() {
        let record = shell_record(&"CP1".parse().unwrap());
        let keys: Vec<&str> = record.fields().map(|(key, _)| key).collect();
        for column in PRIORITY_COLUMNS {
            assert!(keys.contains(&column));
        }
        assert_eq!(record.accession(), Some("CP1"));
    }
}
