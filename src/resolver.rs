//! Metadata resolution as an ordered chain of sources.
//!
//! Each stage sees only the accessions no earlier stage resolved. Records are
//! re-keyed to the requested accession and tagged with a genome type once the
//! chain has run. Accessions nobody resolved are reported, never padded with
//! placeholder records.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::annotation::{find_annotation_file, parse_annotation_file};
use crate::domain::AccessionId;
use crate::harvester::HarvesterClient;
use crate::metadata::{MetadataRecord, fields};
use crate::ncbi::NcbiClient;

/// What one stage produced for the accessions it was handed.
#[derive(Debug, Default)]
pub struct StageOutcome {
    pub resolved: BTreeMap<AccessionId, MetadataRecord>,
    pub failures: Vec<(AccessionId, String)>,
    /// Set when the whole source was unusable for this call.
    pub degraded: Option<String>,
}

impl StageOutcome {
    fn degraded(reason: String) -> Self {
        Self {
            degraded: Some(reason),
            ..Self::default()
        }
    }
}

pub trait MetadataSource {
    fn name(&self) -> &'static str;
    fn resolve(&self, pending: &[AccessionId]) -> StageOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionEvent {
    Degraded {
        source: String,
        reason: String,
    },
    ItemFailed {
        source: String,
        accession: String,
        message: String,
    },
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub records: BTreeMap<AccessionId, MetadataRecord>,
    pub unresolved: Vec<AccessionId>,
    pub events: Vec<ResolutionEvent>,
}

#[derive(Default)]
pub struct MetadataResolver<'a> {
    stages: Vec<Box<dyn MetadataSource + 'a>>,
}

impl<'a> MetadataResolver<'a> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_stage(mut self, stage: impl MetadataSource + 'a) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn resolve(&self, accessions: &[AccessionId]) -> Resolution {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<AccessionId> = accessions
            .iter()
            .filter(|acc| seen.insert((*acc).clone()))
            .cloned()
            .collect();
        let mut resolution = Resolution::default();

        for stage in &self.stages {
            if pending.is_empty() {
                break;
            }
            let outcome = stage.resolve(&pending);
            if let Some(reason) = outcome.degraded {
                warn!(source = stage.name(), %reason, "metadata source degraded, falling through");
                resolution.events.push(ResolutionEvent::Degraded {
                    source: stage.name().to_string(),
                    reason,
                });
            }
            for (accession, message) in outcome.failures {
                debug!(source = stage.name(), %accession, %message, "metadata lookup failed");
                resolution.events.push(ResolutionEvent::ItemFailed {
                    source: stage.name().to_string(),
                    accession: accession.to_string(),
                    message,
                });
            }
            for (accession, mut record) in outcome.resolved {
                if !pending.contains(&accession) {
                    continue;
                }
                record.bind_to(&accession);
                record.set_if_absent(fields::METADATA_SOURCE, stage.name());
                resolution.records.insert(accession, record);
            }
            pending.retain(|acc| !resolution.records.contains_key(acc));
        }

        for record in resolution.records.values_mut() {
            record.tag_genome_type();
        }
        resolution.unresolved = pending;
        resolution
    }
}

/// Pairs source records with the requested accessions they describe. Exact
/// (case-insensitive) matches are assigned across all records before any
/// version-insensitive match; the first record for an accession wins.
pub fn assign_records(
    records: Vec<MetadataRecord>,
    pending: &[AccessionId],
) -> BTreeMap<AccessionId, MetadataRecord> {
    let mut assigned = BTreeMap::new();
    let mut leftover = Vec::new();
    for record in records {
        let keys = record_keys(&record);
        let exact = pending
            .iter()
            .find(|acc| {
                !assigned.contains_key(*acc)
                    && keys.iter().any(|key| acc.as_str().eq_ignore_ascii_case(key))
            })
            .cloned();
        match exact {
            Some(accession) => {
                assigned.insert(accession, record);
            }
            None => leftover.push((keys, record)),
        }
    }

    for (keys, record) in leftover {
        let loose = pending
            .iter()
            .find(|acc| !assigned.contains_key(*acc) && keys.iter().any(|key| acc.matches(key)))
            .cloned();
        match loose {
            Some(accession) => {
                assigned.insert(accession, record);
            }
            None => debug!(?keys, "dropping record that matches no pending accession"),
        }
    }
    assigned
}

fn record_keys(record: &MetadataRecord) -> Vec<String> {
    [fields::GENOME_ID, fields::ACCESSION, fields::ACCESSION_VERSION]
        .iter()
        .filter_map(|key| record.text(key).map(str::to_string))
        .collect()
}

/// Remote harvester, probed for liveness before the real call.
pub struct HarvesterStage<'a, H: HarvesterClient> {
    client: &'a H,
    probe_timeout: Duration,
}

impl<'a, H: HarvesterClient> HarvesterStage<'a, H> {
    pub fn new(client: &'a H, probe_timeout: Duration) -> Self {
        Self {
            client,
            probe_timeout,
        }
    }
}

impl<H: HarvesterClient> MetadataSource for HarvesterStage<'_, H> {
    fn name(&self) -> &'static str {
        "harvester"
    }

    fn resolve(&self, pending: &[AccessionId]) -> StageOutcome {
        if !self.client.is_reachable(self.probe_timeout) {
            return StageOutcome::degraded(format!(
                "service unreachable at {}",
                self.client.service_url()
            ));
        }
        let response = match self.client.fetch(pending) {
            Ok(response) => response,
            Err(err) => return StageOutcome::degraded(err.to_string()),
        };

        let resolved = assign_records(response.records, pending);
        let failures = response
            .errors
            .into_iter()
            .filter_map(|error| {
                pending
                    .iter()
                    .find(|acc| acc.matches(&error.accession))
                    .filter(|acc| !resolved.contains_key(*acc))
                    .map(|acc| (acc.clone(), error.message))
            })
            .collect();
        StageOutcome {
            resolved,
            failures,
            degraded: None,
        }
    }
}

/// Previously downloaded GenBank files; no network.
pub struct LocalAnnotationStage {
    dirs: Vec<PathBuf>,
}

impl LocalAnnotationStage {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl MetadataSource for LocalAnnotationStage {
    fn name(&self) -> &'static str {
        "annotation"
    }

    fn resolve(&self, pending: &[AccessionId]) -> StageOutcome {
        let mut outcome = StageOutcome::default();
        for accession in pending {
            let Some(path) = self
                .dirs
                .iter()
                .find_map(|dir| find_annotation_file(dir, accession))
            else {
                continue;
            };
            match parse_annotation_file(&path) {
                Ok(record) => {
                    outcome.resolved.insert(accession.clone(), record);
                }
                Err(err) => outcome.failures.push((accession.clone(), err.to_string())),
            }
        }
        outcome
    }
}

/// Direct nucleotide summary lookup for whatever is still missing.
pub struct NcbiStage<'a, N: NcbiClient> {
    client: &'a N,
}

impl<'a, N: NcbiClient> NcbiStage<'a, N> {
    pub fn new(client: &'a N) -> Self {
        Self { client }
    }
}

impl<N: NcbiClient> MetadataSource for NcbiStage<'_, N> {
    fn name(&self) -> &'static str {
        "ncbi"
    }

    fn resolve(&self, pending: &[AccessionId]) -> StageOutcome {
        let records = match self.client.fetch_metadata_batch(pending) {
            Ok(records) => records,
            Err(err) => return StageOutcome::degraded(err.to_string()),
        };
        let resolved = assign_records(records, pending);
        let failures = pending
            .iter()
            .filter(|acc| !resolved.contains_key(*acc))
            .map(|acc| (acc.clone(), "no summary returned".to_string()))
            .collect();
        StageOutcome {
            resolved,
            failures,
            degraded: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(value: &str) -> AccessionId {
        value.parse().unwrap()
    }

    fn record(key: &str, value: &str) -> MetadataRecord {
        let mut record = MetadataRecord::default();
        record.set(key, value);
        record
    }

    #[test]
    fn assign_prefers_exact_match() {
        let pending = vec![acc("CP1"), acc("CP1.2")];
        let assigned = assign_records(
            vec![record(fields::ACCESSION, "CP1.2"), record(fields::GENOME_ID, "cp1")],
            &pending,
        );
        assert_eq!(assigned[&acc("CP1.2")].accession(), Some("CP1.2"));
        assert_eq!(assigned[&acc("CP1")].text(fields::GENOME_ID), Some("cp1"));
    }

    #[test]
    fn assign_falls_back_to_unversioned() {
        let pending = vec![acc("NC_000913")];
        let assigned = assign_records(
            vec![
                record(fields::ACCESSION, "NC_000913.3"),
                record(fields::ACCESSION, "NC_000913.2"),
                record(fields::ACCESSION, "CP9"),
            ],
            &pending,
        );
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[&acc("NC_000913")].accession(), Some("NC_000913.3"));
    }

    #[test]
    fn later_exact_record_beats_earlier_versioned_one() {
        let mut stale = record(fields::ACCESSION, "CP1.1");
        stale.set(fields::TITLE, "stale");
        let mut exact = record(fields::ACCESSION, "CP1");
        exact.set(fields::TITLE, "exact");
        let assigned = assign_records(vec![stale, exact], &[acc("CP1")]);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[&acc("CP1")].title(), Some("exact"));
    }
}
