use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::classify_by_signals;
use crate::domain::{AccessionId, GenomeType};

pub mod fields {
    pub const ACCESSION: &str = "accession";
    pub const ACCESSION_VERSION: &str = "accession_version";
    pub const GENOME_ID: &str = "genome_id";
    pub const ORGANISM: &str = "organism";
    pub const GENUS: &str = "genus";
    pub const SPECIES: &str = "species";
    pub const STRAIN: &str = "strain";
    pub const TITLE: &str = "title";
    pub const BIOSAMPLE: &str = "biosample";
    pub const BIOPROJECT: &str = "bioproject";
    pub const COLLECTION_DATE: &str = "collection_date";
    pub const COUNTRY: &str = "country";
    pub const HOST: &str = "host";
    pub const ISOLATION_SOURCE: &str = "isolation_source";
    pub const AMR_PHENOTYPES: &str = "amr_phenotypes";
    pub const MIC_DATA: &str = "mic_data";
    pub const ANTIBIOTIC_RESISTANCE: &str = "antibiotic_resistance";
    pub const GENOME_TYPE: &str = "genome_type";
    pub const QUALITY_SCORE: &str = "quality_score";
    pub const METADATA_SOURCE: &str = "metadata_source";
}

/// A single metadata value. `Absent` is the only spelling of a missing value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Absent,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FieldValue>),
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Scalar rendering; lists and records fall back to compact JSON.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Absent => String::new(),
            FieldValue::Bool(value) => value.to_string(),
            FieldValue::Number(value) => value.to_string(),
            FieldValue::Text(value) => value.clone(),
            FieldValue::List(_) | FieldValue::Record(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or_default()
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(FieldValue::Number)
            .unwrap_or_default()
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Absent,
            Value::Bool(value) => FieldValue::Bool(value),
            Value::Number(value) => FieldValue::Number(value),
            Value::String(value) => FieldValue::Text(value),
            Value::Array(items) => FieldValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => FieldValue::Record(
                map.into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicEntry {
    pub antibiotic: String,
    pub mic_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResistanceEntry {
    pub antibiotic: String,
    pub resistance: String,
}

impl From<MicEntry> for FieldValue {
    fn from(value: MicEntry) -> Self {
        FieldValue::Record(BTreeMap::from([
            ("antibiotic".to_string(), FieldValue::Text(value.antibiotic)),
            ("mic_value".to_string(), FieldValue::Text(value.mic_value)),
        ]))
    }
}

impl From<ResistanceEntry> for FieldValue {
    fn from(value: ResistanceEntry) -> Self {
        FieldValue::Record(BTreeMap::from([
            ("antibiotic".to_string(), FieldValue::Text(value.antibiotic)),
            ("resistance".to_string(), FieldValue::Text(value.resistance)),
        ]))
    }
}

/// Open-shaped metadata for one accession. Sources contribute whichever fields
/// they know; keys are kept in lexicographic order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl MetadataRecord {
    pub fn new(accession: &AccessionId) -> Self {
        let mut record = Self::default();
        record.set(fields::ACCESSION, accession.as_str());
        record
    }

    /// Build from a JSON object; anything else yields `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self {
                fields: map
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).filter(|value| !value.is_absent())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Sets `key` only when it is missing or absent.
    pub fn set_if_absent(&mut self, key: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        if value.is_absent() || self.get(key).is_some() {
            return;
        }
        self.fields.insert(key.to_string(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn accession(&self) -> Option<&str> {
        self.text(fields::ACCESSION)
    }

    pub fn title(&self) -> Option<&str> {
        self.text(fields::TITLE)
    }

    pub fn genome_type(&self) -> Option<GenomeType> {
        self.text(fields::GENOME_TYPE)
            .and_then(|value| value.parse().ok())
    }

    /// Pins the record to the accession it was requested under. A differing
    /// source spelling is kept as `accession_version`.
    pub fn bind_to(&mut self, accession: &AccessionId) {
        if let Some(existing) = self.accession().map(str::to_string) {
            if existing != accession.as_str() {
                self.set_if_absent(fields::ACCESSION_VERSION, existing);
            }
        }
        self.set(fields::ACCESSION, accession.as_str());
    }

    pub fn tag_genome_type(&mut self) -> GenomeType {
        let accession = self.accession().unwrap_or_default().to_string();
        let genome_type = classify_by_signals(self.title(), &accession);
        self.set(fields::GENOME_TYPE, genome_type.as_str());
        genome_type
    }

    pub fn set_mic_data(&mut self, entries: Vec<MicEntry>) {
        self.set(
            fields::MIC_DATA,
            FieldValue::List(entries.into_iter().map(Into::into).collect()),
        );
    }

    pub fn set_antibiotic_resistance(&mut self, entries: Vec<ResistanceEntry>) {
        self.set(
            fields::ANTIBIOTIC_RESISTANCE,
            FieldValue::List(entries.into_iter().map(Into::into).collect()),
        );
    }

    pub fn set_amr_phenotypes(&mut self, phenotypes: BTreeSet<String>) {
        self.set(
            fields::AMR_PHENOTYPES,
            FieldValue::List(phenotypes.into_iter().map(FieldValue::Text).collect()),
        );
    }

    /// Fills `genus`/`species` from a binomial organism name when missing.
    pub fn derive_taxonomy(&mut self) {
        let Some(organism) = self.text(fields::ORGANISM).map(str::to_string) else {
            return;
        };
        let mut words = organism.split_whitespace();
        let Some(genus) = words.next() else {
            return;
        };
        self.set_if_absent(fields::GENUS, genus);
        if let Some(epithet) = words.next() {
            self.set_if_absent(fields::SPECIES, format!("{genus} {epithet}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(value: &str) -> AccessionId {
        value.parse().unwrap()
    }

    #[test]
    fn absent_values_are_not_returned() {
        let mut record = MetadataRecord::new(&acc("CP1"));
        record.set(fields::HOST, FieldValue::Absent);
        assert!(record.get(fields::HOST).is_none());
        record.set_if_absent(fields::HOST, "Homo sapiens");
        assert_eq!(record.text(fields::HOST), Some("Homo sapiens"));
        record.set_if_absent(fields::HOST, "Gallus gallus");
        assert_eq!(record.text(fields::HOST), Some("Homo sapiens"));
    }

    #[test]
    fn bind_keeps_source_spelling() {
        let mut record = MetadataRecord::default();
        record.set(fields::ACCESSION, "CP012345.1");
        record.bind_to(&acc("CP012345"));
        assert_eq!(record.accession(), Some("CP012345"));
        assert_eq!(record.text(fields::ACCESSION_VERSION), Some("CP012345.1"));
    }

    #[test]
    fn json_null_maps_to_absent() {
        let value = serde_json::json!({
            "accession": "NC_1",
            "country": null,
            "mic_data": [{"antibiotic": "Ampicillin", "mic_value": "8"}]
        });
        let record = MetadataRecord::from_json(value).unwrap();
        assert!(record.get(fields::COUNTRY).is_none());
        assert!(matches!(record.get(fields::MIC_DATA), Some(FieldValue::List(items)) if items.len() == 1));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["country"].is_null());
    }

    #[test]
    fn taxonomy_from_organism() {
        let mut record = MetadataRecord::new(&acc("CP1"));
        record.set(fields::ORGANISM, "Escherichia coli K-12");
        record.derive_taxonomy();
        assert_eq!(record.text(fields::GENUS), Some("Escherichia"));
        assert_eq!(record.text(fields::SPECIES), Some("Escherichia coli"));
    }

    #[test]
    fn tag_uses_title_and_accession() {
        let mut record = MetadataRecord::new(&acc("unknown_plasmid_strain_CP999"));
        record.set(fields::TITLE, "unknown plasmid strain");
        assert_eq!(record.tag_genome_type(), GenomeType::Plasmid);
        assert_eq!(record.genome_type(), Some(GenomeType::Plasmid));
    }
}
