use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;

use camino::Utf8Path;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::metadata::{FieldValue, MetadataRecord, fields};

/// Columns that always lead a table, in this order.
pub const PRIORITY_COLUMNS: [&str; 17] = [
    fields::ACCESSION,
    fields::GENOME_ID,
    fields::ORGANISM,
    fields::GENUS,
    fields::SPECIES,
    fields::STRAIN,
    fields::TITLE,
    fields::BIOSAMPLE,
    fields::BIOPROJECT,
    fields::COLLECTION_DATE,
    fields::COUNTRY,
    fields::HOST,
    fields::ISOLATION_SOURCE,
    fields::AMR_PHENOTYPES,
    fields::MIC_DATA,
    fields::ANTIBIOTIC_RESISTANCE,
    fields::GENOME_TYPE,
];

const LIST_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Tsv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        }
    }

    fn delimiter(&self) -> Option<u8> {
        match self {
            OutputFormat::Json => None,
            OutputFormat::Csv => Some(b','),
            OutputFormat::Tsv => Some(b'\t'),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Flattens one record into scalar cells.
pub fn flatten_record(record: &MetadataRecord) -> BTreeMap<String, String> {
    let mut row = BTreeMap::new();
    for (key, value) in record.fields() {
        flatten_value(key, value, &mut row);
    }
    row
}

fn flatten_value(key: &str, value: &FieldValue, row: &mut BTreeMap<String, String>) {
    match (key, value) {
        (fields::ANTIBIOTIC_RESISTANCE, FieldValue::List(items)) => {
            row.insert(key.to_string(), join_pairs(items, "resistance"));
        }
        (fields::MIC_DATA, FieldValue::List(items)) => {
            row.insert(key.to_string(), join_pairs(items, "mic_value"));
        }
        (_, FieldValue::List(items)) => {
            row.insert(key.to_string(), join_list(items));
        }
        (_, FieldValue::Record(sub)) => {
            for (sub_key, sub_value) in sub {
                flatten_value(&format!("{key}_{sub_key}"), sub_value, row);
            }
        }
        _ => {
            row.insert(key.to_string(), value.render());
        }
    }
}

/// `antibiotic: <value_key>` per entry, joined with `; `.
fn join_pairs(items: &[FieldValue], value_key: &str) -> String {
    items
        .iter()
        .filter(|item| !item.is_absent())
        .map(|item| match item {
            FieldValue::Record(entry) => {
                let part = |name: &str| entry.get(name).map(FieldValue::render).unwrap_or_default();
                format!("{}: {}", part("antibiotic"), part(value_key))
            }
            other => other.render(),
        })
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn join_list(items: &[FieldValue]) -> String {
    items
        .iter()
        .filter(|item| !item.is_absent())
        .map(FieldValue::render)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Priority columns first, then every other observed column sorted.
pub fn column_order(rows: &[BTreeMap<String, String>]) -> Vec<String> {
    let priority: BTreeSet<&str> = PRIORITY_COLUMNS.iter().copied().collect();
    let rest: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .filter(|key| !priority.contains(key))
        .collect();
    PRIORITY_COLUMNS
        .iter()
        .copied()
        .chain(rest)
        .map(str::to_string)
        .collect()
}

pub fn write_table<W: Write>(
    records: &[MetadataRecord],
    writer: W,
    delimiter: u8,
) -> Result<(), KiraError> {
    let rows: Vec<BTreeMap<String, String>> = records.iter().map(flatten_record).collect();
    let columns = column_order(&rows);
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    out.write_record(&columns)
        .map_err(|err| KiraError::Serialization(err.to_string()))?;
    for row in &rows {
        let cells = columns
            .iter()
            .map(|column| row.get(column).map(String::as_str).unwrap_or_default());
        out.write_record(cells)
            .map_err(|err| KiraError::Serialization(err.to_string()))?;
    }
    out.flush()
        .map_err(|err| KiraError::Serialization(err.to_string()))?;
    Ok(())
}

pub fn write_json<W: Write>(records: &[MetadataRecord], mut writer: W) -> Result<(), KiraError> {
    serde_json::to_writer_pretty(&mut writer, records)
        .map_err(|err| KiraError::Serialization(err.to_string()))?;
    writer
        .write_all(b"\n")
        .map_err(|err| KiraError::Serialization(err.to_string()))?;
    Ok(())
}

pub fn write_records<W: Write>(
    records: &[MetadataRecord],
    format: OutputFormat,
    writer: W,
) -> Result<(), KiraError> {
    match format.delimiter() {
        Some(delimiter) => write_table(records, writer, delimiter),
        None => write_json(records, writer),
    }
}

/// Writes the artifact through a temp file in the same directory.
pub fn write_metadata_file(
    records: &[MetadataRecord],
    format: OutputFormat,
    path: &Utf8Path,
) -> Result<(), KiraError> {
    let parent = path
        .parent()
        .ok_or_else(|| KiraError::Filesystem("invalid metadata path".to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kira-gr-metadata")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    write_records(records, format, temp.as_file_mut())?;
    temp.persist(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccessionId;
    use crate::metadata::{MicEntry, ResistanceEntry};

    fn acc(value: &str) -> AccessionId {
        value.parse().unwrap()
    }

    #[test]
    fn mic_data_joins_literally() {
        let mut record = MetadataRecord::new(&acc("CP1"));
        record.set_mic_data(vec![MicEntry {
            antibiotic: "Ampicillin".to_string(),
            mic_value: "8".to_string(),
        }]);
        let row = flatten_record(&record);
        assert_eq!(row["mic_data"], "Ampicillin: 8");
    }

    #[test]
    fn resistance_and_plain_lists_use_semicolons() {
        let mut record = MetadataRecord::new(&acc("CP1"));
        record.set_antibiotic_resistance(vec![
            ResistanceEntry {
                antibiotic: "Ampicillin".to_string(),
                resistance: "Resistant".to_string(),
            },
            ResistanceEntry {
                antibiotic: "Colistin".to_string(),
                resistance: "Susceptible".to_string(),
            },
        ]);
        record.set_amr_phenotypes(["beta-lactam".to_string(), "aminoglycoside".to_string()].into());
        let row = flatten_record(&record);
        assert_eq!(
            row["antibiotic_resistance"],
            "Ampicillin: Resistant; Colistin: Susceptible"
        );
        assert_eq!(row["amr_phenotypes"], "aminoglycoside; beta-lactam");
    }

    #[test]
    fn sub_records_expand_and_absent_is_empty() {
        let mut record = MetadataRecord::new(&acc("CP1"));
        record.set(
            "assembly",
            FieldValue::Record(BTreeMap::from([
                ("level".to_string(), FieldValue::from("Complete Genome")),
                ("n50".to_string(), FieldValue::from(4_641_652u64)),
            ])),
        );
        record.set(fields::HOST, FieldValue::Absent);
        let row = flatten_record(&record);
        assert_eq!(row["assembly_level"], "Complete Genome");
        assert_eq!(row["assembly_n50"], "4641652");
        assert_eq!(row["host"], "");
        assert!(!row.contains_key("assembly"));
    }

    #[test]
    fn columns_are_priority_then_sorted_union() {
        let mut first = MetadataRecord::new(&acc("CP1"));
        first.set("zeta", "z");
        let mut second = MetadataRecord::new(&acc("CP2"));
        second.set("alpha", "a");
        second.set(fields::ORGANISM, "E. coli");
        let rows: Vec<_> = [first, second].iter().map(flatten_record).collect();
        let columns = column_order(&rows);
        assert_eq!(&columns[..3], &["accession", "genome_id", "organism"]);
        assert_eq!(columns[PRIORITY_COLUMNS.len()..], ["alpha", "zeta"]);
    }

    #[test]
    fn sparse_table_has_empty_cells() {
        let mut first = MetadataRecord::new(&acc("CP1"));
        first.set("zeta", "z");
        let second = MetadataRecord::new(&acc("CP2"));
        let mut buffer = Vec::new();
        write_table(&[first, second], &mut buffer, b',').unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("accession,genome_id,"));
        assert!(lines[0].ends_with(",genome_type,zeta"));
        assert!(lines[1].starts_with("CP1,") && lines[1].ends_with(",z"));
        assert!(lines[2].starts_with("CP2,") && lines[2].ends_with(','));
        assert!(!text.contains("null") && !text.contains("NaN"));
    }
}
