use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use flate2::read::GzDecoder;
use regex::Regex;

use crate::domain::AccessionId;
use crate::error::KiraError;
use crate::metadata::{FieldValue, MetadataRecord, fields};

const ANNOTATION_EXTENSIONS: [&str; 6] = ["gb", "gbk", "gbff", "gb.gz", "gbk.gz", "gbff.gz"];

/// First existing `<dir>/<accession>.<ext>` among the GenBank extensions.
pub fn find_annotation_file(dir: &Path, accession: &AccessionId) -> Option<PathBuf> {
    ANNOTATION_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{ext}", accession.as_str())))
        .find(|path| path.is_file())
}

pub fn parse_annotation_file(path: &Path) -> Result<MetadataRecord, KiraError> {
    let file = File::open(path).map_err(|err| KiraError::AnnotationParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let gzipped = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    let result = if gzipped {
        parse_genbank(BufReader::new(GzDecoder::new(file)))
    } else {
        parse_genbank(BufReader::new(file))
    };
    result.map_err(|message| KiraError::AnnotationParse {
        path: path.to_path_buf(),
        message,
    })
}

fn qualifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s+/([A-Za-z_]+)(?:=(.*))?$"#).expect("valid regex"))
}

#[derive(Default)]
struct GenbankHeader {
    locus: Option<String>,
    definition: Vec<String>,
    accession: Option<String>,
    version: Option<String>,
    dblink: Vec<String>,
    organism: Option<String>,
}

/// Reads the first record of a GenBank flat file.
pub fn parse_genbank<R: BufRead>(reader: R) -> Result<MetadataRecord, String> {
    let mut header = GenbankHeader::default();
    let mut qualifiers: Vec<(String, String)> = Vec::new();
    let mut keyword = String::new();
    let mut in_source_feature = false;
    let mut source_seen = false;
    let mut open_qualifier: Option<(String, String)> = None;

    for line in reader.lines() {
        let line = line.map_err(|err| err.to_string())?;
        if line.starts_with("//") || line.starts_with("ORIGIN") {
            break;
        }

        let top_level = !line.starts_with(' ') && !line.trim().is_empty();
        if top_level {
            let head = line.get(..12).unwrap_or(line.as_str());
            let rest = line.get(12..).unwrap_or_default();
            keyword = head.trim().to_string();
            store_header_line(&mut header, &keyword, rest.trim());
            continue;
        }

        if keyword == "FEATURES" {
            let feature_key = line.get(5..21).unwrap_or_default().trim();
            if !feature_key.is_empty() {
                if let Some(done) = open_qualifier.take() {
                    qualifiers.push(done);
                }
                in_source_feature = feature_key == "source" && !source_seen;
                source_seen |= feature_key == "source";
                continue;
            }
            if !in_source_feature {
                continue;
            }
            if let Some(caps) = qualifier_regex().captures(&line) {
                if let Some(done) = open_qualifier.take() {
                    qualifiers.push(done);
                }
                let key = caps[1].to_string();
                let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                open_qualifier = Some((key, value.to_string()));
            } else if let Some((_, value)) = open_qualifier.as_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        let sub_keyword = line.get(..12).unwrap_or_default().trim();
        if sub_keyword == "ORGANISM" {
            keyword = "ORGANISM".to_string();
            header.organism = Some(line.get(12..).unwrap_or_default().trim().to_string());
            continue;
        }
        let rest = line.trim();
        match keyword.as_str() {
            "DEFINITION" => header.definition.push(rest.to_string()),
            "DBLINK" => header.dblink.push(rest.to_string()),
            _ => {}
        }
    }
    if let Some(done) = open_qualifier.take() {
        qualifiers.push(done);
    }

    build_record(header, qualifiers)
}

fn store_header_line(header: &mut GenbankHeader, keyword: &str, rest: &str) {
    match keyword {
        "LOCUS" => header.locus = rest.split_whitespace().next().map(str::to_string),
        "DEFINITION" => header.definition.push(rest.to_string()),
        "ACCESSION" => header.accession = rest.split_whitespace().next().map(str::to_string),
        "VERSION" => header.version = rest.split_whitespace().next().map(str::to_string),
        "DBLINK" => header.dblink.push(rest.to_string()),
        _ => {}
    }
}

fn build_record(
    header: GenbankHeader,
    qualifiers: Vec<(String, String)>,
) -> Result<MetadataRecord, String> {
    let accession = header
        .version
        .clone()
        .or(header.accession.clone())
        .or(header.locus.clone())
        .ok_or_else(|| "no LOCUS, ACCESSION or VERSION line".to_string())?;

    let mut record = MetadataRecord::default();
    record.set(fields::ACCESSION, accession);
    record.set(
        fields::GENOME_ID,
        header.accession.clone().or(header.locus.clone()),
    );

    let definition = header.definition.join(" ");
    let definition = definition.trim().trim_end_matches('.').trim();
    if !definition.is_empty() {
        record.set(fields::TITLE, definition);
    }
    record.set(fields::ORGANISM, header.organism.clone());

    for link in &header.dblink {
        if let Some((kind, value)) = link.split_once(':') {
            let value = value.trim().to_string();
            match kind.trim() {
                "BioProject" => record.set_if_absent(fields::BIOPROJECT, value),
                "BioSample" => record.set_if_absent(fields::BIOSAMPLE, value),
                _ => {}
            }
        }
    }

    let mut extra = BTreeMap::new();
    for (key, value) in qualifiers {
        let value = value.trim().trim_matches('"').trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_str() {
            "organism" => record.set_if_absent(fields::ORGANISM, value),
            "strain" => record.set_if_absent(fields::STRAIN, value),
            "host" => record.set_if_absent(fields::HOST, value),
            "country" | "geo_loc_name" => record.set_if_absent(fields::COUNTRY, value),
            "isolation_source" => record.set_if_absent(fields::ISOLATION_SOURCE, value),
            "collection_date" => record.set_if_absent(fields::COLLECTION_DATE, value),
            "db_xref" | "mol_type" => {}
            _ => {
                extra.insert(key, FieldValue::Text(value));
            }
        }
    }
    if !extra.is_empty() {
        record.set("source_qualifiers", FieldValue::Record(extra));
    }
    record.set(fields::METADATA_SOURCE, "annotation");
    record.derive_taxonomy();
    Ok(record)
}
