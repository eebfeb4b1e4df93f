use assert_matches::assert_matches;

use kira_genome_resolver::app::{parse_accession_list, read_accession_list};
use kira_genome_resolver::domain::{AccessionId, GenomeType, TypeSelector};
use kira_genome_resolver::error::KiraError;

#[test]
fn parse_accession_valid() {
    let acc: AccessionId = "NZ_CP009072.1".parse().unwrap();
    assert_eq!(acc.as_str(), "NZ_CP009072.1");
    assert_eq!(acc.unversioned(), "NZ_CP009072");
}

#[test]
fn parse_accession_rejects_paths() {
    assert_matches!(
        "../etc/passwd".parse::<AccessionId>(),
        Err(KiraError::InvalidAccession(_))
    );
    assert_matches!(
        "dir\\CP1".parse::<AccessionId>(),
        Err(KiraError::InvalidAccession(_))
    );
}

#[test]
fn genome_type_serializes_lowercase() {
    let json = serde_json::to_string(&GenomeType::Chromosome).unwrap();
    assert_eq!(json, "\"chromosome\"");
    let selector: TypeSelector = serde_json::from_str("\"all\"").unwrap();
    assert_eq!(selector, TypeSelector::All);
    assert_eq!(TypeSelector::All.genome_type(), None);
    assert_eq!(TypeSelector::from(GenomeType::Plasmid), TypeSelector::Plasmid);
}

#[test]
fn accession_list_drops_invalid_tokens_and_duplicates() {
    let list = parse_accession_list("CP1\n  \n#CP2\ncp1\nCP1\nNC_3\t# trailing comment\n");
    let values: Vec<&str> = list.iter().map(|acc| acc.as_str()).collect();
    assert_eq!(values, vec!["CP1", "cp1", "NC_3"]);
}

#[test]
fn missing_accession_list_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let path = camino::Utf8PathBuf::from_path_buf(temp.path().join("none.txt")).unwrap();
    assert_matches!(
        read_accession_list(&path),
        Err(KiraError::AccessionListRead { .. })
    );
}
