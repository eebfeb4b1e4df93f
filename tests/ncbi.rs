use assert_matches::assert_matches;
use serde_json::json;

use kira_genome_resolver::error::KiraError;
use kira_genome_resolver::metadata::{FieldValue, fields};
use kira_genome_resolver::ncbi::parse_esummary;

#[test]
fn esummary_maps_core_and_subtype_fields() {
    let raw = json!({
        "header": {"type": "esummary", "version": "0.3"},
        "result": {
            "uids": ["1234", "5678"],
            "1234": {
                "uid": "1234",
                "caption": "CP012345",
                "accessionversion": "CP012345.1",
                "title": "Escherichia coli strain ABC chromosome, complete genome",
                "organism": "Escherichia coli",
                "taxid": 562,
                "slen": 4641652,
                "biosample": "SAMN00000001",
                "completeness": "complete",
                "createdate": "2020/01/01",
                "subtype": "strain|host|country|collection_date|serovar",
                "subname": "ABC|Homo sapiens|Norway: Oslo|2019-05|O157:H7"
            },
            "5678": {"uid": "5678", "error": "Invalid uid"}
        }
    });

    let records = parse_esummary(&raw).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.accession(), Some("CP012345.1"));
    assert_eq!(record.text(fields::GENOME_ID), Some("CP012345"));
    assert_eq!(record.text(fields::STRAIN), Some("ABC"));
    assert_eq!(record.text(fields::HOST), Some("Homo sapiens"));
    assert_eq!(record.text(fields::COUNTRY), Some("Norway: Oslo"));
    assert_eq!(record.text(fields::COLLECTION_DATE), Some("2019-05"));
    assert_eq!(record.text(fields::GENUS), Some("Escherichia"));
    assert_eq!(record.text(fields::SPECIES), Some("Escherichia coli"));
    assert_eq!(record.text(fields::METADATA_SOURCE), Some("ncbi"));
    assert_eq!(
        record.get("sequence_length"),
        Some(&FieldValue::from(4_641_652u64))
    );
    assert_matches!(
        record.get("source_qualifiers"),
        Some(FieldValue::Record(extra)) if extra.contains_key("serovar")
    );
    assert!(record.get(fields::ISOLATION_SOURCE).is_none());
}

#[test]
fn esummary_without_result_is_a_payload_error() {
    assert_matches!(
        parse_esummary(&json!({"error": "API rate limit exceeded"})),
        Err(KiraError::NcbiPayload(_))
    );
}
