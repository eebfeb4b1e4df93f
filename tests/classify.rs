use kira_genome_resolver::classify::{classify_by_pattern, classify_by_signals};
use kira_genome_resolver::domain::{AccessionId, GenomeType, TypeSelector};
use kira_genome_resolver::filter::{TypeFilter, passes};

const SCENARIO: [&str; 3] = ["CP012345", "NZ_AB123401000123", "unknown_plasmid_strain_CP999"];

#[test]
fn pattern_classifier_scenario() {
    let kinds: Vec<GenomeType> = SCENARIO.iter().map(|acc| classify_by_pattern(acc)).collect();
    assert_eq!(
        kinds,
        vec![GenomeType::Complete, GenomeType::Contig, GenomeType::Complete]
    );
}

#[test]
fn signal_classifier_scenario() {
    let titles = [
        Some("Escherichia coli strain K-12 chromosome, complete genome"),
        Some("Klebsiella pneumoniae contig_12, whole genome shotgun sequence"),
        Some("unknown plasmid strain"),
    ];
    let kinds: Vec<GenomeType> = SCENARIO
        .iter()
        .zip(titles)
        .map(|(acc, title)| classify_by_signals(title, acc))
        .collect();
    assert_eq!(
        kinds,
        vec![GenomeType::Complete, GenomeType::Contig, GenomeType::Plasmid]
    );
}

#[test]
fn plasmid_wins_over_every_other_signal() {
    let titles = [
        "Plasmid pKPC complete sequence",
        "scaffold with PLASMID origin",
        "contig from plasmid assembly",
        "chromosome and plasmid",
    ];
    for title in titles {
        for acc in ["CP000001", "NC_000913", "NZ_CP1", "ABC1"] {
            assert_eq!(classify_by_signals(Some(title), acc), GenomeType::Plasmid);
        }
    }
    assert_eq!(classify_by_signals(None, "np_PlAsMiD_1"), GenomeType::Plasmid);
}

#[test]
fn complete_prefixes_without_other_signals() {
    for acc in ["CP012345", "cp012345.1", "NC_000913.3", "NZ_CP009072"] {
        assert_eq!(classify_by_signals(None, acc), GenomeType::Complete);
        assert_eq!(classify_by_signals(Some("Escherichia coli"), acc), GenomeType::Complete);
    }
}

#[test]
fn scaffold_contig_and_unknown_titles() {
    assert_eq!(
        classify_by_signals(Some("Salmonella scaffold_3"), "JAB01000003"),
        GenomeType::Scaffold
    );
    assert_eq!(
        classify_by_signals(Some("Salmonella contig00042"), "JAB01000042"),
        GenomeType::Contig
    );
    assert_eq!(classify_by_signals(Some("Salmonella enterica"), "JAB01000042"), GenomeType::Unknown);
    assert_eq!(classify_by_signals(None, ""), GenomeType::Unknown);
}

#[test]
fn pattern_classifier_contig_markers() {
    assert_eq!(classify_by_pattern("NZ_JAAAAA010000001"), GenomeType::Contig);
    assert_eq!(classify_by_pattern("NZ_AAAA00000000"), GenomeType::Contig);
    assert_eq!(classify_by_pattern("NZ_LR134123"), GenomeType::Complete);
    assert_eq!(classify_by_pattern("OX123456"), GenomeType::Complete);
    assert_eq!(classify_by_pattern("XYZ123"), GenomeType::Complete);
}

#[test]
fn passes_with_all_is_exclusion_only() {
    let every_exclude: Vec<Vec<GenomeType>> = vec![
        vec![],
        vec![GenomeType::Plasmid],
        vec![GenomeType::Contig, GenomeType::Scaffold],
        GenomeType::ALL.to_vec(),
    ];
    for exclude in &every_exclude {
        for kind in GenomeType::ALL {
            assert_eq!(
                passes(kind, &[TypeSelector::All], exclude),
                !exclude.contains(&kind)
            );
        }
    }
}

#[test]
fn passes_without_all_is_membership_minus_exclusion() {
    let include = [TypeSelector::Complete, TypeSelector::Plasmid];
    let exclude = [GenomeType::Plasmid];
    for kind in GenomeType::ALL {
        let expected = matches!(kind, GenomeType::Complete);
        assert_eq!(passes(kind, &include, &exclude), expected);
    }
    assert!(!passes(GenomeType::Unknown, &[], &[]));
}

#[test]
fn filter_keeps_input_order() {
    let accessions: Vec<AccessionId> = ["NZ_A01000", "CP1", "NC_2", "NZ_B02000"]
        .iter()
        .map(|acc| acc.parse().unwrap())
        .collect();
    let split = TypeFilter::complete_only().retain(&accessions, |acc| classify_by_pattern(acc.as_str()));
    let kept: Vec<&str> = split.kept.iter().map(|acc| acc.as_str()).collect();
    assert_eq!(kept, vec!["CP1", "NC_2"]);
    assert_eq!(split.dropped.len(), 2);
    assert_eq!(split.dropped[0].1, GenomeType::Contig);
}
