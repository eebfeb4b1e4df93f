use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// Identifier of one sequence record, kept verbatim as read from the input list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessionId(String);

impl AccessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The accession without a trailing `.N` version suffix.
    pub fn unversioned(&self) -> &str {
        strip_version(&self.0)
    }

    /// Case-insensitive comparison that ignores version suffixes on either side.
    pub fn matches(&self, other: &str) -> bool {
        let other = other.trim();
        self.0.eq_ignore_ascii_case(other)
            || self.unversioned().eq_ignore_ascii_case(strip_version(other))
    }
}

impl fmt::Display for AccessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessionId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !trimmed.chars().any(|ch| ch.is_whitespace() || ch == '/' || ch == '\\');
        if !is_valid {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

fn strip_version(value: &str) -> &str {
    match value.rsplit_once('.') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|ch| ch.is_ascii_digit()) => {
            head
        }
        _ => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenomeType {
    Complete,
    Chromosome,
    Scaffold,
    Contig,
    Plasmid,
    Unknown,
}

impl GenomeType {
    pub const ALL: [GenomeType; 6] = [
        GenomeType::Complete,
        GenomeType::Chromosome,
        GenomeType::Scaffold,
        GenomeType::Contig,
        GenomeType::Plasmid,
        GenomeType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenomeType::Complete => "complete",
            GenomeType::Chromosome => "chromosome",
            GenomeType::Scaffold => "scaffold",
            GenomeType::Contig => "contig",
            GenomeType::Plasmid => "plasmid",
            GenomeType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GenomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GenomeType {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        GenomeType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| KiraError::InvalidGenomeType(value.to_string()))
    }
}

/// One entry of an include list: a concrete genome type or the `all` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TypeSelector {
    All,
    Complete,
    Chromosome,
    Scaffold,
    Contig,
    Plasmid,
    Unknown,
}

impl TypeSelector {
    pub fn genome_type(&self) -> Option<GenomeType> {
        match self {
            TypeSelector::All => None,
            TypeSelector::Complete => Some(GenomeType::Complete),
            TypeSelector::Chromosome => Some(GenomeType::Chromosome),
            TypeSelector::Scaffold => Some(GenomeType::Scaffold),
            TypeSelector::Contig => Some(GenomeType::Contig),
            TypeSelector::Plasmid => Some(GenomeType::Plasmid),
            TypeSelector::Unknown => Some(GenomeType::Unknown),
        }
    }
}

impl From<GenomeType> for TypeSelector {
    fn from(value: GenomeType) -> Self {
        match value {
            GenomeType::Complete => TypeSelector::Complete,
            GenomeType::Chromosome => TypeSelector::Chromosome,
            GenomeType::Scaffold => TypeSelector::Scaffold,
            GenomeType::Contig => TypeSelector::Contig,
            GenomeType::Plasmid => TypeSelector::Plasmid,
            GenomeType::Unknown => TypeSelector::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_accession_keeps_case() {
        let acc: AccessionId = "  nz_Cp012345.1 ".parse().unwrap();
        assert_eq!(acc.as_str(), "nz_Cp012345.1");
    }

    #[test]
    fn parse_accession_invalid() {
        let err = "CP 0123".parse::<AccessionId>().unwrap_err();
        assert_matches!(err, KiraError::InvalidAccession(_));
        let err = "   ".parse::<AccessionId>().unwrap_err();
        assert_matches!(err, KiraError::InvalidAccession(_));
    }

    #[test]
    fn accession_matches_ignores_version_and_case() {
        let acc: AccessionId = "CP012345".parse().unwrap();
        assert!(acc.matches("cp012345.2"));
        assert!(!acc.matches("CP012346.1"));
        let versioned: AccessionId = "NC_000913.3".parse().unwrap();
        assert_eq!(versioned.unversioned(), "NC_000913");
        assert!(versioned.matches("NC_000913"));
    }

    #[test]
    fn genome_type_round_trips_through_str() {
        for kind in GenomeType::ALL {
            assert_eq!(kind.as_str().parse::<GenomeType>().unwrap(), kind);
        }
        assert_matches!(
            "circular".parse::<GenomeType>(),
            Err(KiraError::InvalidGenomeType(_))
        );
    }
}
