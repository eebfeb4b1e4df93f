use crate::domain::{AccessionId, GenomeType, TypeSelector};

/// Include/exclude rule applied to classified accessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFilter {
    include: Vec<TypeSelector>,
    exclude: Vec<GenomeType>,
}

impl Default for TypeFilter {
    fn default() -> Self {
        Self {
            include: vec![TypeSelector::All],
            exclude: Vec::new(),
        }
    }
}

impl TypeFilter {
    pub fn new(include: Vec<TypeSelector>, exclude: Vec<GenomeType>) -> Self {
        Self { include, exclude }
    }

    /// Replaces each side that is given, keeping the other.
    pub fn overridden(mut self, include: Vec<TypeSelector>, exclude: Vec<GenomeType>) -> Self {
        if !include.is_empty() {
            self.include = include;
        }
        if !exclude.is_empty() {
            self.exclude = exclude;
        }
        self
    }

    pub fn complete_only() -> Self {
        Self::new(vec![TypeSelector::Complete], Vec::new())
    }

    /// True when every genome type passes, so classification can be skipped.
    pub fn is_trivial(&self) -> bool {
        self.include.contains(&TypeSelector::All) && self.exclude.is_empty()
    }

    pub fn passes(&self, genome_type: GenomeType) -> bool {
        passes(genome_type, &self.include, &self.exclude)
    }

    /// Stable subsequence of `accessions` whose classification passes.
    pub fn retain<F>(&self, accessions: &[AccessionId], mut classify: F) -> FilterSplit
    where
        F: FnMut(&AccessionId) -> GenomeType,
    {
        let mut split = FilterSplit::default();
        for accession in accessions {
            let genome_type = classify(accession);
            if self.passes(genome_type) {
                split.kept.push(accession.clone());
            } else {
                split.dropped.push((accession.clone(), genome_type));
            }
        }
        split
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterSplit {
    pub kept: Vec<AccessionId>,
    pub dropped: Vec<(AccessionId, GenomeType)>,
}

/// `all` in the include set admits every type not explicitly excluded.
pub fn passes(genome_type: GenomeType, include: &[TypeSelector], exclude: &[GenomeType]) -> bool {
    if exclude.contains(&genome_type) {
        return false;
    }
    if include.contains(&TypeSelector::All) {
        return true;
    }
    include
        .iter()
        .any(|selector| selector.genome_type() == Some(genome_type))
}
