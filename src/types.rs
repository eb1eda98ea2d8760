use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConcordanceError, Result};

/// Half-open genomic interval `[begin, end)`, 0-based
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub begin: u64,
    pub end: u64,
}

impl Region {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of shared coordinates; positive iff the intervals overlap
    pub fn overlap(&self, other: &Region) -> u64 {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);
        end.saturating_sub(begin)
    }
}

/// Decoded genotype of one sample: allele indices (0 = reference), one per
/// copy of the chromosome
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenotypeCall {
    indices: Vec<usize>,
    phased: bool,
}

impl GenotypeCall {
    pub fn new(indices: Vec<usize>, phased: bool) -> Self {
        Self { indices, phased }
    }

    /// An empty call (no data)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a `GT` value such as `0/1`, `1|2` or `1`.
    ///
    /// Missing values (`.`, `./.`, `.|.`) and partial calls such as `0/.`
    /// yield an empty call.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "." {
            return Ok(Self::empty());
        }

        let phased = s.contains('|');
        let mut indices = Vec::new();
        for token in s.split(['/', '|']) {
            if token == "." {
                return Ok(Self::empty());
            }
            let idx = token
                .parse()
                .map_err(|_| ConcordanceError::record(format!("Invalid genotype '{}'", s)))?;
            indices.push(idx);
        }

        Ok(Self { indices, phased })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn ploidy(&self) -> usize {
        self.indices.len()
    }

    pub fn is_phased(&self) -> bool {
        self.phased
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn is_homozygous_reference(&self) -> bool {
        !self.is_empty() && self.indices.iter().all(|&i| i == 0)
    }

    pub fn is_homozygous(&self) -> bool {
        !self.is_empty() && self.indices.iter().all(|&i| i == self.indices[0])
    }

    pub fn is_heterozygous(&self) -> bool {
        !self.is_empty() && !self.is_homozygous()
    }
}

impl fmt::Display for GenotypeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.indices.is_empty() {
            return f.write_str(".");
        }
        let sep = if self.phased { "|" } else { "/" };
        let parts: Vec<String> = self.indices.iter().map(|i| i.to_string()).collect();
        f.write_str(&parts.join(sep))
    }
}

/// One concrete variant event, independent of the record or file that
/// produced it. A reference call has `allele == reference`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalAllele {
    pub position: u64,
    pub reference: String,
    pub allele: String,
}

impl CanonicalAllele {
    pub fn new(position: u64, reference: impl Into<String>, allele: impl Into<String>) -> Self {
        Self {
            position,
            reference: reference.into(),
            allele: allele.into(),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.allele == self.reference
    }
}

impl fmt::Display for CanonicalAllele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}>{}", self.position, self.reference, self.allele)
    }
}

/// Sorted multiset of canonical alleles making up one sample's genotype
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlleleSet(Vec<CanonicalAllele>);

impl AlleleSet {
    pub fn new(mut alleles: Vec<CanonicalAllele>) -> Self {
        alleles.sort();
        Self(alleles)
    }

    /// Drop repeated alleles, so `1/1` and `1` compare equal
    pub fn collapse(mut self) -> Self {
        self.0.dedup();
        self
    }

    pub fn alleles(&self) -> &[CanonicalAllele] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalAllele> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_reference_only(&self) -> bool {
        self.0.iter().all(CanonicalAllele::is_reference)
    }
}

impl fmt::Display for AlleleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|a| a.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

/// How many of the expected input streams agree on one allele set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Agreement {
    /// Every stream expected to contain the sample reported it
    Full,
    /// More than one stream, but not all of them
    Partial,
    /// Exactly one stream
    Private,
}

impl Agreement {
    pub fn classify(observed: usize, expected: usize) -> Self {
        if expected <= 1 || observed >= expected {
            Agreement::Full
        } else if observed > 1 {
            Agreement::Partial
        } else {
            Agreement::Private
        }
    }
}

/// Outcome of comparing the alleles reported at one position/reference locus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocusAgreement {
    /// All observing streams report the same alleles
    Match,
    /// Allele sets differ, but some non-reference allele is shared
    Partial,
    /// No non-reference allele is shared between streams
    Mismatch,
    /// Only one stream observed the locus
    Private,
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Agreement::Full => "full",
            Agreement::Partial => "partial",
            Agreement::Private => "private",
        };
        f.write_str(s)
    }
}

impl fmt::Display for LocusAgreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocusAgreement::Match => "match",
            LocusAgreement::Partial => "partial",
            LocusAgreement::Mismatch => "mismatch",
            LocusAgreement::Private => "private",
        };
        f.write_str(s)
    }
}

/// Compression detected on an input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Detect compression from the leading bytes of a stream
    pub fn from_magic(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            Compression::Gzip
        } else if bytes.starts_with(b"BZh") {
            Compression::Bzip2
        } else if bytes.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Compression::Xz
        } else {
            Compression::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_overlap() {
        let a = Region::new(99, 100);
        assert_eq!(a.overlap(&Region::new(99, 101)), 1);
        assert_eq!(a.overlap(&Region::new(100, 101)), 0);
        assert_eq!(Region::new(10, 20).overlap(&Region::new(15, 30)), 5);
        assert_eq!(Region::new(15, 30).overlap(&Region::new(10, 20)), 5);
        assert_eq!(Region::new(10, 20).overlap(&Region::new(30, 40)), 0);
    }

    #[test]
    fn test_genotype_parse() {
        let call = GenotypeCall::parse("0/1").unwrap();
        assert_eq!(call.indices(), &[0, 1]);
        assert!(!call.is_phased());
        assert!(call.is_heterozygous());

        let call = GenotypeCall::parse("2|2").unwrap();
        assert!(call.is_phased());
        assert!(call.is_homozygous());
        assert_eq!(call.to_string(), "2|2");

        assert_eq!(GenotypeCall::parse("1").unwrap().ploidy(), 1);
        assert_eq!(GenotypeCall::parse("0/0/1").unwrap().ploidy(), 3);
        assert!(GenotypeCall::parse("0/0").unwrap().is_homozygous_reference());

        assert!(GenotypeCall::parse("./.").unwrap().is_empty());
        assert!(GenotypeCall::parse(".").unwrap().is_empty());
        assert!(GenotypeCall::parse("0/.").unwrap().is_empty());
        assert!(GenotypeCall::parse("A/T").is_err());
    }

    #[test]
    fn test_allele_set_is_order_independent() {
        let g = CanonicalAllele::new(100, "A", "G");
        let r = CanonicalAllele::new(100, "A", "A");
        let a = AlleleSet::new(vec![g.clone(), r.clone()]);
        let b = AlleleSet::new(vec![r.clone(), g.clone()]);
        assert_eq!(a, b);

        let hom = AlleleSet::new(vec![g.clone(), g.clone()]);
        assert_eq!(hom.len(), 2);
        assert_eq!(hom.collapse().len(), 1);
        assert!(AlleleSet::new(vec![r.clone(), r]).is_reference_only());
    }

    #[test]
    fn test_agreement_classification() {
        assert_eq!(Agreement::classify(2, 2), Agreement::Full);
        assert_eq!(Agreement::classify(2, 3), Agreement::Partial);
        assert_eq!(Agreement::classify(1, 3), Agreement::Private);
        assert_eq!(Agreement::classify(1, 1), Agreement::Full);
    }

    #[test]
    fn test_compression_magic() {
        assert_eq!(Compression::from_magic(&[0x1f, 0x8b, 0x08]), Compression::Gzip);
        assert_eq!(Compression::from_magic(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(
            Compression::from_magic(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            Compression::Xz
        );
        assert_eq!(Compression::from_magic(b"##fileformat"), Compression::None);
    }
}
