//! Grouping strategies applied to the alleles of one flushed window.
//!
//! A matcher is built for a single flush and borrows the window's records, so
//! nothing it reports can outlive the window contents.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AlleleSet, LocusAgreement};
use crate::vcf::Entry;

/// Streams that reported a value, keyed by stream index
pub type StreamHits<'a> = BTreeMap<usize, &'a Entry>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Group by identical allele sets
    #[default]
    Exact,
    /// Group by (position, reference), comparing the alleles found there
    Fuzzy,
}

/// All streams reporting one exact allele set for one sample
#[derive(Debug, Clone)]
pub struct ExactGroup<'a> {
    pub sample: usize,
    pub alleles: &'a AlleleSet,
    pub streams: &'a StreamHits<'a>,
}

/// One allele observed at a locus, with the streams reporting it
#[derive(Debug, Clone)]
pub struct LocusAllele<'a> {
    pub allele: &'a str,
    pub streams: &'a StreamHits<'a>,
}

/// Everything reported for one sample at one (position, reference) locus
#[derive(Debug, Clone)]
pub struct LocusGroup<'a> {
    pub sample: usize,
    pub position: u64,
    pub reference: &'a str,
    pub alleles: Vec<LocusAllele<'a>>,
    pub agreement: LocusAgreement,
}

impl LocusGroup<'_> {
    /// Distinct streams observing the locus
    pub fn streams(&self) -> Vec<usize> {
        let mut streams: Vec<usize> = self
            .alleles
            .iter()
            .flat_map(|a| a.streams.keys().copied())
            .collect();
        streams.sort_unstable();
        streams.dedup();
        streams
    }
}

#[derive(Debug, Clone)]
pub enum MatchGroup<'a> {
    Exact(ExactGroup<'a>),
    Locus(LocusGroup<'a>),
}

impl MatchGroup<'_> {
    pub fn sample(&self) -> usize {
        match self {
            MatchGroup::Exact(g) => g.sample,
            MatchGroup::Locus(g) => g.sample,
        }
    }
}

/// Receives groups as a window is reported. Groups borrow the window's
/// records and are only valid for the duration of the call.
pub trait ConcordanceSink {
    fn accept(&mut self, chrom: &str, group: &MatchGroup<'_>) -> Result<()>;
}

impl<S: ConcordanceSink + ?Sized> ConcordanceSink for &mut S {
    fn accept(&mut self, chrom: &str, group: &MatchGroup<'_>) -> Result<()> {
        (**self).accept(chrom, group)
    }
}

pub trait GenotypeMatcher<'a> {
    fn add(&mut self, sample: usize, alleles: AlleleSet, stream: usize, entry: &'a Entry);

    /// Emit every group to `sink`; returns the number of groups emitted
    fn report(&self, chrom: &str, sink: &mut dyn ConcordanceSink) -> Result<usize>;
}

/// sample -> allele set -> streams
#[derive(Debug)]
pub struct ExactMatcher<'a> {
    index: Vec<HashMap<AlleleSet, StreamHits<'a>>>,
}

impl<'a> ExactMatcher<'a> {
    pub fn new(sample_count: usize) -> Self {
        Self {
            index: (0..sample_count).map(|_| HashMap::new()).collect(),
        }
    }
}

impl<'a> GenotypeMatcher<'a> for ExactMatcher<'a> {
    fn add(&mut self, sample: usize, alleles: AlleleSet, stream: usize, entry: &'a Entry) {
        self.index[sample]
            .entry(alleles)
            .or_default()
            .insert(stream, entry);
    }

    fn report(&self, chrom: &str, sink: &mut dyn ConcordanceSink) -> Result<usize> {
        let mut emitted = 0;
        for (sample, by_alleles) in self.index.iter().enumerate() {
            let mut keys: Vec<&AlleleSet> = by_alleles.keys().collect();
            keys.sort();
            for alleles in keys {
                let group = ExactGroup {
                    sample,
                    alleles,
                    streams: &by_alleles[alleles],
                };
                sink.accept(chrom, &MatchGroup::Exact(group))?;
                emitted += 1;
            }
        }
        Ok(emitted)
    }
}

type LocusKey = (u64, String);

/// sample -> (position, reference) -> allele -> streams
#[derive(Debug)]
pub struct FuzzyMatcher<'a> {
    index: Vec<HashMap<LocusKey, HashMap<String, StreamHits<'a>>>>,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(sample_count: usize) -> Self {
        Self {
            index: (0..sample_count).map(|_| HashMap::new()).collect(),
        }
    }

    fn classify(reference: &str, alleles: &[LocusAllele<'_>]) -> LocusAgreement {
        let mut per_stream: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for a in alleles {
            for &stream in a.streams.keys() {
                per_stream.entry(stream).or_default().push(a.allele);
            }
        }
        if per_stream.len() <= 1 {
            return LocusAgreement::Private;
        }

        for set in per_stream.values_mut() {
            set.sort_unstable();
        }
        let mut sets = per_stream.values();
        let first = sets.next();
        if sets.all(|set| Some(set) == first) {
            return LocusAgreement::Match;
        }

        let shared_variant = alleles
            .iter()
            .any(|a| a.allele != reference && a.streams.len() > 1);
        if shared_variant {
            LocusAgreement::Partial
        } else {
            LocusAgreement::Mismatch
        }
    }
}

impl<'a> GenotypeMatcher<'a> for FuzzyMatcher<'a> {
    fn add(&mut self, sample: usize, alleles: AlleleSet, stream: usize, entry: &'a Entry) {
        let loci = &mut self.index[sample];
        for allele in alleles.alleles() {
            loci.entry((allele.position, allele.reference.clone()))
                .or_default()
                .entry(allele.allele.clone())
                .or_default()
                .insert(stream, entry);
        }
    }

    fn report(&self, chrom: &str, sink: &mut dyn ConcordanceSink) -> Result<usize> {
        let mut emitted = 0;
        for (sample, loci) in self.index.iter().enumerate() {
            let mut keys: Vec<&LocusKey> = loci.keys().collect();
            keys.sort();
            for key in keys {
                let by_allele = &loci[key];
                let mut alleles: Vec<LocusAllele<'_>> = by_allele
                    .iter()
                    .map(|(allele, streams)| LocusAllele {
                        allele: allele.as_str(),
                        streams,
                    })
                    .collect();
                alleles.sort_by(|a, b| a.allele.cmp(b.allele));

                let group = LocusGroup {
                    sample,
                    position: key.0,
                    reference: key.1.as_str(),
                    agreement: Self::classify(&key.1, &alleles),
                    alleles,
                };
                sink.accept(chrom, &MatchGroup::Locus(group))?;
                emitted += 1;
            }
        }
        Ok(emitted)
    }
}
