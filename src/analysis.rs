use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::concordance::{ConcordanceSink, MatchGroup, StreamHits, StreamMerger, Window, WindowStats};
use crate::config::AppConfig;
use crate::error::Result;
use crate::parsers::VcfReader;
use crate::types::{Agreement, LocusAgreement};
use crate::vcf::Header;

/// Entries between progress callbacks
const PROGRESS_INTERVAL: u64 = 10_000;

fn stream_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Compare the genotypes of every sample across `inputs`.
///
/// Headers are merged (in input order) to build the global sample list and the
/// expected stream count per sample. `on_progress` receives the running entry
/// count every few thousand records.
pub fn compare_files<F>(
    inputs: &[PathBuf],
    config: &AppConfig,
    mut on_progress: F,
) -> anyhow::Result<AnalysisResults>
where
    F: FnMut(u64),
{
    anyhow::ensure!(!inputs.is_empty(), "No input VCF files given");

    let readers = inputs
        .iter()
        .map(|path| {
            VcfReader::from_path(path)
                .with_context(|| format!("Failed to open VCF file {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let headers: Vec<Arc<Header>> = readers.iter().map(|r| Arc::clone(r.header())).collect();

    let mut merged = Header::new();
    for (path, header) in inputs.iter().zip(&headers) {
        merged
            .merge(header, config.allow_duplicate_samples)
            .with_context(|| format!("Failed to merge header of {}", path.display()))?;
    }
    info!(
        "Comparing {} samples across {} files",
        merged.sample_count(),
        inputs.len()
    );

    let order = config.chromosome_order(&merged);
    let collector = ConcordanceCollector::from_header(
        &merged,
        inputs.iter().map(|p| stream_name(p)).collect(),
    );
    let mut window = Window::new(
        merged.sample_names(),
        &headers,
        Arc::clone(&order),
        config.matcher,
        config.engine,
        collector,
    )?;

    let mut pushed = 0;
    for item in StreamMerger::new(readers, order) {
        let (stream, entry) = item.context("Failed to read merged input records")?;
        window.push(stream, entry)?;
        pushed += 1;
        if pushed % PROGRESS_INTERVAL == 0 {
            on_progress(pushed);
        }
    }
    window.finalize()?;
    on_progress(pushed);

    let stats = window.stats();
    let collector = window.finish()?;
    info!(
        "Processed {} entries in {} windows ({} filtered)",
        stats.entries, stats.flushes, stats.filtered_entries
    );
    Ok(AnalysisResults::new(collector, stats))
}

/// Container for everything a comparison run reports
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub streams: Vec<String>,
    pub rows: Vec<ConcordanceRow>,
    pub summary: Vec<SampleSummary>,
    pub entries: u64,
    pub windows: u64,
    pub filtered_entries: u64,
}

impl AnalysisResults {
    pub fn new(collector: ConcordanceCollector, stats: WindowStats) -> Self {
        let summary = ConcordanceSummary::compute(&collector.sample_names, &collector.rows);
        Self {
            streams: collector.stream_names,
            rows: collector.rows,
            summary: summary.samples,
            entries: stats.entries,
            windows: stats.flushes,
            filtered_entries: stats.filtered_entries,
        }
    }
}

/// One reported group, detached from the window it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcordanceRow {
    pub sample: String,
    pub chrom: String,
    pub position: u64,
    pub reference: String,
    /// Exact groups: the canonical allele set. Locus groups: the alleles seen.
    pub alleles: String,
    /// Reporting streams, `;`-separated
    pub streams: String,
    pub observed: usize,
    pub expected: usize,
    pub agreement: Agreement,
    pub locus_agreement: Option<LocusAgreement>,
}

/// Sink turning matcher groups into [`ConcordanceRow`]s
#[derive(Debug, Clone)]
pub struct ConcordanceCollector {
    sample_names: Vec<String>,
    stream_names: Vec<String>,
    expected: Vec<usize>,
    rows: Vec<ConcordanceRow>,
}

impl ConcordanceCollector {
    /// `expected[i]` is the number of streams expected to contain sample `i`
    pub fn new(sample_names: Vec<String>, stream_names: Vec<String>, expected: Vec<usize>) -> Self {
        Self {
            sample_names,
            stream_names,
            expected,
            rows: Vec::new(),
        }
    }

    /// Expected stream counts taken from a merged header's source counts
    pub fn from_header(merged: &Header, stream_names: Vec<String>) -> Self {
        Self::new(
            merged.sample_names().to_vec(),
            stream_names,
            merged.sample_source_counts().to_vec(),
        )
    }

    pub fn rows(&self) -> &[ConcordanceRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ConcordanceRow> {
        self.rows
    }

    fn stream_label(&self, idx: usize) -> String {
        self.stream_names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| idx.to_string())
    }

    fn labels<'a>(&self, streams: impl Iterator<Item = &'a usize>) -> String {
        streams
            .map(|&s| self.stream_label(s))
            .collect::<Vec<_>>()
            .join(";")
    }

    fn expected_for(&self, sample: usize) -> usize {
        self.expected
            .get(sample)
            .copied()
            .unwrap_or(self.stream_names.len())
    }

    fn sample_name(&self, sample: usize) -> String {
        self.sample_names
            .get(sample)
            .cloned()
            .unwrap_or_else(|| sample.to_string())
    }
}

impl ConcordanceSink for ConcordanceCollector {
    fn accept(&mut self, chrom: &str, group: &MatchGroup<'_>) -> Result<()> {
        let expected = self.expected_for(group.sample());
        let row = match group {
            MatchGroup::Exact(g) => {
                let (position, reference) = g
                    .alleles
                    .alleles()
                    .first()
                    .map(|a| (a.position, a.reference.clone()))
                    .unwrap_or_default();
                ConcordanceRow {
                    sample: self.sample_name(g.sample),
                    chrom: chrom.to_string(),
                    position,
                    reference,
                    alleles: g.alleles.to_string(),
                    streams: self.labels(g.streams.keys()),
                    observed: g.streams.len(),
                    expected,
                    agreement: Agreement::classify(g.streams.len(), expected),
                    locus_agreement: None,
                }
            }
            MatchGroup::Locus(g) => {
                let streams = g.streams();
                let alleles: Vec<String> = g
                    .alleles
                    .iter()
                    .map(|a| format!("{}({})", a.allele, stream_indices(a.streams)))
                    .collect();
                ConcordanceRow {
                    sample: self.sample_name(g.sample),
                    chrom: chrom.to_string(),
                    position: g.position,
                    reference: g.reference.to_string(),
                    alleles: alleles.join(","),
                    streams: self.labels(streams.iter()),
                    observed: streams.len(),
                    expected,
                    agreement: Agreement::classify(streams.len(), expected),
                    locus_agreement: Some(g.agreement),
                }
            }
        };
        self.rows.push(row);
        Ok(())
    }
}

fn stream_indices(streams: &StreamHits<'_>) -> String {
    streams
        .keys()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Per-sample tallies over all reported rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub sample: String,
    pub groups: u64,
    pub full: u64,
    pub partial: u64,
    pub private: u64,
    pub mismatched_loci: u64,
    /// Fraction of groups in full agreement
    pub concordance: f64,
}

impl SampleSummary {
    fn add(&mut self, row: &ConcordanceRow) {
        self.groups += 1;
        match row.agreement {
            Agreement::Full => self.full += 1,
            Agreement::Partial => self.partial += 1,
            Agreement::Private => self.private += 1,
        }
        if row.locus_agreement == Some(LocusAgreement::Mismatch) {
            self.mismatched_loci += 1;
        }
    }

    fn merge(&mut self, other: SampleSummary) {
        self.groups += other.groups;
        self.full += other.full;
        self.partial += other.partial;
        self.private += other.private;
        self.mismatched_loci += other.mismatched_loci;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConcordanceSummary {
    pub samples: Vec<SampleSummary>,
}

impl ConcordanceSummary {
    /// Tally rows per sample, in the order of `sample_names`
    pub fn compute(sample_names: &[String], rows: &[ConcordanceRow]) -> Self {
        let tallies: HashMap<&str, SampleSummary> = rows
            .par_iter()
            .fold(HashMap::new, |mut acc: HashMap<&str, SampleSummary>, row| {
                acc.entry(row.sample.as_str()).or_default().add(row);
                acc
            })
            .reduce(HashMap::new, |mut left, right| {
                for (sample, tally) in right {
                    left.entry(sample).or_default().merge(tally);
                }
                left
            });

        let samples = sample_names
            .iter()
            .map(|name| {
                let mut summary = tallies.get(name.as_str()).cloned().unwrap_or_default();
                summary.sample = name.clone();
                summary.concordance = if summary.groups == 0 {
                    0.0
                } else {
                    summary.full as f64 / summary.groups as f64
                };
                summary
            })
            .collect();

        Self { samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concordance::{EngineOptions, MatchStrategy, Window};
    use crate::order::LexicalOrder;
    use crate::vcf::Entry;
    use std::sync::Arc;

    fn header(samples: &[&str]) -> Header {
        let mut columns = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT".to_string();
        for s in samples {
            columns.push('\t');
            columns.push_str(s);
        }
        let lines = [
            "##fileformat=VCFv4.1".to_string(),
            "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">".to_string(),
            columns,
        ];
        Header::from_lines(lines.iter().map(String::as_str)).unwrap()
    }

    fn run(strategy: MatchStrategy) -> Result<AnalysisResults> {
        let a = Arc::new(header(&["S1", "S2"]));
        let b = Arc::new(header(&["S1"]));
        let c = Arc::new(header(&["S1", "S2"]));
        let mut merged = (*a).clone();
        merged.merge(&b, true)?;
        merged.merge(&c, true)?;
        assert_eq!(merged.sample_source_counts(), &[3, 2]);

        let collector = ConcordanceCollector::from_header(
            &merged,
            vec!["a.vcf".into(), "b.vcf".into(), "c.vcf".into()],
        );
        let mut window = Window::new(
            merged.sample_names(),
            &[a.clone(), b.clone(), c.clone()],
            Arc::new(LexicalOrder),
            strategy,
            EngineOptions::default(),
            collector,
        )?;
        window.push(0, Entry::parse(a, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1\t1/1")?)?;
        window.push(1, Entry::parse(b, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1")?)?;
        window.push(2, Entry::parse(c, "1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1\t1/1")?)?;
        window.finalize()?;
        let stats = window.stats();
        let collector = window.finish()?;
        Ok(AnalysisResults::new(collector, stats))
    }

    #[test]
    fn test_exact_rows_and_summary() -> Result<()> {
        let results = run(MatchStrategy::Exact)?;
        let rows: Vec<(&str, &str, Agreement)> = results
            .rows
            .iter()
            .map(|r| (r.sample.as_str(), r.streams.as_str(), r.agreement))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("S1", "a.vcf;b.vcf", Agreement::Partial),
                ("S1", "c.vcf", Agreement::Private),
                ("S2", "a.vcf", Agreement::Private),
                ("S2", "c.vcf", Agreement::Private),
            ]
        );
        assert_eq!(results.rows[0].position, 100);
        assert_eq!(results.rows[0].reference, "A");
        assert_eq!(results.rows[0].expected, 3);

        let s1 = &results.summary[0];
        assert_eq!((s1.groups, s1.partial, s1.private), (2, 1, 1));
        assert_eq!(results.summary[1].concordance, 0.0);
        assert_eq!(results.windows, 1);
        Ok(())
    }

    #[test]
    fn test_fuzzy_rows() -> Result<()> {
        let results = run(MatchStrategy::Fuzzy)?;
        assert_eq!(results.rows.len(), 2);
        let s1 = &results.rows[0];
        assert_eq!(s1.alleles, "A(0+1+2),G(0+1),T(2)");
        assert_eq!(s1.agreement, Agreement::Full);
        assert_eq!(s1.locus_agreement, Some(LocusAgreement::Partial));
        let s2 = &results.rows[1];
        assert_eq!(s2.locus_agreement, Some(LocusAgreement::Mismatch));
        assert_eq!(results.summary[1].mismatched_loci, 1);
        Ok(())
    }

    #[test]
    fn test_summary_handles_unreported_samples() {
        let summary = ConcordanceSummary::compute(&["X".to_string()], &[]);
        assert_eq!(summary.samples[0].sample, "X");
        assert_eq!(summary.samples[0].groups, 0);
    }
}
