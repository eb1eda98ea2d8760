//! Windowed genotype comparison across several position-sorted streams.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::concordance::matcher::{
    ConcordanceSink, ExactMatcher, FuzzyMatcher, GenotypeMatcher, MatchStrategy,
};
use crate::error::{ConcordanceError, Result};
use crate::order::ChromosomeOrder;
use crate::types::Region;
use crate::vcf::{alleles_for_call, extract_canonical_alleles, Entry, Header};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Treat `1/1` as the single allele `1`
    pub collapse_duplicate_alleles: bool,
    /// Ignore samples whose call contains only reference alleles
    pub skip_reference_calls: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Empty,
    Accumulating,
    Finalized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub entries: u64,
    pub flushes: u64,
    pub groups: u64,
    pub filtered_entries: u64,
}

/// Accumulates overlapping records from every stream and reports them through
/// the configured matcher whenever a record falls outside the open region.
pub struct Window<S: ConcordanceSink> {
    sample_count: usize,
    headers: Vec<Arc<Header>>,
    /// [stream][sample] -> column in that stream's header
    sample_map: Vec<Vec<Option<usize>>>,
    strategy: MatchStrategy,
    options: EngineOptions,
    order: Arc<dyn ChromosomeOrder>,
    state: WindowState,
    chrom: String,
    region: Region,
    entries: Vec<Vec<Entry>>,
    last_pushed: Option<(String, u64)>,
    finished_chroms: HashSet<String>,
    stats: WindowStats,
    sink: S,
}

impl<S: ConcordanceSink> Window<S> {
    /// `sample_names` is the global sample list; `headers[i]` is the header
    /// of stream `i`. A sample absent from a stream is never reported for it.
    pub fn new(
        sample_names: &[String],
        headers: &[Arc<Header>],
        order: Arc<dyn ChromosomeOrder>,
        strategy: MatchStrategy,
        options: EngineOptions,
        sink: S,
    ) -> Result<Self> {
        let sample_map = headers
            .iter()
            .map(|header| {
                sample_names
                    .iter()
                    .map(|name| match header.sample_index(name) {
                        Ok(idx) => Ok(Some(idx)),
                        Err(e) if e.is_sample_not_found() => Ok(None),
                        Err(e) => Err(e),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sample_count: sample_names.len(),
            headers: headers.to_vec(),
            sample_map,
            strategy,
            options,
            order,
            state: WindowState::Empty,
            chrom: String::new(),
            region: Region::default(),
            entries: headers.iter().map(|_| Vec::new()).collect(),
            last_pushed: None,
            finished_chroms: HashSet::new(),
            stats: WindowStats::default(),
            sink,
        })
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    pub fn stream_count(&self) -> usize {
        self.entries.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Region of the open window, if any
    pub fn region(&self) -> Option<(&str, Region)> {
        match self.state {
            WindowState::Accumulating => Some((&self.chrom, self.region)),
            _ => None,
        }
    }

    /// Sample columns are read through the stream's header, so the entry
    /// must be bound to it or to one with the same sample columns.
    fn check_schema(&self, stream: usize, entry: &Entry) -> Result<()> {
        let expected = &self.headers[stream];
        if Arc::ptr_eq(entry.header(), expected)
            || entry.header().sample_names() == expected.sample_names()
        {
            return Ok(());
        }
        Err(ConcordanceError::schema(format!(
            "Entry {}:{} pushed to stream {} was parsed under a different header \
             (samples [{}], expected [{}])",
            entry.chrom(),
            entry.pos(),
            stream,
            entry.header().sample_names().join(","),
            expected.sample_names().join(",")
        )))
    }

    fn check_order(&mut self, entry: &Entry) -> Result<()> {
        let Some((chrom, start)) = &self.last_pushed else {
            return Ok(());
        };
        let out_of_order = if entry.chrom() == chrom {
            entry.start() < *start
        } else {
            let cmp = self.order.compare(entry.chrom(), chrom);
            if cmp == Ordering::Equal {
                return Err(ConcordanceError::engine(format!(
                    "Chromosome names '{}' and '{}' denote the same chromosome; \
                     inputs must use one spelling",
                    entry.chrom(),
                    chrom
                )));
            }
            self.finished_chroms.contains(entry.chrom()) || cmp == Ordering::Less
        };
        if out_of_order {
            return Err(ConcordanceError::engine(format!(
                "Out of order push: {}:{} after {}:{}",
                entry.chrom(),
                entry.pos(),
                chrom,
                start + 1
            )));
        }
        if entry.chrom() != chrom {
            self.finished_chroms.insert(chrom.clone());
        }
        Ok(())
    }

    /// Add a record from stream `stream`. Records must arrive in
    /// non-decreasing (chromosome, start) order across all streams, and be
    /// bound to that stream's header (or one with identical sample columns).
    pub fn push(&mut self, stream: usize, entry: Entry) -> Result<()> {
        if self.state == WindowState::Finalized {
            return Err(ConcordanceError::engine(
                "Attempted to push entry after finalization",
            ));
        }
        if stream >= self.entries.len() {
            return Err(ConcordanceError::engine(format!(
                "Unknown stream index {} ({} streams)",
                stream,
                self.entries.len()
            )));
        }
        self.check_schema(stream, &entry)?;
        self.check_order(&entry)?;
        self.last_pushed = Some((entry.chrom().to_string(), entry.start()));

        let span = entry.region();
        let reopen = match self.state {
            WindowState::Empty => true,
            _ => entry.chrom() != self.chrom || self.region.overlap(&span) == 0,
        };
        if reopen {
            self.flush()?;
            if self.chrom != entry.chrom() {
                self.chrom = entry.chrom().to_string();
            }
            self.region = span;
            self.state = WindowState::Accumulating;
        }

        self.region.end = self.region.end.max(span.end);
        self.entries[stream].push(entry);
        self.stats.entries += 1;
        Ok(())
    }

    /// Flush the open window, if any. Further pushes fail.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state != WindowState::Finalized {
            self.flush()?;
            self.state = WindowState::Finalized;
        }
        Ok(())
    }

    /// Feed a merged stream of `(stream, entry)` pairs, then finalize
    pub fn push_all<I>(&mut self, merged: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<(usize, Entry)>>,
    {
        let mut pushed = 0;
        for item in merged {
            let (stream, entry) = item?;
            self.push(stream, entry)?;
            pushed += 1;
        }
        self.finalize()?;
        Ok(pushed)
    }

    /// Finalize and hand back the sink
    pub fn finish(mut self) -> Result<S> {
        self.finalize()?;
        Ok(self.sink)
    }

    fn flush(&mut self) -> Result<()> {
        if self.state != WindowState::Accumulating {
            return Ok(());
        }

        let groups = match self.strategy {
            MatchStrategy::Exact => {
                let mut matcher = ExactMatcher::new(self.sample_count);
                self.stats.filtered_entries += collect_alleles(
                    &self.entries,
                    &self.sample_map,
                    self.options,
                    &mut matcher,
                )?;
                matcher.report(&self.chrom, &mut self.sink)?
            }
            MatchStrategy::Fuzzy => {
                let mut matcher = FuzzyMatcher::new(self.sample_count);
                self.stats.filtered_entries += collect_alleles(
                    &self.entries,
                    &self.sample_map,
                    self.options,
                    &mut matcher,
                )?;
                matcher.report(&self.chrom, &mut self.sink)?
            }
        };

        debug!(
            "Flushed {}:{}-{} ({} entries, {} groups)",
            self.chrom,
            self.region.begin,
            self.region.end,
            self.entries.iter().map(Vec::len).sum::<usize>(),
            groups
        );

        for stream in &mut self.entries {
            stream.clear();
        }
        self.stats.flushes += 1;
        self.stats.groups += groups as u64;
        self.state = WindowState::Empty;
        Ok(())
    }
}

/// Hand every usable (sample, allele set) of the window to `matcher`.
/// Returns the number of records skipped as filtered.
fn collect_alleles<'a>(
    entries: &'a [Vec<Entry>],
    sample_map: &[Vec<Option<usize>>],
    options: EngineOptions,
    matcher: &mut dyn GenotypeMatcher<'a>,
) -> Result<u64> {
    let mut filtered = 0;
    for (stream, stream_entries) in entries.iter().enumerate() {
        for entry in stream_entries {
            if entry.is_filtered() {
                trace!(
                    "Skipping filtered entry {}:{} in stream {}",
                    entry.chrom(),
                    entry.pos(),
                    stream
                );
                filtered += 1;
                continue;
            }

            let alleles = extract_canonical_alleles(entry);
            if alleles.is_empty() {
                continue;
            }

            for (sample, column) in sample_map[stream].iter().enumerate() {
                let Some(column) = *column else {
                    continue;
                };
                if entry.is_sample_filtered(column) {
                    continue;
                }

                let call = entry.genotype_for_sample(column)?;
                let mut set = alleles_for_call(entry, &alleles, &call)?;
                if options.collapse_duplicate_alleles {
                    set = set.collapse();
                }
                if set.is_empty() || (options.skip_reference_calls && set.is_reference_only()) {
                    continue;
                }
                matcher.add(sample, set, stream, entry);
            }
        }
    }
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concordance::matcher::MatchGroup;
    use crate::error::ErrorCategory;
    use crate::order::{KaryotypeOrder, LexicalOrder};
    use crate::types::LocusAgreement;

    #[derive(Debug, Default, PartialEq)]
    struct Recorder {
        groups: Vec<(String, usize, String, Vec<usize>)>,
        loci: Vec<(usize, u64, LocusAgreement)>,
    }

    impl ConcordanceSink for Recorder {
        fn accept(&mut self, chrom: &str, group: &MatchGroup<'_>) -> Result<()> {
            match group {
                MatchGroup::Exact(g) => self.groups.push((
                    chrom.to_string(),
                    g.sample,
                    g.alleles.to_string(),
                    g.streams.keys().copied().collect(),
                )),
                MatchGroup::Locus(g) => self.loci.push((g.sample, g.position, g.agreement)),
            }
            Ok(())
        }
    }

    fn header(samples: &[&str]) -> Arc<Header> {
        let mut columns = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT".to_string();
        for s in samples {
            columns.push('\t');
            columns.push_str(s);
        }
        let lines = [
            "##fileformat=VCFv4.1".to_string(),
            "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">".to_string(),
            "##FORMAT=<ID=FT,Number=1,Type=String,Description=\"Filter\">".to_string(),
            columns,
        ];
        Arc::new(Header::from_lines(lines.iter().map(String::as_str)).unwrap())
    }

    fn entry(h: &Arc<Header>, line: &str) -> Entry {
        Entry::parse(Arc::clone(h), line).unwrap()
    }

    fn window(
        headers: &[Arc<Header>],
        samples: &[&str],
        strategy: MatchStrategy,
        options: EngineOptions,
    ) -> Window<Recorder> {
        let names: Vec<String> = samples.iter().map(|s| s.to_string()).collect();
        Window::new(
            &names,
            headers,
            Arc::new(LexicalOrder),
            strategy,
            options,
            Recorder::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_full_agreement() -> Result<()> {
        let (a, b) = (header(&["S"]), header(&["S"]));
        let mut w = window(
            &[a.clone(), b.clone()],
            &["S"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        w.push(0, entry(&a, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t1/1"))?;
        w.push(1, entry(&b, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t1/1"))?;
        let rec = w.finish()?;
        assert_eq!(
            rec.groups,
            vec![("1".to_string(), 0, "100:A>G,100:A>G".to_string(), vec![0, 1])]
        );
        Ok(())
    }

    #[test]
    fn test_discordant_alts() -> Result<()> {
        let (a, b) = (header(&["S"]), header(&["S"]));
        let mut w = window(
            &[a.clone(), b.clone()],
            &["S"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        w.push(0, entry(&a, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1"))?;
        w.push(1, entry(&b, "1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1"))?;
        let rec = w.finish()?;
        assert_eq!(rec.groups.len(), 2);
        assert_eq!(rec.groups[0].2, "100:A>A,100:A>G");
        assert_eq!(rec.groups[0].3, vec![0]);
        assert_eq!(rec.groups[1].2, "100:A>A,100:A>T");
        assert_eq!(rec.groups[1].3, vec![1]);
        Ok(())
    }

    #[test]
    fn test_out_of_order_push() {
        let h = header(&["S"]);
        let mut w = window(
            &[h.clone()],
            &["S"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        w.push(0, entry(&h, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1"))
            .unwrap();
        let err = w
            .push(0, entry(&h, "1\t50\t.\tA\tG\t.\t.\t.\tGT\t0/1"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::EngineState);
    }

    #[test]
    fn test_revisited_chromosome_is_out_of_order() {
        let h = header(&["S"]);
        let names = vec!["S".to_string()];
        let mut w = Window::new(
            &names,
            &[h.clone()],
            Arc::new(KaryotypeOrder),
            MatchStrategy::Exact,
            EngineOptions::default(),
            Recorder::default(),
        )
        .unwrap();
        w.push(0, entry(&h, "2\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1")).unwrap();
        w.push(0, entry(&h, "10\t5\t.\tA\tG\t.\t.\t.\tGT\t0/1")).unwrap();
        assert!(w.push(0, entry(&h, "2\t200\t.\tA\tG\t.\t.\t.\tGT\t0/1")).is_err());
        assert!(w.push(0, entry(&h, "1\t200\t.\tA\tG\t.\t.\t.\tGT\t0/1")).is_err());
    }

    #[test]
    fn test_entry_from_another_header_is_rejected() -> Result<()> {
        let stream_header = header(&["S1", "S2"]);
        let swapped = header(&["S2", "S1"]);
        let mut w = window(
            &[stream_header.clone()],
            &["S1", "S2"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        let err = w
            .push(0, entry(&swapped, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t1/1\t0/1"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Schema);
        assert_eq!(w.stats().entries, 0);
        assert_eq!(w.state(), WindowState::Empty);

        // an independently parsed header with the same columns is accepted
        let same_columns = header(&["S1", "S2"]);
        w.push(0, entry(&same_columns, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1\t1/1"))?;
        let rec = w.finish()?;
        assert_eq!(
            rec.groups
                .iter()
                .map(|g| (g.1, g.2.as_str()))
                .collect::<Vec<_>>(),
            vec![(0, "100:A>A,100:A>G"), (1, "100:A>G,100:A>G")]
        );
        Ok(())
    }

    #[test]
    fn test_mixed_chromosome_spellings_are_rejected() {
        let h = header(&["S"]);
        let names = vec!["S".to_string()];
        let mut w = Window::new(
            &names,
            &[h.clone()],
            Arc::new(KaryotypeOrder),
            MatchStrategy::Exact,
            EngineOptions::default(),
            Recorder::default(),
        )
        .unwrap();
        w.push(0, entry(&h, "chr1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1")).unwrap();
        let err = w
            .push(0, entry(&h, "1\t50\t.\tA\tG\t.\t.\t.\tGT\t0/1"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::EngineState);
    }

    #[test]
    fn test_push_after_finalize() -> Result<()> {
        let h = header(&["S"]);
        let mut w = window(
            &[h.clone()],
            &["S"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        w.push(0, entry(&h, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1"))?;
        w.finalize()?;
        w.finalize()?;
        assert_eq!(w.stats().flushes, 1);
        let err = w
            .push(0, entry(&h, "1\t200\t.\tA\tG\t.\t.\t.\tGT\t0/1"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::EngineState);
        assert!(w.push(3, entry(&h, "1\t200\t.\tA\tG\t.\t.\t.\tGT\t0/1")).is_err());
        Ok(())
    }

    #[test]
    fn test_windows_extend_and_flush_on_gap() -> Result<()> {
        let h = header(&["S"]);
        let mut w = window(
            &[h.clone()],
            &["S"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        // deletion spanning 100..104 absorbs the SNV at 103
        w.push(0, entry(&h, "1\t100\t.\tACGT\tA\t.\t.\t.\tGT\t0/1"))?;
        w.push(0, entry(&h, "1\t103\t.\tT\tC\t.\t.\t.\tGT\t0/1"))?;
        assert_eq!(w.region(), Some(("1", Region::new(99, 103))));
        assert_eq!(w.stats().flushes, 0);

        // adjacent, not overlapping
        w.push(0, entry(&h, "1\t104\t.\tG\tC\t.\t.\t.\tGT\t0/1"))?;
        assert_eq!(w.stats().flushes, 1);
        assert_eq!(w.region(), Some(("1", Region::new(103, 104))));

        // same position on another chromosome
        w.push(0, entry(&h, "2\t104\t.\tG\tC\t.\t.\t.\tGT\t0/1"))?;
        assert_eq!(w.stats().flushes, 2);
        let rec = w.finish()?;
        let chroms: Vec<&str> = rec.groups.iter().map(|g| g.0.as_str()).collect();
        assert_eq!(chroms, vec!["1", "1", "1", "2"]);
        Ok(())
    }

    #[test]
    fn test_skips_filtered_records_samples_and_no_calls() -> Result<()> {
        let h = header(&["S1", "S2", "S3"]);
        let mut w = window(
            &[h.clone()],
            &["S1", "S2", "S3"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        w.push(0, entry(&h, "1\t100\t.\tA\tG\t.\tq10\t.\tGT\t0/1\t0/1\t0/1"))?;
        w.push(0, entry(&h, "1\t200\t.\tA\t.\t.\t.\t.\tGT\t0/0\t0/0\t0/0"))?;
        w.push(
            0,
            entry(&h, "1\t300\t.\tA\tG\t.\t.\t.\tGT:FT\t0/1:PASS\t0/1:lowGQ\t./.:."),
        )?;
        assert_eq!(w.stats().filtered_entries, 1);
        let rec = w.finish()?;
        assert_eq!(rec.groups.len(), 1);
        assert_eq!(rec.groups[0].1, 0);
        Ok(())
    }

    #[test]
    fn test_samples_missing_from_a_stream() -> Result<()> {
        let (a, b) = (header(&["S1", "S2"]), header(&["S2"]));
        let mut w = window(
            &[a.clone(), b.clone()],
            &["S1", "S2"],
            MatchStrategy::Exact,
            EngineOptions::default(),
        );
        w.push(0, entry(&a, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1\t1/1"))?;
        w.push(1, entry(&b, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t1/1"))?;
        let rec = w.finish()?;
        assert_eq!(
            rec.groups
                .iter()
                .map(|g| (g.1, g.3.clone()))
                .collect::<Vec<_>>(),
            vec![(0, vec![0]), (1, vec![0, 1])]
        );
        Ok(())
    }

    #[test]
    fn test_options_collapse_and_skip_reference() -> Result<()> {
        let (a, b) = (header(&["S1", "S2"]), header(&["S1", "S2"]));
        let options = EngineOptions {
            collapse_duplicate_alleles: true,
            skip_reference_calls: true,
        };
        let mut w = window(&[a.clone(), b.clone()], &["S1", "S2"], MatchStrategy::Exact, options);
        w.push(0, entry(&a, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t1/1\t0/0"))?;
        w.push(1, entry(&b, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t1\t0/0"))?;
        let rec = w.finish()?;
        assert_eq!(
            rec.groups,
            vec![("1".to_string(), 0, "100:A>G".to_string(), vec![0, 1])]
        );
        Ok(())
    }

    #[test]
    fn test_exact_output_is_deterministic() -> Result<()> {
        let run = || -> Result<Recorder> {
            let (a, b) = (header(&["S1", "S2"]), header(&["S2", "S1"]));
            let mut w = window(
                &[a.clone(), b.clone()],
                &["S1", "S2"],
                MatchStrategy::Exact,
                EngineOptions::default(),
            );
            w.push(0, entry(&a, "1\t100\t.\tA\tG,C\t.\t.\t.\tGT\t0/1\t1/2"))?;
            w.push(1, entry(&b, "1\t100\t.\tA\tC,G\t.\t.\t.\tGT\t2/1\t0/2"))?;
            w.push(0, entry(&a, "1\t150\t.\tT\tA\t.\t.\t.\tGT\t1/1\t0/1"))?;
            w.finish()
        };
        let first = run()?;
        assert_eq!(first, run()?);
        // both streams agree on both samples at 100 despite ALT order
        assert_eq!(first.groups[0].3, vec![0, 1]);
        assert_eq!(first.groups[1].3, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_fuzzy_strategy_reports_loci() -> Result<()> {
        let (a, b) = (header(&["S"]), header(&["S"]));
        let mut w = window(
            &[a.clone(), b.clone()],
            &["S"],
            MatchStrategy::Fuzzy,
            EngineOptions::default(),
        );
        w.push(0, entry(&a, "1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1"))?;
        w.push(1, entry(&b, "1\t100\t.\tA\tT\t.\t.\t.\tGT\t0/1"))?;
        w.push(0, entry(&a, "1\t200\t.\tC\tT\t.\t.\t.\tGT\t0/1"))?;
        w.push(1, entry(&b, "1\t200\t.\tC\tT\t.\t.\t.\tGT\t1/0"))?;
        let rec = w.finish()?;
        assert!(rec.groups.is_empty());
        assert_eq!(
            rec.loci,
            vec![
                (0, 100, LocusAgreement::Mismatch),
                (0, 200, LocusAgreement::Match)
            ]
        );
        Ok(())
    }
}
