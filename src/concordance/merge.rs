//! K-way merge of independently sorted entry streams.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{ConcordanceError, Result};
use crate::order::ChromosomeOrder;
use crate::vcf::Entry;

/// Merges N sorted entry iterators into one sequence of
/// `(stream index, entry)` ordered by (chromosome, start). Ties go to the
/// lower stream index.
pub struct StreamMerger<I> {
    streams: Vec<I>,
    heads: Vec<Option<Entry>>,
    last: Vec<Option<(String, u64)>>,
    order: Arc<dyn ChromosomeOrder>,
    primed: bool,
    refill: Option<usize>,
    failed: bool,
}

impl<I> StreamMerger<I>
where
    I: Iterator<Item = Result<Entry>>,
{
    pub fn new(streams: Vec<I>, order: Arc<dyn ChromosomeOrder>) -> Self {
        let n = streams.len();
        Self {
            streams,
            heads: (0..n).map(|_| None).collect(),
            last: vec![None; n],
            order,
            primed: false,
            refill: None,
            failed: false,
        }
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    fn fill(&mut self, idx: usize) -> Result<()> {
        let next = match self.streams[idx].next() {
            Some(entry) => entry?,
            None => {
                self.heads[idx] = None;
                return Ok(());
            }
        };

        if let Some((chrom, start)) = &self.last[idx] {
            let cmp = self
                .order
                .compare(next.chrom(), chrom)
                .then_with(|| next.start().cmp(start));
            if cmp == Ordering::Less {
                return Err(ConcordanceError::engine(format!(
                    "Input stream {} is not sorted: {}:{} follows {}:{}",
                    idx,
                    next.chrom(),
                    next.pos(),
                    chrom,
                    start + 1
                )));
            }
        }
        self.heads[idx] = Some(next);
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<(usize, Entry)>> {
        if !self.primed {
            for idx in 0..self.streams.len() {
                self.fill(idx)?;
            }
            self.primed = true;
        }
        if let Some(idx) = self.refill.take() {
            self.fill(idx)?;
        }

        let mut best: Option<(usize, &Entry)> = None;
        for (idx, head) in self.heads.iter().enumerate() {
            let Some(entry) = head else { continue };
            let better = match best {
                None => true,
                Some((_, current)) => entry.cmp_with(current, self.order.as_ref()) == Ordering::Less,
            };
            if better {
                best = Some((idx, entry));
            }
        }

        let Some((idx, _)) = best else {
            return Ok(None);
        };
        let Some(entry) = self.heads[idx].take() else {
            return Ok(None);
        };
        self.last[idx] = Some((entry.chrom().to_string(), entry.start()));
        self.refill = Some(idx);
        Ok(Some((idx, entry)))
    }
}

impl<I> Iterator for StreamMerger<I>
where
    I: Iterator<Item = Result<Entry>>,
{
    type Item = Result<(usize, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.advance().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
