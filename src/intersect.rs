//! Two-way intersection of sorted interval streams.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::order::ChromosomeOrder;
use crate::parsers::BedRecord;

pub trait IntersectionCollector {
    fn hit(&mut self, a: &BedRecord, b: &BedRecord);
    fn miss_a(&mut self, a: &BedRecord);
    fn miss_b(&mut self, b: &BedRecord);
}

/// Tallies hits and misses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountingCollector {
    pub hits: u64,
    pub miss_a: u64,
    pub miss_b: u64,
}

impl IntersectionCollector for CountingCollector {
    fn hit(&mut self, _a: &BedRecord, _b: &BedRecord) {
        self.hits += 1;
    }

    fn miss_a(&mut self, _a: &BedRecord) {
        self.miss_a += 1;
    }

    fn miss_b(&mut self, _b: &BedRecord) {
        self.miss_b += 1;
    }
}

/// Matches records of two sorted streams on identical (chrom, start, end).
/// Repeated keys on either side are all reported against the current partner.
pub struct SnvIntersector<A, B>
where
    A: Iterator<Item = Result<BedRecord>>,
    B: Iterator<Item = Result<BedRecord>>,
{
    a: Peekable<A>,
    b: Peekable<B>,
    order: Arc<dyn ChromosomeOrder>,
}

fn next_record<I>(it: &mut Peekable<I>) -> Result<Option<BedRecord>>
where
    I: Iterator<Item = Result<BedRecord>>,
{
    it.next().transpose()
}

/// Take the next record if it has the same key as `current`
fn next_repeat<I>(
    it: &mut Peekable<I>,
    current: &BedRecord,
    order: &dyn ChromosomeOrder,
) -> Result<Option<BedRecord>>
where
    I: Iterator<Item = Result<BedRecord>>,
{
    let repeat = match it.peek() {
        Some(Ok(peek)) => peek.cmp_with(current, order) == Ordering::Equal,
        Some(Err(_)) => true,
        None => false,
    };
    if repeat {
        next_record(it)
    } else {
        Ok(None)
    }
}

impl<A, B> SnvIntersector<A, B>
where
    A: Iterator<Item = Result<BedRecord>>,
    B: Iterator<Item = Result<BedRecord>>,
{
    pub fn new(a: A, b: B, order: Arc<dyn ChromosomeOrder>) -> Self {
        Self {
            a: a.peekable(),
            b: b.peekable(),
            order,
        }
    }

    pub fn run<C: IntersectionCollector>(mut self, collector: &mut C) -> Result<()> {
        let order = Arc::clone(&self.order);
        let mut a = next_record(&mut self.a)?;
        let mut b = next_record(&mut self.b)?;

        loop {
            let (Some(ra), Some(rb)) = (a.as_ref(), b.as_ref()) else {
                break;
            };
            match ra.cmp_with(rb, order.as_ref()) {
                Ordering::Less => {
                    collector.miss_a(ra);
                    while let Some(rep) = next_repeat(&mut self.a, ra, order.as_ref())? {
                        collector.miss_a(&rep);
                    }
                    a = next_record(&mut self.a)?;
                }
                Ordering::Greater => {
                    collector.miss_b(rb);
                    while let Some(rep) = next_repeat(&mut self.b, rb, order.as_ref())? {
                        collector.miss_b(&rep);
                    }
                    b = next_record(&mut self.b)?;
                }
                Ordering::Equal => {
                    collector.hit(ra, rb);
                    let mut last_a = ra.clone();
                    while let Some(rep) = next_repeat(&mut self.a, ra, order.as_ref())? {
                        collector.hit(&rep, rb);
                        last_a = rep;
                    }
                    while let Some(rep) = next_repeat(&mut self.b, rb, order.as_ref())? {
                        collector.hit(&last_a, &rep);
                    }
                    a = next_record(&mut self.a)?;
                    b = next_record(&mut self.b)?;
                }
            }
        }

        while let Some(ra) = a {
            collector.miss_a(&ra);
            a = next_record(&mut self.a)?;
        }
        while let Some(rb) = b {
            collector.miss_b(&rb);
            b = next_record(&mut self.b)?;
        }
        debug!("Intersection complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::LexicalOrder;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl IntersectionCollector for Log {
        fn hit(&mut self, a: &BedRecord, b: &BedRecord) {
            self.0.push(format!("hit {} {}", a.start, b.extra.join(",")));
        }
        fn miss_a(&mut self, a: &BedRecord) {
            self.0.push(format!("missA {}", a.start));
        }
        fn miss_b(&mut self, b: &BedRecord) {
            self.0.push(format!("missB {}", b.start));
        }
    }

    fn records(starts: &[(u64, &str)]) -> Vec<Result<BedRecord>> {
        starts
            .iter()
            .map(|(start, tag)| {
                let mut r = BedRecord::new("1", *start, start + 1);
                r.extra.push(tag.to_string());
                Ok(r)
            })
            .collect()
    }

    #[test]
    fn test_hits_and_misses() -> Result<()> {
        let a = records(&[(1, "a"), (3, "a"), (5, "a"), (9, "a")]);
        let b = records(&[(3, "b"), (4, "b"), (5, "b"), (10, "b")]);
        let mut log = Log::default();
        SnvIntersector::new(a.into_iter(), b.into_iter(), Arc::new(LexicalOrder)).run(&mut log)?;
        assert_eq!(
            log.0,
            vec![
                "missA 1", "hit 3 b", "missB 4", "hit 5 b", "missA 9", "missB 10"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_repeats_hit_current_partner() -> Result<()> {
        let a = records(&[(3, "a1"), (3, "a2")]);
        let b = records(&[(3, "b1"), (3, "b2"), (7, "b3")]);
        let mut counts = CountingCollector::default();
        SnvIntersector::new(a.into_iter(), b.into_iter(), Arc::new(LexicalOrder))
            .run(&mut counts)?;
        assert_eq!(
            counts,
            CountingCollector {
                hits: 3,
                miss_a: 0,
                miss_b: 1
            }
        );
        Ok(())
    }
}
