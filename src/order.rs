//! Chromosome ordering.
//!
//! Input files are sorted by chromosome in an order the caller knows
//! (karyotype, reference dictionary, plain string order). The merge driver and
//! the concordance window both take the order as a [`ChromosomeOrder`] so they
//! agree on what "sorted" means.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::vcf::Header;

pub trait ChromosomeOrder: Debug + Send + Sync {
    /// `Equal` for two different names means they denote the same
    /// chromosome. The window rejects inputs that mix such spellings.
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Plain byte-wise string order
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOrder;

impl ChromosomeOrder for LexicalOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

/// Human karyotype order: 1..22 numerically, X, Y, M/MT, then everything
/// else lexically. A leading `chr` is ignored, so `chr1` and `1` compare
/// `Equal`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KaryotypeOrder;

impl KaryotypeOrder {
    fn key(name: &str) -> (u8, u64, &str) {
        let bare = ["chr", "Chr", "CHR"]
            .iter()
            .find_map(|p| name.strip_prefix(p))
            .unwrap_or(name);

        if let Ok(n) = bare.parse::<u64>() {
            return (0, n, "");
        }
        match bare {
            "X" => (1, 0, ""),
            "Y" => (2, 0, ""),
            "M" | "MT" => (3, 0, ""),
            _ => (4, 0, name),
        }
    }
}

impl ChromosomeOrder for KaryotypeOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        Self::key(a).cmp(&Self::key(b))
    }
}

/// Order given by an explicit list, typically the `##contig` lines of a
/// header. Names not in the list sort after all listed ones, lexically.
#[derive(Debug, Clone, Default)]
pub struct ExplicitOrder {
    ranks: HashMap<String, usize>,
}

impl ExplicitOrder {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranks = HashMap::new();
        for name in names {
            let next = ranks.len();
            ranks.entry(name.into()).or_insert(next);
        }
        Self { ranks }
    }

    pub fn from_header(header: &Header) -> Self {
        Self::new(header.contigs().iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl ChromosomeOrder for ExplicitOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        match (self.ranks.get(a), self.ranks.get(b)) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_karyotype_order() {
        let order = KaryotypeOrder;
        let mut names = vec!["chrX", "10", "2", "MT", "chr1", "Y", "GL000192.1", "22"];
        names.sort_by(|a, b| order.compare(a, b));
        assert_eq!(
            names,
            vec!["chr1", "2", "10", "22", "chrX", "Y", "MT", "GL000192.1"]
        );
    }

    #[test]
    fn test_lexical_differs_from_karyotype() {
        assert_eq!(LexicalOrder.compare("10", "2"), Ordering::Less);
        assert_eq!(KaryotypeOrder.compare("10", "2"), Ordering::Greater);
    }

    #[test]
    fn test_explicit_order() {
        let order = ExplicitOrder::new(["3", "1", "2"]);
        assert_eq!(order.compare("3", "1"), Ordering::Less);
        assert_eq!(order.compare("2", "unplaced"), Ordering::Less);
        assert_eq!(order.compare("b", "a"), Ordering::Greater);
        assert_eq!(order.len(), 3);
    }
}
