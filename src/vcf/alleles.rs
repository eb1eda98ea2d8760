//! Translation of genotype indices into canonical alleles.

use crate::error::{ConcordanceError, Result};
use crate::types::{AlleleSet, CanonicalAllele, GenotypeCall};
use crate::vcf::entry::Entry;

/// One canonical allele per ALT, anchored at the 1-based start of the record.
/// Element `k - 1` corresponds to genotype index `k`.
pub fn extract_canonical_alleles(entry: &Entry) -> Vec<CanonicalAllele> {
    let position = entry.start() + 1;
    entry
        .alt()
        .iter()
        .map(|alt| CanonicalAllele::new(position, entry.reference(), alt.as_str()))
        .collect()
}

/// The allele a genotype index `0` maps to
pub fn reference_allele(entry: &Entry) -> CanonicalAllele {
    CanonicalAllele::new(entry.start() + 1, entry.reference(), entry.reference())
}

/// Map every copy of `call` through `alleles` (as returned by
/// [`extract_canonical_alleles`]) into a sorted allele set
pub fn alleles_for_call(
    entry: &Entry,
    alleles: &[CanonicalAllele],
    call: &GenotypeCall,
) -> Result<AlleleSet> {
    let mut out = Vec::with_capacity(call.ploidy());
    for &idx in call.indices() {
        let allele = match idx {
            0 => reference_allele(entry),
            k => alleles.get(k - 1).cloned().ok_or_else(|| {
                ConcordanceError::record(format!(
                    "Genotype allele index {} exceeds {} alternate alleles at {}:{}",
                    k,
                    alleles.len(),
                    entry.chrom(),
                    entry.pos()
                ))
            })?,
        };
        out.push(allele);
    }
    Ok(AlleleSet::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::Header;
    use std::sync::Arc;

    fn entry(line: &str) -> Entry {
        let header = Header::from_lines([
            "##fileformat=VCFv4.1",
            "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1",
        ])
        .unwrap();
        Entry::parse(Arc::new(header), line).unwrap()
    }

    #[test]
    fn test_extract_per_alt() {
        let e = entry("1\t100\t.\tA\tG,T\t.\t.\t.\tGT\t1/2");
        let alleles = extract_canonical_alleles(&e);
        assert_eq!(
            alleles,
            vec![
                CanonicalAllele::new(100, "A", "G"),
                CanonicalAllele::new(100, "A", "T")
            ]
        );
    }

    #[test]
    fn test_call_mapping_is_sorted() -> Result<()> {
        let e = entry("1\t100\t.\tA\tT,G\t.\t.\t.\tGT\t1/2");
        let alleles = extract_canonical_alleles(&e);

        let set = alleles_for_call(&e, &alleles, &e.genotype_for_sample(0)?)?;
        assert_eq!(set.to_string(), "100:A>G,100:A>T");

        let reversed = GenotypeCall::parse("2/1")?;
        assert_eq!(alleles_for_call(&e, &alleles, &reversed)?, set);
        Ok(())
    }

    #[test]
    fn test_reference_copy() -> Result<()> {
        let e = entry("1\t100\t.\tAC\tA\t.\t.\t.\tGT\t0/1");
        let alleles = extract_canonical_alleles(&e);
        let set = alleles_for_call(&e, &alleles, &e.genotype_for_sample(0)?)?;
        assert_eq!(
            set.alleles(),
            &[
                CanonicalAllele::new(100, "AC", "A"),
                CanonicalAllele::new(100, "AC", "AC")
            ]
        );
        assert!(!set.is_reference_only());

        let hom_ref = alleles_for_call(&e, &alleles, &GenotypeCall::parse("0/0")?)?;
        assert!(hom_ref.is_reference_only());
        Ok(())
    }

    #[test]
    fn test_empty_call_and_bad_index() -> Result<()> {
        let e = entry("1\t100\t.\tA\tG\t.\t.\t.\tGT\t./.");
        let alleles = extract_canonical_alleles(&e);
        assert!(alleles_for_call(&e, &alleles, &GenotypeCall::empty())?.is_empty());
        assert!(alleles_for_call(&e, &alleles, &GenotypeCall::parse("0/3")?).is_err());
        Ok(())
    }
}
