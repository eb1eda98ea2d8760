//! Typed VCF model: field declarations and values, the header, records and
//! their canonical alleles.

pub mod alleles;
pub mod entry;
pub mod field;
pub mod header;

pub use alleles::{alleles_for_call, extract_canonical_alleles, reference_allele};
pub use entry::Entry;
pub use field::{Arity, FieldType, FieldValue, ScalarKind, Scalars};
pub use header::Header;
