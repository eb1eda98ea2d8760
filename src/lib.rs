//! # VCF Concordance Toolkit
//!
//! Per-sample genotype concordance across several VCF call sets.
//!
//! ## Features
//!
//! - Typed VCF model: INFO/FORMAT declarations, coerced field values, header
//!   merging with sample renumbering, records re-bindable to a merged header
//! - Canonical allele extraction so genotypes compare independently of ALT
//!   order and file of origin
//! - Windowed multi-stream comparison with exact and locus-level (fuzzy)
//!   matching
//! - Transparent gzip/bgzip, bzip2 and xz input
//! - TSV, CSV and JSON reports with per-sample summaries

pub mod analysis;
pub mod concordance;
pub mod config;
pub mod discovery;
pub mod error;
pub mod intersect;
pub mod order;
pub mod output;
pub mod parsers;
pub mod types;
pub mod vcf;

// Re-export key types
pub use analysis::{compare_files, AnalysisResults, ConcordanceCollector, ConcordanceRow};
pub use concordance::{
    ConcordanceSink, EngineOptions, MatchGroup, MatchStrategy, StreamMerger, Window,
};
pub use config::{AppConfig, OrderKind};
pub use discovery::FileDiscovery;
pub use error::{ConcordanceError, ErrorCategory, Result};
pub use order::{ChromosomeOrder, ExplicitOrder, KaryotypeOrder, LexicalOrder};
pub use output::{ReportFormat, ReportGenerator};
pub use parsers::{open_file, LineReader, VcfReader};
pub use types::*;
pub use vcf::{Entry, FieldType, FieldValue, Header};
