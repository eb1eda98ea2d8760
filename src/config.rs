//! Run configuration, loadable from TOML and overridden by command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::concordance::{EngineOptions, MatchStrategy};
use crate::order::{ChromosomeOrder, ExplicitOrder, KaryotypeOrder, LexicalOrder};
use crate::output::ReportFormat;
use crate::vcf::Header;

/// How chromosome names are ordered in the inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Lexical,
    #[default]
    Karyotype,
    /// `##contig` declaration order of the merged header
    Header,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub inputs: Vec<PathBuf>,
    pub recursive: bool,
    pub output: PathBuf,
    pub format: ReportFormat,
    pub matcher: MatchStrategy,
    pub order: OrderKind,
    pub allow_duplicate_samples: bool,
    pub engine: EngineOptions,
    /// 0 = one per CPU
    pub threads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            recursive: false,
            output: PathBuf::from("./reports"),
            format: ReportFormat::default(),
            matcher: MatchStrategy::default(),
            order: OrderKind::default(),
            allow_duplicate_samples: true,
            engine: EngineOptions::default(),
            threads: 0,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Build the chromosome order for a run over `merged`
    pub fn chromosome_order(&self, merged: &Header) -> Arc<dyn ChromosomeOrder> {
        match self.order {
            OrderKind::Lexical => Arc::new(LexicalOrder),
            OrderKind::Karyotype => Arc::new(KaryotypeOrder),
            OrderKind::Header => {
                let order = ExplicitOrder::from_header(merged);
                if order.is_empty() {
                    warn!("No ##contig lines in input headers, falling back to karyotype order");
                    Arc::new(KaryotypeOrder)
                } else {
                    Arc::new(order)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_partial_toml_uses_defaults() -> Result<()> {
        let config = AppConfig::from_toml(
            r#"
            inputs = ["a.vcf", "b.vcf.gz"]
            matcher = "fuzzy"
            format = "json"

            [engine]
            skip_reference_calls = true
            "#,
        )?;
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.matcher, MatchStrategy::Fuzzy);
        assert_eq!(config.format, ReportFormat::Json);
        assert!(config.engine.skip_reference_calls);
        assert!(!config.engine.collapse_duplicate_alleles);
        assert!(config.allow_duplicate_samples);
        assert_eq!(config.order, OrderKind::Karyotype);
        assert_eq!(config.output, PathBuf::from("./reports"));
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_values() {
        assert!(AppConfig::from_toml("matcher = \"approximate\"").is_err());
    }

    #[test]
    fn test_header_order_falls_back() -> Result<()> {
        let mut config = AppConfig {
            order: OrderKind::Header,
            ..Default::default()
        };
        let header = Header::from_lines([
            "##fileformat=VCFv4.1",
            "##contig=<ID=chrB>",
            "##contig=<ID=chrA>",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO",
        ])?;
        let order = config.chromosome_order(&header);
        assert_eq!(order.compare("chrB", "chrA"), Ordering::Less);

        let order = config.chromosome_order(&Header::new());
        assert_eq!(order.compare("2", "10"), Ordering::Less);

        config.order = OrderKind::Lexical;
        let order = config.chromosome_order(&header);
        assert_eq!(order.compare("2", "10"), Ordering::Greater);
        Ok(())
    }
}
