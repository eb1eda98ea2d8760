use anyhow::{Context, Result};
use chrono::Local;
use csv::{Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use serde_json::to_string_pretty;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::analysis::{AnalysisResults, ConcordanceRow, SampleSummary};

/// Supported report formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Tsv,
    Csv,
    Json,
    All,
}

const ROW_HEADER: [&str; 10] = [
    "sample",
    "chrom",
    "position",
    "reference",
    "alleles",
    "streams",
    "observed",
    "expected",
    "agreement",
    "locus_agreement",
];

const SUMMARY_HEADER: [&str; 7] = [
    "sample",
    "groups",
    "full",
    "partial",
    "private",
    "mismatched_loci",
    "concordance",
];

fn row_record(row: &ConcordanceRow) -> [String; 10] {
    [
        row.sample.clone(),
        row.chrom.clone(),
        row.position.to_string(),
        row.reference.clone(),
        row.alleles.clone(),
        row.streams.clone(),
        row.observed.to_string(),
        row.expected.to_string(),
        row.agreement.to_string(),
        row.locus_agreement
            .map(|a| a.to_string())
            .unwrap_or_else(|| ".".to_string()),
    ]
}

fn summary_record(summary: &SampleSummary) -> [String; 7] {
    [
        summary.sample.clone(),
        summary.groups.to_string(),
        summary.full.to_string(),
        summary.partial.to_string(),
        summary.private.to_string(),
        summary.mismatched_loci.to_string(),
        format!("{:.4}", summary.concordance),
    ]
}

/// Report generator for comparison results
pub struct ReportGenerator {
    output_dir: PathBuf,
    timestamp: String,
}

impl ReportGenerator {
    pub fn new(output_dir: &Path) -> Result<Self> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).with_context(|| {
                format!("Failed to create output directory {}", output_dir.display())
            })?;
        }

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            timestamp: Local::now().format("%Y-%m-%d_%H-%M-%S").to_string(),
        })
    }

    /// Generate reports in specified format(s); returns the files written
    pub fn generate(&self, results: &AnalysisResults, format: ReportFormat) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        match format {
            ReportFormat::Tsv => written.extend(self.generate_delimited(results, b'\t', "tsv")?),
            ReportFormat::Csv => written.extend(self.generate_delimited(results, b',', "csv")?),
            ReportFormat::Json => written.push(self.generate_json_report(results)?),
            ReportFormat::All => {
                written.extend(self.generate_delimited(results, b'\t', "tsv")?);
                written.extend(self.generate_delimited(results, b',', "csv")?);
                written.push(self.generate_json_report(results)?);
            }
        }

        Ok(written)
    }

    fn path_for(&self, stem: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", stem, self.timestamp, ext))
    }

    fn generate_delimited(
        &self,
        results: &AnalysisResults,
        delimiter: u8,
        ext: &str,
    ) -> Result<Vec<PathBuf>> {
        let rows_path = self.path_for("concordance", ext);
        let mut wtr = Self::writer(&rows_path, delimiter)?;
        wtr.write_record(ROW_HEADER)?;
        for row in &results.rows {
            wtr.write_record(row_record(row))?;
        }
        wtr.flush()?;

        let summary_path = self.path_for("summary", ext);
        let mut wtr = Self::writer(&summary_path, delimiter)?;
        wtr.write_record(SUMMARY_HEADER)?;
        for summary in &results.summary {
            wtr.write_record(summary_record(summary))?;
        }
        wtr.flush()?;

        Ok(vec![rows_path, summary_path])
    }

    fn writer(path: &Path, delimiter: u8) -> Result<Writer<fs::File>> {
        WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .with_context(|| format!("Failed to create writer for {}", path.display()))
    }

    fn generate_json_report(&self, results: &AnalysisResults) -> Result<PathBuf> {
        let path = self.path_for("report", "json");

        let json_content =
            to_string_pretty(results).with_context(|| "Failed to serialize results to JSON")?;

        fs::write(&path, json_content)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))?;

        Ok(path)
    }

    /// Write the per-sample summary as an aligned table
    pub fn print_summary<W: Write>(results: &AnalysisResults, out: &mut W) -> Result<()> {
        writeln!(
            out,
            "{:<20} {:>8} {:>8} {:>8} {:>8} {:>12}",
            "sample", "groups", "full", "partial", "private", "concordance"
        )?;
        for s in &results.summary {
            writeln!(
                out,
                "{:<20} {:>8} {:>8} {:>8} {:>8} {:>11.2}%",
                s.sample,
                s.groups,
                s.full,
                s.partial,
                s.private,
                s.concordance * 100.0
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Agreement, LocusAgreement};

    fn results() -> AnalysisResults {
        AnalysisResults {
            streams: vec!["a.vcf".into(), "b.vcf".into()],
            rows: vec![ConcordanceRow {
                sample: "S1".into(),
                chrom: "1".into(),
                position: 100,
                reference: "A".into(),
                alleles: "A(0),G(0+1)".into(),
                streams: "a.vcf;b.vcf".into(),
                observed: 2,
                expected: 2,
                agreement: Agreement::Full,
                locus_agreement: Some(LocusAgreement::Partial),
            }],
            summary: vec![SampleSummary {
                sample: "S1".into(),
                groups: 1,
                full: 1,
                concordance: 1.0,
                ..Default::default()
            }],
            entries: 2,
            windows: 1,
            filtered_entries: 0,
        }
    }

    #[test]
    fn test_writes_all_formats() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("reports");
        let generator = ReportGenerator::new(&out)?;
        let files = generator.generate(&results(), ReportFormat::All)?;
        assert_eq!(files.len(), 5);
        assert!(files.iter().all(|f| f.exists()));

        let tsv = fs::read_to_string(&files[0])?;
        let mut lines = tsv.lines();
        assert_eq!(lines.next(), Some(ROW_HEADER.join("\t").as_str()));
        assert_eq!(
            lines.next(),
            Some("S1\t1\t100\tA\tA(0),G(0+1)\ta.vcf;b.vcf\t2\t2\tfull\tpartial")
        );

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&files[4])?)?;
        assert_eq!(json["rows"][0]["agreement"], "Full");
        assert_eq!(json["summary"][0]["full"], 1);
        Ok(())
    }

    #[test]
    fn test_print_summary() -> Result<()> {
        let mut buf = Vec::new();
        ReportGenerator::print_summary(&results(), &mut buf)?;
        let text = String::from_utf8(buf)?;
        assert!(text.contains("S1"));
        assert!(text.contains("100.00%"));
        Ok(())
    }
}
