use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

use crate::error::{ConcordanceError, Result};
use crate::order::ChromosomeOrder;
use crate::parsers::LineReader;
use crate::types::Region;

/// One BED interval: 0-based half-open coordinates plus any extra columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub extra: Vec<String>,
}

impl BedRecord {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
            extra: Vec::new(),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let mut cols = line.split('\t');
        let (Some(chrom), Some(start), Some(end)) = (cols.next(), cols.next(), cols.next()) else {
            return Err(ConcordanceError::record(format!(
                "BED line has fewer than 3 columns: {}",
                line
            )));
        };
        let coord = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| ConcordanceError::record(format!("Invalid BED coordinate: {}", s)))
        };
        let (start, end) = (coord(start)?, coord(end)?);
        if end < start {
            return Err(ConcordanceError::record(format!(
                "BED end {} precedes start {}",
                end, start
            )));
        }

        Ok(Self {
            chrom: chrom.to_string(),
            start,
            end,
            extra: cols.map(str::to_string).collect(),
        })
    }

    pub fn region(&self) -> Region {
        Region::new(self.start, self.end)
    }

    /// Order by (chromosome, start, end)
    pub fn cmp_with(&self, other: &BedRecord, order: &dyn ChromosomeOrder) -> Ordering {
        order
            .compare(&self.chrom, &other.chrom)
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.end.cmp(&other.end))
    }
}

impl fmt::Display for BedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.chrom, self.start, self.end)?;
        for col in &self.extra {
            write!(f, "\t{}", col)?;
        }
        Ok(())
    }
}

/// BED reader skipping `#`, `track` and `browser` lines
pub struct BedReader {
    lines: LineReader,
}

impl BedReader {
    pub fn new(lines: LineReader) -> Self {
        Self { lines }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(LineReader::from_path(path)?))
    }

    pub fn read_record(&mut self) -> Result<Option<BedRecord>> {
        while let Some(line) = self.lines.next_line()? {
            if line.starts_with('#') || line.starts_with("track") || line.starts_with("browser") {
                continue;
            }
            return BedRecord::parse(&line)
                .map(Some)
                .map_err(|e| e.at_line(self.lines.line_number()));
        }
        Ok(None)
    }
}

impl Iterator for BedReader {
    type Item = Result<BedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
