use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::parsers::LineReader;
use crate::vcf::{Entry, Header};

/// Streaming VCF reader: the header is read eagerly, records lazily
pub struct VcfReader {
    lines: LineReader,
    header: Arc<Header>,
}

impl VcfReader {
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(LineReader::from_path(path)?)
    }

    /// Consume every leading `#` line into the header
    pub fn new(mut lines: LineReader) -> Result<Self> {
        let mut header = Header::new();
        while lines.peek()?.is_some_and(|l| l.starts_with('#')) {
            if let Some(line) = lines.next_line()? {
                header.add(&line)?;
            }
        }
        header.assert_valid()?;

        debug!(
            "Read header of {}: {} samples, {} INFO, {} FORMAT",
            lines.name(),
            header.sample_count(),
            header.info_types().len(),
            header.format_types().len()
        );

        Ok(Self {
            lines,
            header: Arc::new(header),
        })
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn name(&self) -> &str {
        self.lines.name()
    }

    /// Next record, or `None` at end of input
    pub fn read_entry(&mut self) -> Result<Option<Entry>> {
        let Some(line) = self.lines.next_line()? else {
            return Ok(None);
        };
        Entry::parse(Arc::clone(&self.header), &line)
            .map(Some)
            .map_err(|e| e.at_line(self.lines.line_number()))
    }
}

impl Iterator for VcfReader {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConcordanceError, ErrorCategory};
    use std::io::Cursor;

    const VCF: &str = "##fileformat=VCFv4.1\n\
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n\
1\t100\t.\tA\tG\t.\t.\t.\tGT\t0/1\n\
\n\
1\t200\t.\tC\tT\t.\t.\t.\tGT\t1/1\n\
1\tbad\t.\tC\tT\t.\t.\t.\tGT\t1/1\n";

    fn reader(text: &str) -> Result<VcfReader> {
        VcfReader::new(LineReader::new(
            "mem",
            Box::new(Cursor::new(text.as_bytes().to_vec())),
        ))
    }

    #[test]
    fn test_reads_header_then_entries() -> Result<()> {
        let mut r = reader(VCF)?;
        assert_eq!(r.header().sample_names(), &["S1"]);

        let first = r.next().unwrap()?;
        assert_eq!(first.pos(), 100);
        assert!(Arc::ptr_eq(first.header(), r.header()));
        assert_eq!(r.next().unwrap()?.pos(), 200);

        match r.next().unwrap() {
            Err(ConcordanceError::RecordParse { line, .. }) => assert_eq!(line, Some(7)),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(r.next().is_none());
        Ok(())
    }

    #[test]
    fn test_schema_and_coercion_errors_carry_line() -> Result<()> {
        let text = "##fileformat=VCFv4.1\n\
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
1\t100\t.\tA\tG\t.\t.\tXX=1\n\
1\t200\t.\tA\tG\t.\t.\tDP=deep\n";
        let mut r = reader(text)?;

        let err = r.next().unwrap().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Schema);
        assert_eq!(err.line(), Some(4));
        assert!(err.to_string().starts_with("Line 4: "));

        let err = r.next().unwrap().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Coercion);
        assert_eq!(err.line(), Some(5));
        Ok(())
    }

    #[test]
    fn test_missing_column_header() {
        assert!(reader("##fileformat=VCFv4.1\n1\t100\t.\tA\tG\t.\t.\t.\n").is_err());
    }
}
