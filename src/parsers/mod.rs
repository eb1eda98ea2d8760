//! Line-oriented input: compression sniffing, a peekable line source and the
//! VCF and BED readers built on it.

pub mod bed;
pub mod vcf;

pub use bed::{BedReader, BedRecord};
pub use vcf::VcfReader;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use tracing::debug;
use xz2::read::XzDecoder;

use crate::error::Result;
use crate::types::Compression;

/// Open a file for line reading, transparently decompressing gzip (including
/// bgzip), bzip2 and xz input. `-` reads standard input.
pub fn open_file(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let compression = Compression::from_magic(reader.fill_buf()?);
    debug!("Opening {} ({:?})", path.display(), compression);

    Ok(match compression {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(reader))),
        Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(reader))),
        Compression::Xz => Box::new(BufReader::new(XzDecoder::new_multi_decoder(reader))),
    })
}

/// Named line source with one line of lookahead. Blank lines are skipped;
/// line numbers still count them.
pub struct LineReader {
    name: String,
    inner: Box<dyn BufRead>,
    peeked: Option<(u64, String)>,
    lines_read: u64,
    line_number: u64,
}

impl LineReader {
    pub fn new(name: impl Into<String>, inner: Box<dyn BufRead>) -> Self {
        Self {
            name: name.into(),
            inner,
            peeked: None,
            lines_read: 0,
            line_number: 0,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(path.display().to_string(), open_file(path)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based number of the line most recently returned by `next_line`
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    fn read_raw(&mut self) -> Result<Option<(u64, String)>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.inner.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.lines_read += 1;
            let line = buf.trim_end_matches(['\r', '\n']);
            if !line.is_empty() {
                return Ok(Some((self.lines_read, line.to_string())));
            }
        }
    }

    pub fn next_line(&mut self) -> Result<Option<String>> {
        let next = match self.peeked.take() {
            Some(line) => Some(line),
            None => self.read_raw()?,
        };
        Ok(next.map(|(number, line)| {
            self.line_number = number;
            line
        }))
    }

    pub fn peek(&mut self) -> Result<Option<&str>> {
        if self.peeked.is_none() {
            self.peeked = self.read_raw()?;
        }
        Ok(self.peeked.as_ref().map(|(_, line)| line.as_str()))
    }

    pub fn is_eof(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_none())
    }
}

impl std::fmt::Debug for LineReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("name", &self.name)
            .field("line_number", &self.line_number)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn reader(text: &str) -> LineReader {
        LineReader::new("test", Box::new(Cursor::new(text.as_bytes().to_vec())))
    }

    #[test]
    fn test_peek_and_line_numbers() -> Result<()> {
        let mut r = reader("a\n\nb\r\nc");
        assert_eq!(r.peek()?, Some("a"));
        assert_eq!(r.next_line()?.as_deref(), Some("a"));
        assert_eq!(r.line_number(), 1);
        assert_eq!(r.peek()?, Some("b"));
        assert_eq!(r.line_number(), 1);
        assert_eq!(r.next_line()?.as_deref(), Some("b"));
        assert_eq!(r.line_number(), 3);
        assert!(!r.is_eof()?);
        assert_eq!(r.next_line()?.as_deref(), Some("c"));
        assert!(r.is_eof()?);
        assert_eq!(r.next_line()?, None);
        Ok(())
    }

    #[test]
    fn test_open_gzip_and_plain() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "x\ny\n")?;
        let mut r = LineReader::from_path(&plain)?;
        assert_eq!(r.next_line()?.as_deref(), Some("x"));

        let gz = dir.path().join("data.gz");
        let mut enc = flate2::write::GzEncoder::new(
            File::create(&gz)?,
            flate2::Compression::default(),
        );
        enc.write_all(b"first\nsecond\n")?;
        enc.finish()?;
        let mut r = LineReader::from_path(&gz)?;
        assert_eq!(r.next_line()?.as_deref(), Some("first"));
        assert_eq!(r.next_line()?.as_deref(), Some("second"));

        let bz = dir.path().join("data.bz2");
        let mut enc =
            bzip2::write::BzEncoder::new(File::create(&bz)?, bzip2::Compression::default());
        enc.write_all(b"bz line\n")?;
        enc.finish()?;
        let mut r = LineReader::from_path(&bz)?;
        assert_eq!(r.next_line()?.as_deref(), Some("bz line"));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = open_file(Path::new("/nonexistent/input.vcf")).err().unwrap();
        assert_eq!(err.category(), crate::error::ErrorCategory::Io);
    }
}
