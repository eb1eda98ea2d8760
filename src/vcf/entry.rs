//! A single VCF data line bound to the header it was parsed under.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConcordanceError, Result};
use crate::order::ChromosomeOrder;
use crate::types::{GenotypeCall, Region};
use crate::vcf::field::{FieldType, FieldValue, ScalarKind};
use crate::vcf::header::Header;

/// FORMAT key holding the genotype
pub const GENOTYPE_KEY: &str = "GT";
/// FORMAT key holding the per-sample filter
pub const SAMPLE_FILTER_KEY: &str = "FT";
/// FORMAT key holding per-sample read depth
pub const DEPTH_KEY: &str = "DP";

const FIXED_FIELDS: usize = 8;

/// One variant record. The header is shared, never copied.
#[derive(Debug, Clone)]
pub struct Entry {
    header: Arc<Header>,
    chrom: String,
    pos: u64,
    identifiers: Vec<String>,
    reference: String,
    alt: Vec<String>,
    qual: Option<f64>,
    failed_filters: Vec<String>,
    /// INFO fields in the order they were written
    info: Vec<(String, FieldValue)>,
    format: Vec<Arc<FieldType>>,
    sample_data: Vec<Vec<FieldValue>>,
}

fn split_list(s: &str, delim: char) -> Vec<String> {
    if s == "." || s.is_empty() {
        return Vec::new();
    }
    s.split(delim).map(str::to_string).collect()
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[String], delim: &str) -> fmt::Result {
    if values.is_empty() {
        f.write_str(".")
    } else {
        f.write_str(&values.join(delim))
    }
}

impl Entry {
    /// Parse one tab-delimited data line under `header`
    pub fn parse(header: Arc<Header>, line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let cols: Vec<&str> = line.split('\t').collect();
        let n_samples = header.sample_count();

        let column_count_ok = match cols.len() {
            FIXED_FIELDS | 9 => n_samples == 0,
            n => n == FIXED_FIELDS + 1 + n_samples,
        };
        if !column_count_ok {
            return Err(ConcordanceError::record(format!(
                "Expected {} columns for {} samples, found {}",
                if n_samples == 0 {
                    FIXED_FIELDS
                } else {
                    FIXED_FIELDS + 1 + n_samples
                },
                n_samples,
                cols.len()
            )));
        }

        let chrom = cols[0];
        if chrom.is_empty() {
            return Err(ConcordanceError::record("Empty CHROM column"));
        }
        let pos: u64 = cols[1]
            .parse()
            .ok()
            .filter(|&p| p > 0)
            .ok_or_else(|| ConcordanceError::record(format!("Invalid position: {}", cols[1])))?;

        let reference = cols[3];
        if reference.is_empty() || reference == "." {
            return Err(ConcordanceError::record(format!(
                "Missing reference allele at {}:{}",
                chrom, pos
            )));
        }

        let qual = match cols[5] {
            "." => None,
            q => Some(
                q.parse::<f64>()
                    .map_err(|_| ConcordanceError::record(format!("Invalid quality: {}", q)))?,
            ),
        };

        let failed_filters = match cols[6] {
            "PASS" => Vec::new(),
            f => split_list(f, ';'),
        };

        let info = Self::parse_info(&header, cols[7])?;

        let format = match cols.get(FIXED_FIELDS) {
            Some(fmt) => split_list(fmt, ':')
                .iter()
                .map(|id| {
                    header.format_type(id).cloned().ok_or_else(|| {
                        ConcordanceError::schema(format!("Unknown FORMAT field '{}'", id))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let mut sample_data = Vec::with_capacity(n_samples);
        for column in cols.iter().skip(FIXED_FIELDS + 1) {
            let values: Vec<&str> = column.split(':').collect();
            if values.len() > format.len() && !(format.is_empty() && *column == ".") {
                return Err(ConcordanceError::record(format!(
                    "Sample column '{}' has more values than FORMAT fields ({})",
                    column,
                    format.len()
                )));
            }
            let row = format
                .iter()
                .enumerate()
                .map(|(i, ty)| FieldValue::parse(Arc::clone(ty), values.get(i).copied().unwrap_or(".")))
                .collect::<Result<Vec<_>>>()?;
            sample_data.push(row);
        }
        while sample_data.len() < n_samples {
            sample_data.push(Self::empty_row(&format));
        }

        Ok(Self {
            header,
            chrom: chrom.to_string(),
            pos,
            identifiers: split_list(cols[2], ';'),
            reference: reference.to_string(),
            alt: split_list(cols[4], ','),
            qual,
            failed_filters,
            info,
            format,
            sample_data,
        })
    }

    /// Parse under `header`, then move the sample data onto `new_header`
    pub fn parse_and_reheader(
        header: Arc<Header>,
        new_header: Arc<Header>,
        line: &str,
    ) -> Result<Self> {
        let mut entry = Self::parse(header, line)?;
        entry.reheader(new_header);
        Ok(entry)
    }

    fn parse_info(header: &Header, column: &str) -> Result<Vec<(String, FieldValue)>> {
        let mut info: Vec<(String, FieldValue)> = Vec::new();
        if column == "." || column.is_empty() {
            return Ok(info);
        }

        for token in column.split(';').filter(|t| !t.is_empty()) {
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            let field_type = header.info_type(key).ok_or_else(|| {
                ConcordanceError::schema(format!("Unknown INFO field '{}'", key))
            })?;
            if info.iter().any(|(k, _)| k == key) {
                return Err(ConcordanceError::record(format!(
                    "Duplicate INFO field '{}'",
                    key
                )));
            }
            let parsed = FieldValue::parse(Arc::clone(field_type), value)?;
            info.push((key.to_string(), parsed));
        }
        Ok(info)
    }

    fn empty_row(format: &[Arc<FieldType>]) -> Vec<FieldValue> {
        format
            .iter()
            .map(|ty| FieldValue::missing(Arc::clone(ty)))
            .collect()
    }

    /// Rebind to `new_header`, reordering sample rows by name. Samples unknown
    /// to the current header get empty rows; alias columns of the new header
    /// copy the row of the sample they mirror. Field values are not
    /// re-validated.
    pub fn reheader(&mut self, new_header: Arc<Header>) {
        let rows = (0..new_header.sample_count())
            .map(|idx| {
                let canonical = new_header.canonical_sample_index(idx);
                let name = &new_header.sample_names()[canonical];
                match self.header.sample_index(name) {
                    Ok(old) => self.sample_data[old].clone(),
                    Err(_) => Self::empty_row(&self.format),
                }
            })
            .collect();
        self.sample_data = rows;
        self.header = new_header;
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    /// 1-based position
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn add_identifier(&mut self, id: &str) {
        if !self.identifiers.iter().any(|i| i == id) {
            self.identifiers.push(id.to_string());
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn alt(&self) -> &[String] {
        &self.alt
    }

    pub fn qual(&self) -> Option<f64> {
        self.qual
    }

    pub fn failed_filters(&self) -> &[String] {
        &self.failed_filters
    }

    pub fn is_filtered(&self) -> bool {
        !self.failed_filters.is_empty()
    }

    /// INFO fields in file order
    pub fn info_fields(&self) -> &[(String, FieldValue)] {
        &self.info
    }

    pub fn info(&self, key: &str) -> Option<&FieldValue> {
        self.info.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn format_fields(&self) -> &[Arc<FieldType>] {
        &self.format
    }

    pub fn format_ids(&self) -> Vec<&str> {
        self.format.iter().map(|t| t.id()).collect()
    }

    fn format_index(&self, key: &str) -> Option<usize> {
        self.format.iter().position(|t| t.id() == key)
    }

    pub fn sample_data(&self) -> &[Vec<FieldValue>] {
        &self.sample_data
    }

    pub fn sample_value(&self, sample_idx: usize, key: &str) -> Option<&FieldValue> {
        let col = self.format_index(key)?;
        self.sample_data.get(sample_idx).and_then(|row| row.get(col))
    }

    fn check_sample(&self, sample_idx: usize) -> Result<()> {
        if sample_idx >= self.sample_data.len() {
            return Err(ConcordanceError::schema(format!(
                "Sample index {} out of range ({} samples)",
                sample_idx,
                self.sample_data.len()
            )));
        }
        Ok(())
    }

    /// Decode the genotype of one sample. A missing `GT` field or value gives
    /// an empty call; an allele index beyond the ALT list is an error.
    pub fn genotype_for_sample(&self, sample_idx: usize) -> Result<GenotypeCall> {
        self.check_sample(sample_idx)?;
        let value = match self.sample_value(sample_idx, GENOTYPE_KEY) {
            Some(v) if !v.is_empty() => v,
            _ => return Ok(GenotypeCall::empty()),
        };

        let call = GenotypeCall::parse(&value.to_string())?;
        if let Some(&bad) = call.indices().iter().find(|&&i| i > self.alt.len()) {
            return Err(ConcordanceError::record(format!(
                "Genotype allele index {} exceeds {} alternate alleles at {}:{}",
                bad,
                self.alt.len(),
                self.chrom,
                self.pos
            )));
        }
        Ok(call)
    }

    /// True when the sample carries an `FT` value other than `PASS`
    pub fn is_sample_filtered(&self, sample_idx: usize) -> bool {
        match self.sample_value(sample_idx, SAMPLE_FILTER_KEY) {
            Some(v) if !v.is_empty() => v.to_string() != "PASS",
            _ => false,
        }
    }

    pub fn samples_with_data(&self) -> usize {
        self.sample_data
            .iter()
            .filter(|row| row.iter().any(|v| !v.is_empty()))
            .count()
    }

    pub fn samples_failed_filter(&self) -> usize {
        (0..self.sample_data.len())
            .filter(|&i| self.is_sample_filtered(i))
            .count()
    }

    /// Clear every sample row whose `DP` is below `min_depth`
    pub fn remove_low_depth_genotypes(&mut self, min_depth: i64) {
        let Some(col) = self.format_index(DEPTH_KEY) else {
            return;
        };
        if self.format[col].kind() != ScalarKind::Integer {
            return;
        }
        for row in &mut self.sample_data {
            let low = row[col]
                .integers()
                .ok()
                .and_then(|v| v.first())
                .is_some_and(|&dp| dp < min_depth);
            if low {
                *row = Self::empty_row(&self.format);
            }
        }
    }

    /// Index into `alt()` of the given allele
    pub fn alt_index(&self, allele: &str) -> Option<usize> {
        self.alt.iter().position(|a| a == allele)
    }

    /// 0-based start of the record's span
    pub fn start(&self) -> u64 {
        self.pos - 1
    }

    /// Exclusive end: start plus the longest of REF and the ALT alleles
    pub fn stop(&self) -> u64 {
        let longest = self
            .alt
            .iter()
            .map(String::len)
            .chain(std::iter::once(self.reference.len()))
            .max()
            .unwrap_or(1);
        self.start() + longest as u64
    }

    pub fn length(&self) -> u64 {
        self.stop() - self.start()
    }

    pub fn region(&self) -> Region {
        Region::new(self.start(), self.stop())
    }

    /// Order by (chromosome, start) under the given chromosome order
    pub fn cmp_with(&self, other: &Entry, order: &dyn ChromosomeOrder) -> Ordering {
        order
            .compare(&self.chrom, &other.chrom)
            .then_with(|| self.start().cmp(&other.start()))
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t", self.chrom, self.pos)?;
        write_list(f, &self.identifiers, ";")?;
        write!(f, "\t{}\t", self.reference)?;
        write_list(f, &self.alt, ",")?;
        match self.qual {
            Some(q) => write!(f, "\t{}\t", q)?,
            None => f.write_str("\t.\t")?,
        }
        if self.failed_filters.is_empty() {
            f.write_str("PASS")?;
        } else {
            f.write_str(&self.failed_filters.join(";"))?;
        }

        f.write_str("\t")?;
        if self.info.is_empty() {
            f.write_str(".")?;
        } else {
            for (i, (key, value)) in self.info.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                if value.kind() == ScalarKind::Flag {
                    f.write_str(key)?;
                } else {
                    write!(f, "{}={}", key, value)?;
                }
            }
        }

        if !self.format.is_empty() {
            write!(f, "\t{}", self.format_ids().join(":"))?;
            for row in &self.sample_data {
                let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                write!(f, "\t{}", values.join(":"))?;
            }
        }
        Ok(())
    }
}
