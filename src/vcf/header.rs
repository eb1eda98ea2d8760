//! VCF header: field type registries, filters, contigs and sample columns.

use chrono::Local;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ConcordanceError, Result};
use crate::vcf::field::{parse_structured, FieldType};

/// Fixed columns of the `#CHROM` line, in order
pub const FIXED_COLUMNS: [&str; 9] = [
    "CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO", "FORMAT",
];

/// A meta-information line split at its first `=`, without the leading `##`
pub type RawLine = (String, String);

/// Parsed VCF header shared by every [`Entry`](crate::vcf::Entry) read under it
#[derive(Debug, Clone, Default)]
pub struct Header {
    meta_lines: Vec<RawLine>,
    info_types: BTreeMap<String, Arc<FieldType>>,
    format_types: BTreeMap<String, Arc<FieldType>>,
    filters: BTreeMap<String, String>,
    sample_tags: BTreeMap<String, Vec<(String, String)>>,
    contigs: Vec<String>,
    sample_names: Vec<String>,
    sample_source_counts: Vec<usize>,
    mirrored_samples: BTreeMap<usize, usize>,
    header_seen: bool,
}

fn strip_angles(value: &str) -> Result<&str> {
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .ok_or_else(|| ConcordanceError::schema(format!("Expected <...> value, got: {}", value)))
}

fn structured_id(pairs: &[(String, String)], line: &str) -> Result<String> {
    pairs
        .iter()
        .find(|(k, _)| k == "ID")
        .map(|(_, v)| v.clone())
        .ok_or_else(|| ConcordanceError::schema(format!("Missing ID in header line: {}", line)))
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete header from its lines
    pub fn from_lines<'a, I>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut header = Header::new();
        for line in lines {
            header.add(line)?;
        }
        Ok(header)
    }

    /// Add one raw header line (`##key=value` or the `#CHROM` column line)
    pub fn add(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(meta) = line.strip_prefix("##") {
            let (key, value) = meta.split_once('=').ok_or_else(|| {
                ConcordanceError::schema(format!("Failed to parse VCF header line: {}", line))
            })?;
            self.add_meta(key, value, line)
        } else if let Some(columns) = line.strip_prefix('#') {
            self.parse_column_header(columns)
        } else {
            Err(ConcordanceError::schema(format!(
                "Not a VCF header line: {}",
                line
            )))
        }
    }

    fn add_meta(&mut self, key: &str, value: &str, line: &str) -> Result<()> {
        match key {
            "INFO" => {
                let field_type = FieldType::parse(strip_angles(value)?)?;
                if self.info_types.contains_key(field_type.id()) {
                    return Err(ConcordanceError::schema(format!(
                        "Duplicate value for INFO:{}",
                        field_type.id()
                    )));
                }
                self.info_types
                    .insert(field_type.id().to_string(), Arc::new(field_type));
            }
            "FORMAT" => {
                let field_type = FieldType::parse(strip_angles(value)?)?;
                if self.format_types.contains_key(field_type.id()) {
                    return Err(ConcordanceError::schema(format!(
                        "Duplicate value for FORMAT:{}",
                        field_type.id()
                    )));
                }
                self.format_types
                    .insert(field_type.id().to_string(), Arc::new(field_type));
            }
            "FILTER" => {
                let pairs = parse_structured(strip_angles(value)?);
                let id = structured_id(&pairs, line)?;
                if self.filters.contains_key(&id) {
                    return Err(ConcordanceError::schema(format!(
                        "Duplicate FILTER ID in vcf header: {}",
                        id
                    )));
                }
                let description = pairs
                    .into_iter()
                    .find(|(k, _)| k == "Description")
                    .map(|(_, v)| v)
                    .unwrap_or_default();
                self.filters.insert(id, description);
            }
            "SAMPLE" => {
                let pairs = parse_structured(strip_angles(value)?);
                let id = structured_id(&pairs, line)?;
                if self.sample_tags.contains_key(&id) {
                    return Err(ConcordanceError::schema(format!(
                        "Duplicate SAMPLE ID in vcf header: {}",
                        id
                    )));
                }
                self.sample_tags.insert(id, pairs);
            }
            "contig" => {
                let pairs = parse_structured(strip_angles(value)?);
                let id = structured_id(&pairs, line)?;
                if self.contigs.contains(&id) {
                    return Err(ConcordanceError::schema(format!(
                        "Duplicate contig ID in vcf header: {}",
                        id
                    )));
                }
                self.contigs.push(id);
            }
            _ => {}
        }

        self.meta_lines.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn parse_column_header(&mut self, columns: &str) -> Result<()> {
        if self.header_seen {
            return Err(ConcordanceError::schema(format!(
                "Multiple header lines detected: #{}",
                columns
            )));
        }

        let mut tokens = columns.split('\t');
        for (i, expected) in FIXED_COLUMNS.iter().enumerate() {
            match tokens.next() {
                Some(tok) if tok == *expected => {}
                // dbSNP-style files omit FORMAT when there are no samples
                None if i == FIXED_COLUMNS.len() - 1 => break,
                _ => {
                    return Err(ConcordanceError::schema(format!(
                        "Malformed header line: #{}\nExpected token: {}",
                        columns, expected
                    )))
                }
            }
        }

        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for name in tokens {
            if !seen.insert(name) {
                return Err(ConcordanceError::schema(format!(
                    "Duplicate sample name in vcf header: {}",
                    name
                )));
            }
            names.push(name.to_string());
        }

        self.header_seen = true;
        self.sample_source_counts = vec![1; names.len()];
        self.sample_names = names;
        Ok(())
    }

    pub fn add_filter(&mut self, id: &str, description: &str) -> Result<()> {
        if self.filters.contains_key(id) {
            return Err(ConcordanceError::schema(format!(
                "Attempted to add duplicate filter '{}' to vcf header.",
                id
            )));
        }
        self.add(&format!(
            "##FILTER=<ID={},Description=\"{}\">",
            id,
            description.replace('"', "\\\"")
        ))
    }

    pub fn add_info_type(&mut self, field_type: &FieldType) -> Result<()> {
        self.add(&format!("##INFO=<{}>", field_type))
    }

    pub fn add_format_type(&mut self, field_type: &FieldType) -> Result<()> {
        self.add(&format!("##FORMAT=<{}>", field_type))
    }

    /// Merge `other` into this header.
    ///
    /// Samples from `other` are appended; a name already present is either an
    /// error or reuses the existing column, depending on
    /// `allow_duplicate_samples`. Either way the sample's source count is
    /// incremented. Meta-information lines are unioned by exact text, so a
    /// conflicting INFO, FORMAT or FILTER declaration of an existing id is an
    /// error. A contig already declared keeps its first line. A single fresh
    /// `fileDate` line replaces any previous ones.
    ///
    /// On error `self` is left unchanged.
    pub fn merge(&mut self, other: &Header, allow_duplicate_samples: bool) -> Result<()> {
        let mut merged = self.clone();

        for name in &other.sample_names {
            let idx = match merged.sample_names.iter().position(|n| n == name) {
                Some(idx) => {
                    if !allow_duplicate_samples {
                        return Err(ConcordanceError::schema(format!(
                            "Error merging VCF headers, sample name conflict: {}",
                            name
                        )));
                    }
                    idx
                }
                None => {
                    merged.sample_names.push(name.clone());
                    merged.sample_names.len() - 1
                }
            };
            if idx >= merged.sample_source_counts.len() {
                merged.sample_source_counts.resize(idx + 1, 0);
            }
            merged.sample_source_counts[idx] += 1;
        }

        for (key, value) in &other.meta_lines {
            if key == "fileDate" || merged.meta_lines.iter().any(|(k, v)| k == key && v == value) {
                continue;
            }
            // first declaration of a contig wins
            if key == "contig" && merged.declares_known_contig(value)? {
                debug!("Keeping first declaration of contig: {}", value);
                continue;
            }
            merged.add_meta(key, value, &format!("##{}={}", key, value))?;
        }

        merged.meta_lines.retain(|(key, _)| key != "fileDate");
        let date = Local::now().format("%Y%m%d").to_string();
        merged.meta_lines.push(("fileDate".to_string(), date));
        merged.header_seen |= other.header_seen;

        debug!(
            "Merged header: {} samples, {} INFO, {} FORMAT, {} FILTER",
            merged.sample_names.len(),
            merged.info_types.len(),
            merged.format_types.len(),
            merged.filters.len()
        );

        *self = merged;
        Ok(())
    }

    fn declares_known_contig(&self, value: &str) -> Result<bool> {
        let pairs = parse_structured(strip_angles(value)?);
        let id = structured_id(&pairs, value)?;
        Ok(self.contigs.contains(&id))
    }

    /// Column index of a sample name
    pub fn sample_index(&self, name: &str) -> Result<usize> {
        self.sample_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ConcordanceError::sample_not_found(name))
    }

    /// Register `alias` as a new sample column reading the data of `existing`.
    /// Returns the alias column index.
    pub fn mirror_sample(&mut self, existing: &str, alias: &str) -> Result<usize> {
        if self.sample_names.iter().any(|n| n == alias) {
            return Err(ConcordanceError::schema(format!(
                "Attempted to mirror sample '{}' as '{}', but sample '{}' already exists",
                existing, alias, alias
            )));
        }

        let target = self.sample_index(existing)?;
        let idx = self.sample_names.len();
        self.sample_names.push(alias.to_string());
        let count = self.sample_source_counts.get(target).copied().unwrap_or(0);
        self.sample_source_counts.resize(idx, 0);
        self.sample_source_counts.push(count);
        self.mirrored_samples.insert(idx, target);
        Ok(idx)
    }

    /// Resolve an alias column to the column it mirrors
    pub fn canonical_sample_index(&self, idx: usize) -> usize {
        self.mirrored_samples.get(&idx).copied().unwrap_or(idx)
    }

    /// The `#CHROM` line without its leading `#`
    pub fn header_line(&self) -> String {
        let mut columns: Vec<&str> = FIXED_COLUMNS.to_vec();
        columns.extend(self.sample_names.iter().map(String::as_str));
        columns.join("\t")
    }

    pub fn assert_valid(&self) -> Result<()> {
        if self.meta_lines.is_empty() || !self.header_seen {
            return Err(ConcordanceError::schema("invalid or missing header"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.meta_lines.is_empty()
    }

    pub fn has_column_header(&self) -> bool {
        self.header_seen
    }

    pub fn info_type(&self, id: &str) -> Option<&Arc<FieldType>> {
        self.info_types.get(id)
    }

    pub fn format_type(&self, id: &str) -> Option<&Arc<FieldType>> {
        self.format_types.get(id)
    }

    pub fn info_types(&self) -> &BTreeMap<String, Arc<FieldType>> {
        &self.info_types
    }

    pub fn format_types(&self) -> &BTreeMap<String, Arc<FieldType>> {
        &self.format_types
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn sample_tags(&self) -> &BTreeMap<String, Vec<(String, String)>> {
        &self.sample_tags
    }

    /// Contig ids in declaration order
    pub fn contigs(&self) -> &[String] {
        &self.contigs
    }

    pub fn meta_info_lines(&self) -> &[RawLine] {
        &self.meta_lines
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn sample_count(&self) -> usize {
        self.sample_names.len()
    }

    /// Number of merged inputs that contributed each sample
    pub fn sample_source_counts(&self) -> &[usize] {
        &self.sample_source_counts
    }

    pub fn mirrored_samples(&self) -> &BTreeMap<usize, usize> {
        &self.mirrored_samples
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.meta_lines {
            writeln!(f, "##{}={}", key, value)?;
        }
        writeln!(f, "#{}", self.header_line())
    }
}
