use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VCF_SUFFIXES: [&str; 5] = [".vcf", ".vcf.gz", ".vcf.bgz", ".vcf.bz2", ".vcf.xz"];

/// File discovery for VCF inputs
pub struct FileDiscovery {
    recursive: bool,
}

impl FileDiscovery {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    /// Expand the given paths into VCF files. Files named explicitly are kept
    /// whatever their extension; directories contribute their VCF files in
    /// sorted order. Duplicates are dropped, first occurrence wins.
    pub fn discover(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                files.extend(self.discover_in_directory(path)?);
            } else if path.is_file() || path.as_os_str() == "-" {
                files.push(path.clone());
            } else {
                anyhow::bail!("Input not found: {}", path.display());
            }
        }

        let mut seen = HashSet::new();
        files.retain(|path| seen.insert(path.clone()));
        Ok(files)
    }

    fn discover_in_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if self.recursive {
            for entry in WalkDir::new(dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if path.is_file() && Self::is_vcf_file(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else {
            let entries = fs::read_dir(dir)
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

            for entry in entries {
                let entry = entry.with_context(|| {
                    format!("Failed to read directory entry in: {}", dir.display())
                })?;
                let path = entry.path();

                if path.is_file() && Self::is_vcf_file(&path) {
                    files.push(path);
                }
            }
            files.sort();
        }

        Ok(files)
    }

    pub fn is_vcf_file(path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        VCF_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    }
}
