// ==============================================================================
// parsers/vcf.rs - Pharmacogenomic VCF parser
// ==============================================================================
// Description: Extracts annotated variant records from uploaded VCF v4.2 bytes
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-11
// Version: 1.1.0
// ==============================================================================
// References:
// - VCF 4.2 Spec: https://samtools.github.io/hts-specs/VCFv4.2.pdf
// Format:
//   ##fileformat=VCFv4.2
//   #CHROM  POS  ID  REF  ALT  QUAL  FILTER  INFO  FORMAT  SAMPLE
//   22  42130692  rs3892097  C  T  .  PASS  GENE=CYP2D6;STAR=*4;RS=3892097  GT  0/1
// ==============================================================================

use flate2::read::MultiGzDecoder;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Variant, Zygosity};

/// Maximum accepted upload size (5 MB)
pub const MAX_VCF_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Gzip magic number (RFC 1952)
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decompressed output may be at most this many times the raw size limit
const MAX_DECOMPRESSION_RATIO: usize = 10;

/// Minimum number of tab-separated columns (CHROM..INFO)
const MIN_COLUMNS: usize = 8;

/// VCF parsing errors
///
/// Every variant names the concrete defect so it can be shown to the caller.
#[derive(Error, Debug)]
pub enum VcfParseError {
    #[error("Variant file too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Variant file is empty")]
    Empty,

    #[error("Unsupported file format: {0} (expected VCFv4.2)")]
    UnsupportedFormat(String),

    #[error("Data row at line {line} appears before the #CHROM header line")]
    MissingHeader { line: usize },

    #[error("No #CHROM header line found")]
    NoHeader,

    #[error("Malformed #CHROM header: expected at least 8 columns, found {0}")]
    MalformedHeader(usize),

    #[error("Decompressed variant file exceeds {max} bytes")]
    DecompressedTooLarge { max: usize },

    #[error("Failed to decompress gzip variant file: {0}")]
    Decompress(#[from] std::io::Error),
}

/// Output of one parse run
#[derive(Debug, Clone)]
pub struct ParsedVcf {
    /// Value of the ##fileformat= meta line, if present
    pub file_format: Option<String>,

    /// Variants in file order (duplicates of (gene, rsid) replaced in place)
    pub variants: Vec<Variant>,

    /// Data rows skipped as malformed
    pub skipped_rows: usize,

    /// Hex SHA-256 of the raw upload (audit trail only)
    pub sha256: String,
}

/// VCF parser with configurable size limit
#[derive(Debug, Clone)]
pub struct VcfParser {
    /// Maximum raw upload size in bytes
    pub max_size: usize,
}

impl Default for VcfParser {
    fn default() -> Self {
        Self {
            max_size: MAX_VCF_SIZE_BYTES,
        }
    }
}

impl VcfParser {
    /// Create new VCF parser with the default 5 MB limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum accepted upload size
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Parse raw upload bytes (plain text or gzip) into variant records
    ///
    /// # Returns
    /// * `Ok(ParsedVcf)` - Parsed variants plus file metadata
    /// * `Err(VcfParseError)` - Oversized, empty, or header-less input
    ///
    /// The size limit is checked before any decoding happens. Rows without
    /// GENE/STAR annotations are kept with `gene`/`star_allele` set to `None`.
    pub fn parse_bytes(&self, raw: &[u8]) -> Result<ParsedVcf, VcfParseError> {
        // 1. Size guard (BEFORE any processing)
        if raw.len() > self.max_size {
            return Err(VcfParseError::TooLarge {
                size: raw.len(),
                max: self.max_size,
            });
        }
        if raw.is_empty() {
            return Err(VcfParseError::Empty);
        }

        let sha256 = format!("{:x}", Sha256::digest(raw));

        // 2. Decompress if gzip
        let decompressed;
        let bytes = if raw.starts_with(&GZIP_MAGIC) {
            decompressed = self.decompress(raw)?;
            debug!("Decompressed gzip upload: {} -> {} bytes", raw.len(), decompressed.len());
            decompressed.as_slice()
        } else {
            raw
        };

        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            return Err(VcfParseError::Empty);
        }

        // 3. Walk lines
        let mut file_format = None;
        let mut header_seen = false;
        let mut skipped_rows = 0;
        let mut variants: Vec<Variant> = Vec::new();
        let mut seen: HashMap<(Option<String>, String), usize> = HashMap::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_number = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            // Meta-information lines (##)
            if let Some(meta) = line.strip_prefix("##") {
                if let Some(version) = meta.strip_prefix("fileformat=") {
                    let version = version.trim();
                    if !version.starts_with("VCFv4.") {
                        return Err(VcfParseError::UnsupportedFormat(version.to_string()));
                    }
                    if version != "VCFv4.2" {
                        debug!("Accepting {} as VCFv4.2-compatible", version);
                    }
                    file_format = Some(version.to_string());
                }
                continue;
            }

            // Header line (#CHROM ...) and stray comments
            if line.starts_with('#') {
                if line.starts_with("#CHROM") {
                    let columns = line.split('\t').count();
                    if columns < MIN_COLUMNS {
                        return Err(VcfParseError::MalformedHeader(columns));
                    }
                    header_seen = true;
                }
                continue;
            }

            // Data line
            if !header_seen {
                return Err(VcfParseError::MissingHeader { line: line_number });
            }

            let Some(variant) = parse_data_line(line, line_number) else {
                skipped_rows += 1;
                continue;
            };

            // Duplicate (gene, rsid): last occurrence wins
            let key = (variant.gene.clone(), variant.rsid.clone());
            match seen.get(&key) {
                Some(&existing) => {
                    debug!("Line {}: duplicate {} replaces earlier record", line_number, variant.rsid);
                    variants[existing] = variant;
                }
                None => {
                    seen.insert(key, variants.len());
                    variants.push(variant);
                }
            }
        }

        if !header_seen {
            return Err(VcfParseError::NoHeader);
        }

        if file_format.is_none() {
            warn!("Variant file has no ##fileformat line; assuming VCFv4.2");
        }
        if skipped_rows > 0 {
            warn!("VCF parse: skipped {} malformed rows", skipped_rows);
        }
        info!(
            "VCF parsed: {} variants ({} annotated with a gene)",
            variants.len(),
            variants.iter().filter(|v| v.gene.is_some()).count()
        );

        Ok(ParsedVcf {
            file_format,
            variants,
            skipped_rows,
            sha256,
        })
    }

    fn decompress(&self, raw: &[u8]) -> Result<Vec<u8>, VcfParseError> {
        let limit = self.max_size.saturating_mul(MAX_DECOMPRESSION_RATIO);
        let mut out = Vec::new();
        // bgzip output is a chain of gzip members; read all of them
        MultiGzDecoder::new(raw)
            .take(limit as u64 + 1)
            .read_to_end(&mut out)?;

        if out.len() > limit {
            return Err(VcfParseError::DecompressedTooLarge { max: limit });
        }
        Ok(out)
    }
}

/// Parse a single tab-separated data row
///
/// Returns `None` for rows that cannot produce a variant (too few columns,
/// non-numeric position).
fn parse_data_line(line: &str, line_number: usize) -> Option<Variant> {
    let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
    if cols.len() < MIN_COLUMNS {
        warn!(
            "Line {}: expected at least {} tab-delimited fields, found {}",
            line_number,
            MIN_COLUMNS,
            cols.len()
        );
        return None;
    }

    let chromosome = cols[0];
    let position = match cols[1].parse::<u64>() {
        Ok(pos) => pos,
        Err(_) => {
            warn!("Line {}: invalid position '{}'", line_number, cols[1]);
            return None;
        }
    };
    let reference_allele = cols[3];
    let alternate_allele = cols[4];

    let info = parse_info(cols[7]);
    let gene = info
        .get("GENE")
        .map(|g| g.trim().to_uppercase())
        .filter(|g| !g.is_empty() && g != ".");
    let star_allele = info.get("STAR").and_then(|s| normalize_star(s));

    let rsid = normalize_rsid(
        cols[2],
        info.get("RS").copied(),
        chromosome,
        position,
        reference_allele,
        alternate_allele,
    );

    let genotype = extract_gt(cols.get(8).copied(), cols.get(9).copied());
    let zygosity = Zygosity::from_genotype(&genotype);

    Some(Variant {
        rsid,
        chromosome: chromosome.to_string(),
        position,
        reference_allele: reference_allele.to_string(),
        alternate_allele: alternate_allele.to_string(),
        genotype,
        zygosity,
        gene,
        star_allele,
    })
}

/// Parse the INFO column (KEY=VAL;FLAG;KEY2=VAL2)
fn parse_info(info: &str) -> HashMap<&str, &str> {
    let mut tags = HashMap::new();
    if info.is_empty() || info == "." {
        return tags;
    }

    for token in info.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('=') {
            Some((key, value)) => tags.insert(key.trim(), value.trim()),
            None => tags.insert(token, ""),
        };
    }
    tags
}

/// Pull GT out of FORMAT + first SAMPLE column (supports GT:AD:DP:GQ)
fn extract_gt(format: Option<&str>, sample: Option<&str>) -> String {
    let (Some(format), Some(sample)) = (format, sample) else {
        return String::new();
    };

    format
        .split(':')
        .zip(sample.split(':'))
        .find(|(key, _)| *key == "GT")
        .map(|(_, value)| value.trim())
        .filter(|value| *value != ".")
        .unwrap_or_default()
        .to_string()
}

/// Canonical rsID: ID column, then RS= tag, then a generated pseudo-ID
fn normalize_rsid(
    id_col: &str,
    rs_info: Option<&str>,
    chromosome: &str,
    position: u64,
    reference_allele: &str,
    alternate_allele: &str,
) -> String {
    if !id_col.is_empty() && id_col != "." {
        // Use first ID if several are listed
        return id_col.split(';').next().unwrap_or(id_col).to_string();
    }

    match rs_info.map(str::trim).filter(|rs| !rs.is_empty() && *rs != ".") {
        Some(rs) if rs.starts_with("rs") => rs.to_string(),
        Some(rs) => format!("rs{}", rs),
        None => {
            let chrom = chromosome.trim_start_matches("chr");
            format!("chr{}:{}:{}:{}", chrom, position, reference_allele, alternate_allele)
        }
    }
}

/// Normalize a STAR= value to "*N" form ("4" -> "*4", "CYP2D6*4" -> "*4")
pub fn normalize_star(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == "." {
        return None;
    }

    match value.rfind('*') {
        Some(idx) if idx + 1 < value.len() => Some(value[idx..].to_string()),
        Some(_) => None,
        None => Some(format!("*{}", value)),
    }
}
