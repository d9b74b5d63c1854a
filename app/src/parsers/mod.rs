// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for uploaded variant file formats
// Author: Matt Barham
// Created: 2026-02-02
// Modified: 2026-02-02
// Version: 1.0.0
// ==============================================================================

pub mod vcf;

pub use vcf::{ParsedVcf, VcfParseError, VcfParser, MAX_VCF_SIZE_BYTES};
