// Licensed under the Apache-2.0 license

//! Patch file serialization.
//!
//! A patch file is the newline-delimited interchange format for fuse value
//! overrides. Each non-comment line is:
//!
//! ```text
//! ADDR(hex) STARTBIT(dec) WIDTH(dec) VALUE(hex) # NAME (ANNOTATION)
//! ```
//!
//! Addresses are five lower-hex digits; values are zero-padded to one hex
//! digit for widths up to four bits and to `width / 4` digits otherwise.
//! Loading then saving an unmodified list reproduces the file byte for byte.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use log::{info, warn};

use crate::error::{FusegenError, FusegenResult};
use crate::types::{sort_by_bit_position, FuseRecord};

/// Header comment written at the top of every saved patch.
pub const PATCH_HEADER: &str = "# RamAddr (hex) StartBit (dec) Width (dec) Value (hex)";

/// Annotation used for ordinary fuse entries.
pub const DEFAULT_TYPE_TAG: &str = "(fuse)";

/// Load a patch file into a record list.
pub fn load_patch_file(path: &Path) -> FusegenResult<Vec<FuseRecord>> {
    load_patch_file_filtered(path, "")
}

/// Load a patch file, keeping only records whose name starts with `prefix`.
/// An empty prefix keeps everything.
pub fn load_patch_file_filtered(path: &Path, prefix: &str) -> FusegenResult<Vec<FuseRecord>> {
    let text = std::fs::read_to_string(path).map_err(|source| FusegenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_patch(&text, prefix)?;
    info!("found {} items in file {}", records.len(), path.display());
    Ok(records)
}

/// Parse patch text into records. See [`load_patch_file_filtered`].
pub fn parse_patch(text: &str, prefix: &str) -> FusegenResult<Vec<FuseRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record = parse_patch_line(line, idx + 1)?;
        if !prefix.is_empty() && !record.name.starts_with(prefix) {
            continue;
        }
        if !seen.insert(record.name.clone()) {
            warn!("duplicate name {} at line {}; first occurrence wins in lookups", record.name, idx + 1);
        }
        records.push(record);
    }
    Ok(records)
}

fn parse_patch_line(line: &str, number: usize) -> FusegenResult<FuseRecord> {
    let malformed = |reason: &str| FusegenError::Patch {
        line: number,
        reason: reason.to_string(),
    };
    let numeric = |source| FusegenError::Patch {
        line: number,
        reason: format!("bad numeric field: {source}"),
    };

    // ADDR STARTBIT WIDTH VALUE # NAME <rest = annotation>
    let mut parts = line.splitn(7, ' ');
    let address = parts.next().ok_or_else(|| malformed("missing address"))?;
    let address = u64::from_str_radix(address, 16).map_err(numeric)?;
    let start_bit = parts.next().ok_or_else(|| malformed("missing start bit"))?;
    let start_bit: u8 = start_bit.parse().map_err(numeric)?;
    let width = parts.next().ok_or_else(|| malformed("missing width"))?;
    let width: u32 = width.parse().map_err(numeric)?;
    let value = parts.next().ok_or_else(|| malformed("missing value"))?;
    let value = u64::from_str_radix(value, 16).map_err(numeric)?;
    if parts.next() != Some("#") {
        return Err(malformed("expected '#' between value and name"));
    }
    let name = parts
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| malformed("missing name"))?;
    let type_tag = match parts.next().map(str::trim) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => DEFAULT_TYPE_TAG.to_string(),
    };

    Ok(FuseRecord {
        name: name.to_string(),
        address,
        start_bit,
        width,
        value,
        type_tag,
        ..Default::default()
    })
}

/// Format a value with the patch file's zero-padding rule: one hex digit for
/// widths up to four bits, `width / 4` digits otherwise.
pub fn format_value(value: u64, width: u32) -> String {
    let digits = if width > 4 { (width / 4) as usize } else { 1 };
    format!("{value:0digits$x}")
}

fn format_patch_line(record: &FuseRecord) -> String {
    // strip parens from the stored annotation to prevent nesting
    let tag = record.type_tag.replace(['(', ')'], "");
    format!(
        "{:05x} {} {} {} # {} ({})",
        record.address,
        record.start_bit,
        record.width,
        format_value(record.value, record.width),
        record.name,
        tag
    )
}

/// Render records as patch file text: header line, then one line per record
/// in ascending bit-position order. Records flagged `skip` are omitted.
pub fn render_patch(records: &[FuseRecord]) -> String {
    let mut sorted: Vec<FuseRecord> = records.to_vec();
    sort_by_bit_position(&mut sorted);

    let mut out = String::new();
    writeln!(out, "{PATCH_HEADER}").unwrap();
    for record in sorted.iter().filter(|r| !r.skip) {
        writeln!(out, "{}", format_patch_line(record)).unwrap();
    }
    out
}

/// Render and write records to `path`.
pub fn save_patch_file(path: &Path, records: &[FuseRecord]) -> FusegenResult<()> {
    std::fs::write(path, render_patch(records)).map_err(|source| FusegenError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    info!("saved output to {}", path.display());
    Ok(())
}

/// Load a name-list file: one name per line, `#` comments and blanks skipped.
pub fn load_name_list(path: &Path) -> FusegenResult<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|source| FusegenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let names: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.split(' ').next().unwrap_or(l).to_string())
        .collect();
    info!("found {} items in file {}", names.len(), path.display());
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FuseRecord> {
        vec![
            FuseRecord {
                name: "fuse_a".to_string(),
                address: 0x10,
                start_bit: 0,
                width: 8,
                value: 0xab,
                type_tag: "(fuse)".to_string(),
                ..Default::default()
            },
            FuseRecord {
                name: "fuse_b".to_string(),
                address: 0x10,
                start_bit: 4,
                width: 2,
                value: 0x3,
                type_tag: "(fuse)".to_string(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_format_value_padding() {
        assert_eq!(format_value(0x3, 2), "3");
        assert_eq!(format_value(0x3, 4), "3");
        assert_eq!(format_value(0x3, 8), "03");
        assert_eq!(format_value(0xab, 8), "ab");
        assert_eq!(format_value(0x1, 32), "00000001");
    }

    #[test]
    fn test_render_sorted_by_bit_position() {
        let text = render_patch(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], PATCH_HEADER);
        assert_eq!(lines[1], "00010 0 8 ab # fuse_a (fuse)");
        assert_eq!(lines[2], "00010 4 2 3 # fuse_b (fuse)");
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let text = render_patch(&sample());
        let loaded = parse_patch(&text, "").unwrap();
        assert_eq!(render_patch(&loaded), text);
    }

    #[test]
    fn test_round_trip_via_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.txt");
        save_patch_file(&path, &sample()).unwrap();
        let loaded = load_patch_file(&path).unwrap();
        let second = dir.path().join("patch2.txt");
        save_patch_file(&second, &loaded).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_multi_word_annotation_round_trip() {
        let record = FuseRecord {
            name: "fuse_c".to_string(),
            address: 0x20,
            start_bit: 3,
            width: 4,
            value: 5,
            type_tag: "(closest, old_name, s:2 w:4)".to_string(),
            ..Default::default()
        };
        let text = render_patch(&[record]);
        let loaded = parse_patch(&text, "").unwrap();
        assert_eq!(loaded[0].type_tag, "(closest, old_name, s:2 w:4)");
        assert_eq!(render_patch(&loaded), text);
    }

    #[test]
    fn test_skip_records_omitted() {
        let mut records = sample();
        records[1].skip = true;
        let text = render_patch(&records);
        assert!(!text.contains("fuse_b"));
    }

    #[test]
    fn test_prefix_filter() {
        let text = render_patch(&sample());
        let loaded = parse_patch(&text, "fuse_b").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "fuse_b");
    }

    #[test]
    fn test_missing_annotation_defaults() {
        let loaded = parse_patch("00010 0 8 ab # fuse_a\n", "").unwrap();
        assert_eq!(loaded[0].type_tag, "(fuse)");
    }

    #[test]
    fn test_malformed_line_reports_number() {
        let err = parse_patch("# header\nnot a patch line\n", "").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_comment_lines_skipped() {
        let loaded = parse_patch("# comment\n\n# another\n", "").unwrap();
        assert!(loaded.is_empty());
    }
}
