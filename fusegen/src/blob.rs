// Licensed under the Apache-2.0 license

//! Hardware blob import and inspection.
//!
//! A fuse controller dump is a sequence of `header | payload` sections: a
//! four-byte header whose last byte is the payload length in dwords,
//! followed by that many dwords of raw fuse bytes. Each payload chunk maps
//! onto one distribution-LUT region; individual fields are extracted by
//! masking the little-endian byte window covering
//! `[start_bit, start_bit + width)`.

use std::path::Path;

use log::{debug, warn};

use crate::error::{FusegenError, FusegenResult};
use crate::types::{DistributionLutEntry, FuseKind, FuseRecord, BYTE_BITS};

const HEADER_SIZE: usize = 4;
const BYTES_IN_DWORD: usize = 4;
/// Header byte holding the payload dword count.
const DWORD_FIELD: usize = 3;

/// Split a raw dump into its payload chunks.
///
/// Truncated trailing sections are clamped to the available bytes.
pub fn split_blob_chunks(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    while pos + HEADER_SIZE <= bytes.len() {
        let header = &bytes[pos..pos + HEADER_SIZE];
        let payload_len = header[DWORD_FIELD] as usize * BYTES_IN_DWORD;
        pos += HEADER_SIZE;
        let end = (pos + payload_len).min(bytes.len());
        debug!("blob header {}: {payload_len} payload bytes", hex::encode(header));
        chunks.push(bytes[pos..end].to_vec());
        pos += payload_len;
    }
    chunks
}

/// Load a text blob: the first line is one long hex string.
pub fn load_text_blob(path: &Path) -> FusegenResult<Vec<Vec<u8>>> {
    let text = read(path)?;
    let line = text.lines().next().unwrap_or_default().trim();
    let bytes = hex::decode(line)
        .map_err(|e| FusegenError::MissingInput(format!("bad hex blob in {}: {e}", path.display())))?;
    Ok(split_blob_chunks(&bytes))
}

/// Load an integer blob: one decimal byte value per line.
pub fn load_int_blob(path: &Path) -> FusegenResult<Vec<Vec<u8>>> {
    let text = read(path)?;
    let mut bytes = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let byte: u8 = trimmed.parse().map_err(|e| {
            FusegenError::MissingInput(format!("bad byte value {trimmed:?} in {}: {e}", path.display()))
        })?;
        bytes.push(byte);
    }
    Ok(split_blob_chunks(&bytes))
}

/// Extract a field value from a chunk.
///
/// Reads the little-endian byte window covering the field, masks bits
/// `[start_bit, start_bit + width)`, and shifts down. A window running past
/// the end of the chunk is treated as zero-filled.
pub fn extract_field(chunk: &[u8], byte_offset: usize, start_bit: u8, width: u32) -> u64 {
    let start_bit = u32::from(start_bit);
    let window_len = ((start_bit + width) as usize).div_ceil(BYTE_BITS as usize);

    let mut window: u128 = 0;
    for i in 0..window_len.min(16) {
        if let Some(byte) = chunk.get(byte_offset + i) {
            window |= u128::from(*byte) << (BYTE_BITS as usize * i);
        }
    }
    let width = width.min(64);
    let mask = ((1u128 << width) - 1) << start_bit;
    ((window & mask) >> start_bit) as u64
}

/// DLUT entries matching an instance, group, and kind, in emission order.
pub fn filter_dlut<'a>(
    dlut: &'a [DistributionLutEntry],
    instance: &str,
    group: u64,
    kind: FuseKind,
) -> Vec<&'a DistributionLutEntry> {
    dlut.iter()
        .filter(|e| e.instance == instance && e.group == group && e.kind == kind)
        .collect()
}

/// Defaults covering one region: records with the name prefix at or above
/// the region base, accumulated up to the region's bit capacity.
fn filter_region_defaults<'a>(
    defaults: &'a [FuseRecord],
    prefix: &str,
    base_address: u64,
    data_size: u64,
) -> Vec<&'a FuseRecord> {
    let max_bits = data_size * BYTE_BITS;
    let mut total_bits = 0;
    let mut filtered = Vec::new();
    for record in defaults {
        if !record.name.starts_with(prefix) || record.address < base_address {
            continue;
        }
        if total_bits >= max_bits {
            break;
        }
        filtered.push(record);
        total_bits += u64::from(record.width);
    }
    filtered
}

/// Counts reported by [`import_blob`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Regions decoded.
    pub chunks: usize,
    /// Fields extracted and compared.
    pub extracted: usize,
    /// Fields whose value differs from the default (emitted in the output).
    pub changed: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks decoded: {}, fields extracted: {}, fields with new values: {}",
            self.chunks, self.extracted, self.changed
        )
    }
}

/// Decode raw dump chunks back into a patch of changed fuse values.
///
/// The DLUT is filtered to the requested (instance, group, kind); chunk *i*
/// decodes against filtered region *i*. Only fields whose extracted value
/// differs from the default are emitted, annotated with the default's prior
/// value; unchanged fields are redundant with the defaults and dropped.
pub fn import_blob(
    chunks: &[Vec<u8>],
    defaults: &[FuseRecord],
    dlut: &[DistributionLutEntry],
    prefix: &str,
    group: u64,
    kind: FuseKind,
) -> FusegenResult<(Vec<FuseRecord>, ImportStats)> {
    let regions = filter_dlut(dlut, prefix, group, kind);
    if regions.is_empty() {
        return Err(FusegenError::MissingInput(format!(
            "no {} DLUT entries found for {prefix} at group {group}",
            kind.label()
        )));
    }

    let mut stats = ImportStats::default();
    let mut output = Vec::new();
    for (chunk, region) in chunks.iter().zip(regions.iter()) {
        stats.chunks += 1;
        debug!(
            "chunk {} base_address: {:#06x}, size: {}",
            stats.chunks - 1,
            region.ram_addr,
            region.size
        );
        let rows = filter_region_defaults(defaults, prefix, region.ram_addr, region.size);
        if rows.is_empty() {
            return Err(FusegenError::MissingInput(format!(
                "no {} default entries found for {prefix} at or above {:#06x}",
                kind.label(),
                region.ram_addr
            )));
        }
        for row in rows {
            let byte_offset = (row.address - region.ram_addr) as usize;
            let value = extract_field(chunk, byte_offset, row.start_bit, row.width);
            stats.extracted += 1;
            if value != row.value {
                let mut changed = row.clone();
                changed.type_tag = format!("(0x{:x})", row.value);
                changed.value = value;
                output.push(changed);
                stats.changed += 1;
            }
        }
    }
    if chunks.len() > regions.len() {
        warn!(
            "{} blob chunks but only {} matching DLUT regions; extra chunks ignored",
            chunks.len(),
            regions.len()
        );
    }

    Ok((output, stats))
}

/// Annotate each byte of a hex dump with the defaults covering its address.
///
/// Purely diagnostic. Each input line carries an eight-character header
/// that is discarded, then two hex characters per byte. Addresses run
/// consecutively from `start_address` across lines. Bytes with no defaults
/// at their exact address are annotated with the nearest preceding entry.
pub fn dump_blob_lines(
    text: &str,
    defaults: &[FuseRecord],
    start_address: u64,
) -> FusegenResult<Vec<String>> {
    if defaults.is_empty() {
        return Err(FusegenError::MissingInput(
            "no default values found".to_string(),
        ));
    }

    let mut out = Vec::new();
    let mut address = start_address;
    let mut byte_num = 0usize;
    for line in text.lines() {
        let data = line.get(8..).unwrap_or_default().trim();
        let bytes = hex::decode(data)
            .map_err(|e| FusegenError::MissingInput(format!("bad hex dump line: {e}")))?;
        for byte in bytes {
            let mut matches = String::new();
            for record in defaults.iter().filter(|r| r.address == address) {
                matches += &format!(" {} ({} {}),", record.name, record.start_bit, record.width);
            }
            if matches.is_empty() {
                // no exact hit; report the most recent entry below this
                // address
                let mut last = &defaults[0];
                for record in defaults {
                    if record.address > address {
                        matches += &format!(
                            " {} (0x{:03x} {} {})",
                            last.name, last.address, last.start_bit, last.width
                        );
                        break;
                    }
                    last = record;
                }
            }
            out.push(format!(
                "{byte_num:03}: a:0x{address:03x} v:0x{byte:02x},{matches}"
            ));
            address += 1;
            byte_num += 1;
        }
    }
    Ok(out)
}

fn read(path: &Path) -> FusegenResult<String> {
    std::fs::read_to_string(path).map_err(|source| FusegenError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_record(name: &str, address: u64, start_bit: u8, width: u32, value: u64) -> FuseRecord {
        FuseRecord {
            name: name.to_string(),
            address,
            start_bit,
            width,
            value,
            type_tag: "(fuse)".to_string(),
            ..Default::default()
        }
    }

    fn region(ram_addr: u64, size: u64) -> DistributionLutEntry {
        DistributionLutEntry {
            instance: "punit0".to_string(),
            port_id_full: 0x42,
            port_id_hi: 0,
            port_id_lo: 0x42,
            sbep: 0,
            group: 1,
            kind: FuseKind::DirectFuse,
            count: 0,
            ram_addr,
            rcvr_addr: 0,
            bar: "BAR0".to_string(),
            size,
            lockout_pos: 0,
            lockout_addr: 0,
        }
    }

    #[test]
    fn test_split_blob_chunks() {
        // two sections: 1 dword then 2 dwords
        let mut bytes = vec![0x00, 0x00, 0x00, 0x01];
        bytes.extend([0xaa, 0xbb, 0xcc, 0xdd]);
        bytes.extend([0x00, 0x00, 0x00, 0x02]);
        bytes.extend([1, 2, 3, 4, 5, 6, 7, 8]);
        let chunks = split_blob_chunks(&bytes);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], vec![0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(chunks[1], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_split_blob_truncated_payload_clamped() {
        let bytes = vec![0x00, 0x00, 0x00, 0x02, 0xaa, 0xbb];
        let chunks = split_blob_chunks(&bytes);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], vec![0xaa, 0xbb]);
    }

    #[test]
    fn test_extract_field_whole_byte() {
        assert_eq!(extract_field(&[0xab], 0, 0, 8), 0xab);
    }

    #[test]
    fn test_extract_field_sub_byte() {
        // 0b1011_0100: bits [2,5) are 0b101
        assert_eq!(extract_field(&[0xb4], 0, 2, 3), 0b101);
    }

    #[test]
    fn test_extract_field_straddles_bytes() {
        // little-endian window 0x21f0: bits [4,12) are 0x1f
        assert_eq!(extract_field(&[0xf0, 0x21], 0, 4, 8), 0x1f);
    }

    #[test]
    fn test_extract_field_past_end_is_zero_filled() {
        assert_eq!(extract_field(&[0xff], 5, 0, 8), 0);
    }

    #[test]
    fn test_import_blob_emits_only_changed_fields() {
        let dlut = vec![region(0x10, 4)];
        let chunk = vec![0xab, 0x00, 0x00, 0x00];
        let defaults = vec![
            default_record("p_changed", 0x10, 0, 8, 0x00),
            default_record("p_same", 0x11, 0, 8, 0x00),
        ];
        let (patch, stats) = import_blob(
            &[chunk],
            &defaults,
            &dlut,
            "p_",
            1,
            FuseKind::DirectFuse,
        )
        .unwrap();
        assert_eq!(stats.extracted, 2);
        assert_eq!(stats.changed, 1);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch[0].name, "p_changed");
        assert_eq!(patch[0].value, 0xab);
        assert_eq!(patch[0].type_tag, "(0x0)");
    }

    #[test]
    fn test_import_blob_unchanged_value_not_emitted() {
        let dlut = vec![region(0x10, 4)];
        let chunk = vec![0xab, 0, 0, 0];
        let defaults = vec![default_record("p_f", 0x10, 0, 8, 0xab)];
        let (patch, stats) =
            import_blob(&[chunk], &defaults, &dlut, "p_", 1, FuseKind::DirectFuse).unwrap();
        assert!(patch.is_empty());
        assert_eq!(stats.extracted, 1);
    }

    #[test]
    fn test_import_blob_respects_region_capacity() {
        // region holds one byte; the second default is beyond capacity
        let dlut = vec![region(0x10, 1)];
        let chunk = vec![0xff];
        let defaults = vec![
            default_record("p_a", 0x10, 0, 8, 0),
            default_record("p_b", 0x11, 0, 8, 0),
        ];
        let (patch, stats) =
            import_blob(&[chunk], &defaults, &dlut, "p_", 1, FuseKind::DirectFuse).unwrap();
        assert_eq!(stats.extracted, 1);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch[0].name, "p_a");
    }

    #[test]
    fn test_import_blob_no_region_is_error() {
        let err = import_blob(&[], &[], &[], "p_", 1, FuseKind::DirectFuse).unwrap_err();
        assert!(err.to_string().contains("no DirectFuse DLUT entries"));
    }

    #[test]
    fn test_filter_dlut_matches_all_three_keys() {
        let mut strap = region(0x10, 4);
        strap.kind = FuseKind::SoftStrap;
        let mut other_group = region(0x20, 4);
        other_group.group = 2;
        let dlut = vec![region(0x0, 4), strap, other_group];
        assert_eq!(filter_dlut(&dlut, "punit0", 1, FuseKind::DirectFuse).len(), 1);
        assert_eq!(filter_dlut(&dlut, "punit0", 1, FuseKind::SoftStrap).len(), 1);
        assert_eq!(filter_dlut(&dlut, "other", 1, FuseKind::DirectFuse).len(), 0);
    }

    #[test]
    fn test_dump_blob_lines() {
        let defaults = vec![
            default_record("at_x10", 0x10, 0, 8, 0),
            default_record("at_x12", 0x12, 0, 8, 0),
        ];
        // 8-char header then three bytes
        let lines = dump_blob_lines("00000000aabbcc", &defaults, 0x10).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "000: a:0x010 v:0xaa, at_x10 (0 8),");
        // no default at 0x11: nearest preceding entry reported
        assert_eq!(lines[1], "001: a:0x011 v:0xbb, at_x10 (0x010 0 8)");
        assert_eq!(lines[2], "002: a:0x012 v:0xcc, at_x12 (0 8),");
    }
}
