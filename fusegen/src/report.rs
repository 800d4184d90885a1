// Licensed under the Apache-2.0 license

//! Write-only report rendering: the CSV dumps and operator-facing text
//! reports. Renderers build a `String`; callers persist or print it.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::catalog::LockoutMaskReport;
use crate::types::{DistributionLutEntry, FuseKind, HighGroupRecord, IpInstance, LockbitEntry};

/// Lockbits CSV: one row per real lockout fuse with its bit flag.
/// Reserved placeholders (no lockout id) are skipped.
pub fn render_lockbits_csv(lockbits: &[LockbitEntry]) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "\"Name\",\"RamAddr\",\"Category\",\"CatLockoutId\",\"LockIdBit\""
    )
    .unwrap();
    for bit in lockbits {
        let Some(id) = bit.lockout_id else {
            continue;
        };
        let flag = 1u64.checked_shl(id as u32).unwrap_or_default();
        writeln!(
            out,
            "\"{}\",{:#06x},\"{}\",{},\"{:#x}\"",
            bit.name, bit.address, bit.category, id, flag
        )
        .unwrap();
    }
    out
}

/// Names-only listing of the real lockout fuses, one per line.
pub fn render_lockbit_names(lockbits: &[LockbitEntry]) -> String {
    let mut out = String::new();
    for bit in lockbits.iter().filter(|b| b.lockout_id.is_some()) {
        writeln!(out, "{}", bit.name).unwrap();
    }
    out
}

/// High-group report CSV: fuses/straps using non-conventional groups.
pub fn render_high_groups_csv(records: &[HighGroupRecord]) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "\"CATEGORY\",\"PORTID\",\"NAME\",\"ADDR\",\"TYPE\",\"GROUPNUM\""
    )
    .unwrap();
    for record in records {
        writeln!(
            out,
            "\"{}\",{:#02x},\"{}\",{:#06x},\"{}\",{}",
            record.category, record.port_id, record.name, record.address, record.kind, record.group
        )
        .unwrap();
    }
    out
}

/// Distribution LUT CSV dump.
pub fn render_dlut_csv(dlut: &[DistributionLutEntry]) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "\"INSTANCE\",\"PORTID_FULL\",\"HIPORTID\",\"LOPORTID\",\"SBEP\",\"GROUP\",\"TYPE\",\"COUNT\",\"RAM_ADDR\",\"RCVR_ADDR\",\"BAR\",\"SIZE\",\"LOCKOUTPOS\",\"LOCKOUTADDR\",\"SORTKEY\""
    )
    .unwrap();
    for entry in dlut {
        writeln!(
            out,
            "\"{}\",{:#06x},{:#04x},{:#04x},{},{},\"{}\",{},{:#04x},{:#04x},\"{}\",{},{:#04x},{:#04x},{:#x}",
            entry.instance,
            entry.port_id_full,
            entry.port_id_hi,
            entry.port_id_lo,
            entry.sbep,
            entry.group,
            entry.kind,
            entry.count,
            entry.ram_addr,
            entry.rcvr_addr,
            entry.bar,
            entry.size,
            entry.lockout_pos,
            entry.lockout_addr,
            entry.sort_key()
        )
        .unwrap();
    }
    out
}

/// SOC IP-instance CSV dump.
pub fn render_ip_info_csv(instances: &[IpInstance]) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "\"IP\",\"INSTANCE\",\"HIPORTID\",\"LOPORTID\",\"PORTID_FULL\",\"SBEP\",\"PULL_TRIGGER\""
    )
    .unwrap();
    for ip in instances {
        writeln!(
            out,
            "\"{}\",\"{}\",{:#04x},{:#04x},{:#06x},{},\"{}\"",
            ip.ip, ip.instance, ip.port_id_hi, ip.port_id_lo, ip.port_id_full, ip.sbep,
            ip.pull_trigger
        )
        .unwrap();
    }
    out
}

/// Combined lockout-mask report: per-category contributions, the final
/// padded mask value, and the total width of the contributing fuses.
pub fn render_lockout_masks(report: &LockoutMaskReport) -> String {
    let mut out = String::new();
    for category in &report.categories {
        writeln!(out, "\nComputing {} LVID values...", category.category).unwrap();
        for (name, flag) in &category.contributions {
            writeln!(out, "{name} lockout bit: {flag:#x}").unwrap();
        }
        // pad the final value to the category row's width: one digit per
        // four bits, plus the 0x prefix
        let digits = (category.row_width / 4) as usize;
        writeln!(
            out,
            "{} value for {} fuses: {:#0width$x}",
            category.reg_name,
            category.category,
            category.mask,
            width = digits + 2
        )
        .unwrap();
        let bytes = category.combined_width / 8;
        writeln!(
            out,
            "Total width of {} fuses in bits: {} ({} bytes/{:#x} hex)",
            category.category, category.combined_width, bytes, bytes
        )
        .unwrap();
    }
    writeln!(
        out,
        "\nNOTE: Remove the '0x' prefix if pasting the LockoutID value into a fuse patch file."
    )
    .unwrap();
    for name in &report.unmatched {
        writeln!(
            out,
            "WARNING: Could not find valid fuse named {name} for any fuse category."
        )
        .unwrap();
    }
    out
}

/// Per-instance distribution stats: for every (instance, kind, group),
/// the total region size, row count, and minimum base addresses.
pub fn render_distribution_stats(dlut: &[DistributionLutEntry]) -> String {
    #[derive(Default)]
    struct GroupStats {
        size_total: u64,
        rows: u64,
        base_ram_addr: u64,
        base_rcvr_addr: u64,
    }
    struct InstanceStats {
        port_id_full: u64,
        sbep: u64,
        fuse_groups: BTreeMap<u64, GroupStats>,
        strap_groups: BTreeMap<u64, GroupStats>,
    }

    let mut instances: BTreeMap<String, InstanceStats> = BTreeMap::new();
    for entry in dlut {
        let instance = instances
            .entry(entry.instance.clone())
            .or_insert_with(|| InstanceStats {
                port_id_full: entry.port_id_full,
                sbep: entry.sbep,
                fuse_groups: BTreeMap::new(),
                strap_groups: BTreeMap::new(),
            });
        let groups = match entry.kind {
            FuseKind::DirectFuse => &mut instance.fuse_groups,
            FuseKind::SoftStrap => &mut instance.strap_groups,
        };
        let group = groups.entry(entry.group).or_insert_with(|| GroupStats {
            base_ram_addr: u64::MAX,
            base_rcvr_addr: u64::MAX,
            ..Default::default()
        });
        group.size_total += entry.size;
        group.rows += 1;
        group.base_ram_addr = group.base_ram_addr.min(entry.ram_addr);
        group.base_rcvr_addr = group.base_rcvr_addr.min(entry.rcvr_addr);
    }

    let mut out = String::new();
    for (name, instance) in &instances {
        writeln!(
            out,
            "{name} (SBID {:#06x}, SBEP {})",
            instance.port_id_full, instance.sbep
        )
        .unwrap();
        let render_groups = |out: &mut String, label: &str, groups: &BTreeMap<u64, GroupStats>| {
            for (group, stats) in groups {
                writeln!(
                    out,
                    " - {label} group {group}, size: {}, rows: {}, base RAM addr: {:#06x}, base RCVR addr: {:#06x}",
                    stats.size_total, stats.rows, stats.base_ram_addr, stats.base_rcvr_addr
                )
                .unwrap();
            }
        };
        render_groups(&mut out, "Fuse", &instance.fuse_groups);
        render_groups(&mut out, "Strap", &instance.strap_groups);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn lockbit(name: &str, id: Option<u64>) -> LockbitEntry {
        LockbitEntry {
            name: name.to_string(),
            address: 0x10,
            category: "IntelHVM".to_string(),
            lockout_id: id,
            width: 8,
        }
    }

    #[test]
    fn test_lockbits_csv_skips_placeholders() {
        let csv = render_lockbits_csv(&[lockbit("real", Some(3)), lockbit("reserved", None)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "\"real\",0x0010,\"IntelHVM\",3,\"0x8\""
        );
    }

    #[test]
    fn test_lockbit_names() {
        let text = render_lockbit_names(&[lockbit("real", Some(3)), lockbit("reserved", None)]);
        assert_eq!(text, "real\n");
    }

    #[test]
    fn test_high_groups_csv() {
        let records = vec![HighGroupRecord {
            category: "IntelHVM".to_string(),
            port_id: 0x42,
            name: "fuse_a".to_string(),
            address: 0x10,
            kind: FuseKind::DirectFuse,
            group: 5,
        }];
        let csv = render_high_groups_csv(&records);
        assert!(csv.contains("\"IntelHVM\",0x42,\"fuse_a\",0x0010,\"DirectFuse\",5"));
    }

    #[test]
    fn test_lockout_mask_padding() {
        let catalog = Catalog::parse(
            r#"
<FuseGen>
  <Constants>
    <Constant Name="INTELHVM_LOVLD_ROWBEGIN" Value="1"/>
  </Constants>
  <DirectFuses>
    <Fuse>
      <name>f</name>
      <RamAddr>0</RamAddr><StartBit>0</StartBit><FUSE_WIDTH>8</FUSE_WIDTH>
      <FuseDefaultValue>0</FuseDefaultValue><Category>IntelHVM</Category>
      <CatLockoutID>2</CatLockoutID><Group>DirectFuse</Group>
      <GroupNumber>0</GroupNumber><IOSFSBPortID>1</IOSFSBPortID>
      <RcvrAddr>0</RcvrAddr>
    </Fuse>
    <Fuse>
      <name>SOCFuseGen_reserved_LockoutID_IntelHVM_row_1_bit_0</name>
      <RamAddr>0x20</RamAddr><StartBit>0</StartBit><FUSE_WIDTH>32</FUSE_WIDTH>
      <FuseDefaultValue>0</FuseDefaultValue><Category>IntelHVM</Category>
      <CatLockoutID>0</CatLockoutID><Group>DirectFuse</Group>
      <GroupNumber>0</GroupNumber><IOSFSBPortID></IOSFSBPortID>
      <RcvrAddr>0</RcvrAddr>
    </Fuse>
  </DirectFuses>
</FuseGen>
"#,
        )
        .unwrap();
        let report = catalog.lockout_masks(&["f".to_string()]);
        let text = render_lockout_masks(&report);
        // 32-bit row pads the mask to eight hex digits
        assert!(text.contains("value for IntelHVM fuses: 0x00000004"));
        assert!(text.contains("Total width of IntelHVM fuses in bits: 8 (1 bytes/0x1 hex)"));
    }

    #[test]
    fn test_distribution_stats() {
        let entry = |group: u64, ram: u64, size: u64| DistributionLutEntry {
            instance: "punit0".to_string(),
            port_id_full: 0x42,
            port_id_hi: 0,
            port_id_lo: 0x42,
            sbep: 0,
            group,
            kind: FuseKind::DirectFuse,
            count: 0,
            ram_addr: ram,
            rcvr_addr: ram + 0x100,
            bar: "BAR0".to_string(),
            size,
            lockout_pos: 0,
            lockout_addr: 0,
        };
        let text = render_distribution_stats(&[entry(1, 0x20, 4), entry(1, 0x10, 8)]);
        assert!(text.contains("punit0 (SBID 0x0042, SBEP 0)"));
        assert!(text.contains(
            " - Fuse group 1, size: 12, rows: 2, base RAM addr: 0x0010, base RCVR addr: 0x0110"
        ));
    }
}
