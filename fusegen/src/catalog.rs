// Licensed under the Apache-2.0 license

//! Fuse catalog reader.
//!
//! Parses a fuse-generation descriptor document into an in-memory catalog:
//! the flat fuse/softstrap lists, the per-category lockout constants, the
//! distribution lookup table, and the IP-instance port-id table. The
//! document is an externally-defined format and is never written back.
//!
//! Structural problems (wrong root element, missing required attributes)
//! abort the load; problems confined to a single fuse element are logged
//! and the element is skipped.

use std::collections::HashMap;
use std::path::Path;

use log::warn;
use roxmltree::{Document, Node};

use crate::error::{FusegenError, FusegenResult};
use crate::types::{
    combine_port_id, DistributionLutEntry, FuseKind, FuseRecord, HighGroupRecord, IpInstance,
    LockbitEntry, LockoutConstant, LOCKOUT_CATEGORIES,
};
use crate::util::sanitize_name;
use crate::value::{parse_literal, parse_literal_checked};

/// Expected document root element.
const ROOT_TAG: &str = "FuseGen";

/// Conventional strap group number; anything else is non-standard.
const STANDARD_STRAP_GROUP: u64 = 4;
/// Conventional maximum fuse group number.
const MAX_STANDARD_FUSE_GROUP: u64 = 3;

/// The full parsed contents of a fuse-generation descriptor.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    /// Direct fuses, in document order.
    pub fuses: Vec<FuseRecord>,
    /// Soft straps, in document order.
    pub straps: Vec<FuseRecord>,
    /// Lockout-ID view of the direct fuses.
    pub lockbits: Vec<LockbitEntry>,
    /// One entry per fixed category; unresolved entries are zeroed.
    pub lockouts: Vec<LockoutConstant>,
    /// Distribution lookup table, sorted by emission-order key.
    pub dlut: Vec<DistributionLutEntry>,
    /// SOC IP-instance port-id table.
    pub ip_instances: Vec<IpInstance>,
    /// Fuses/straps using non-conventional group numbers.
    pub high_groups: Vec<HighGroupRecord>,
}

impl Catalog {
    pub fn from_file(path: &Path) -> FusegenResult<Catalog> {
        let text = std::fs::read_to_string(path).map_err(|source| FusegenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(xml: &str) -> FusegenResult<Catalog> {
        let doc = Document::parse(xml).map_err(|e| FusegenError::Catalog(e.to_string()))?;
        let root = doc.root_element();
        if root.tag_name().name() != ROOT_TAG {
            return Err(FusegenError::Catalog(format!(
                "expected root element {ROOT_TAG}, found {}",
                root.tag_name().name()
            )));
        }

        let mut catalog = Catalog::default();
        let mut constants = HashMap::new();
        for section in root.children().filter(Node::is_element) {
            match section.tag_name().name() {
                "DirectFuses" => catalog.parse_fuse_section(section, FuseKind::DirectFuse),
                "SoftStraps" => catalog.parse_fuse_section(section, FuseKind::SoftStrap),
                "Constants" => parse_constants(section, &mut constants),
                "DistributionLUT" => catalog.parse_dlut(section)?,
                "SOC" => catalog.parse_soc(section),
                _ => {}
            }
        }

        catalog.resolve_lockouts(&constants);
        catalog.resolve_dlut_instances();
        Ok(catalog)
    }

    /// All catalog records as a fresh list, optionally including softstraps.
    pub fn records(&self, include_straps: bool) -> Vec<FuseRecord> {
        let mut records = self.fuses.clone();
        if include_straps {
            records.extend(self.straps.iter().cloned());
        }
        records
    }

    /// Direct fuses whose names start with `prefix` (empty prefix keeps all).
    pub fn fuses_with_prefix(&self, prefix: &str) -> Vec<FuseRecord> {
        self.fuses
            .iter()
            .filter(|f| prefix.is_empty() || f.name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Records whose names contain any of the given fragments.
    pub fn matching_records(&self, needles: &[String], include_straps: bool) -> Vec<FuseRecord> {
        let pool = self.records(include_straps);
        pool.into_iter()
            .filter(|r| needles.iter().any(|n| r.name.contains(n.as_str())))
            .collect()
    }

    /// Compute the combined lockout-ID bit mask per category for the named
    /// fuses, plus the list of names that matched no fuse in any category.
    pub fn lockout_masks(&self, names: &[String]) -> LockoutMaskReport {
        let categories = self
            .lockouts
            .iter()
            .map(|lockout| {
                let mut mask = CategoryMask {
                    category: lockout.category.clone(),
                    reg_name: lockout.reg_name.clone(),
                    row_width: lockout.width,
                    mask: 0,
                    combined_width: 0,
                    contributions: Vec::new(),
                };
                for name in names {
                    let hit = self.lockbits.iter().find(|b| {
                        b.category == lockout.category
                            && b.lockout_id.is_some()
                            && b.name == *name
                    });
                    if let Some(bit) = hit {
                        let id = bit.lockout_id.unwrap_or_default();
                        let Some(flag) = 1u64.checked_shl(id as u32) else {
                            warn!("lockout id {id} of {name} exceeds the mask width");
                            continue;
                        };
                        mask.mask |= flag;
                        mask.combined_width += bit.width;
                        mask.contributions.push((name.clone(), flag));
                    }
                }
                mask
            })
            .collect();

        let unmatched = names
            .iter()
            .filter(|name| !self.lockbits.iter().any(|b| b.name == **name))
            .cloned()
            .collect();
        LockoutMaskReport {
            categories,
            unmatched,
        }
    }

    fn parse_fuse_section(&mut self, section: Node, kind: FuseKind) {
        for node in section.children().filter(Node::is_element) {
            let raw_name = child_text(node, "name");
            if raw_name.is_empty() {
                warn!("skipping {} element without a name", kind.label());
                continue;
            }
            let name = sanitize_name(raw_name);
            let record = match fuse_record(node, &name, kind) {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping {}: {e}", name);
                    continue;
                }
            };

            if kind == FuseKind::DirectFuse {
                self.push_lockbit(node, raw_name, &record);
            }
            self.push_high_group(node, &record);

            match kind {
                FuseKind::DirectFuse => self.fuses.push(record),
                FuseKind::SoftStrap => self.straps.push(record),
            }
        }
    }

    fn push_lockbit(&mut self, node: Node, raw_name: &str, record: &FuseRecord) {
        let lock_id = match parse_literal(child_text(node, "CatLockoutID")) {
            Ok(id) => id,
            Err(e) => {
                warn!("skipping lockbit for {}: {e}", record.name);
                return;
            }
        };
        // an ID of 0 on a generator-reserved entry is not a real lockout bit
        let lockout_id = if lock_id == 0 && raw_name.contains("SOCFuseGen_reserved") {
            None
        } else {
            Some(lock_id)
        };
        self.lockbits.push(LockbitEntry {
            name: record.name.clone(),
            address: record.address,
            category: record.category.clone(),
            lockout_id,
            width: record.width,
        });
    }

    fn push_high_group(&mut self, node: Node, record: &FuseRecord) {
        let Some(kind) = FuseKind::from_label(child_text(node, "Group")) else {
            return;
        };
        let group = match parse_literal(child_text(node, "GroupNumber")) {
            Ok(group) => group,
            Err(_) => return,
        };
        let matches = match kind {
            FuseKind::SoftStrap => group != STANDARD_STRAP_GROUP,
            FuseKind::DirectFuse => group > MAX_STANDARD_FUSE_GROUP,
        };
        // entries without a port id are internal placeholders, not real
        // fuses or straps
        let port_text = child_text(node, "IOSFSBPortID");
        if !matches || port_text.is_empty() {
            return;
        }
        let Ok(port_id) = parse_literal(port_text) else {
            return;
        };
        self.high_groups.push(HighGroupRecord {
            category: record.category.clone(),
            port_id,
            name: record.name.clone(),
            address: record.address,
            kind,
            group,
        });
    }

    fn parse_dlut(&mut self, section: Node) -> FusegenResult<()> {
        for node in section.children().filter(Node::is_element) {
            let attr = |name: &str| -> FusegenResult<&str> {
                node.attribute(name).ok_or_else(|| {
                    FusegenError::Catalog(format!("DLUT entry missing attribute {name}"))
                })
            };
            let num = |name: &str| -> FusegenResult<u64> { parse_literal(attr(name)?) };

            let kind_label = attr("Group")?;
            let Some(kind) = FuseKind::from_label(kind_label) else {
                warn!("skipping DLUT entry with unknown kind {kind_label}");
                continue;
            };
            let port_id_hi = num("IOSFSBHierarchicalPortID")?;
            let port_id_lo = num("IOSFSBPortID")?;
            self.dlut.push(DistributionLutEntry {
                instance: String::new(),
                port_id_full: combine_port_id(port_id_hi, port_id_lo),
                port_id_hi,
                port_id_lo,
                sbep: num("IOSFSBEP")?,
                group: num("GroupNumber")?,
                kind,
                count: num("Count")?,
                ram_addr: num("RamAddr")?,
                rcvr_addr: num("RcvrAddr")?,
                bar: attr("BAR")?.to_string(),
                size: num("DataSize")?,
                lockout_pos: num("LockoutIDBitPosition")?,
                lockout_addr: num("LockoutIDRowAddress")?,
            });
        }
        Ok(())
    }

    fn parse_soc(&mut self, section: Node) {
        for node in section.children().filter(Node::is_element) {
            let attr = |name: &str| node.attribute(name).unwrap_or_default();
            let num = |name: &str| parse_literal(attr(name)).unwrap_or_default();
            let port_id_hi = num("IOSFSBHierarchicalPortID");
            let port_id_lo = num("IOSFSBPortID");
            self.ip_instances.push(IpInstance {
                ip: attr("IP").to_string(),
                instance: attr("Instance").to_string(),
                port_id_hi,
                port_id_lo,
                port_id_full: combine_port_id(port_id_hi, port_id_lo),
                sbep: num("IOSFSBEP"),
                pull_trigger: attr("PullTrigger").to_string(),
            });
        }
    }

    fn resolve_lockouts(&mut self, constants: &HashMap<String, u64>) {
        self.lockouts = LOCKOUT_CATEGORIES
            .iter()
            .map(|(const_prefix, reg_prefix)| {
                let mut entry = LockoutConstant {
                    const_prefix: const_prefix.to_string(),
                    category: reg_prefix.to_string(),
                    ..Default::default()
                };
                let Some(&begin) = constants.get(&format!("{const_prefix}_LOVLD_ROWBEGIN")) else {
                    return entry;
                };
                entry.row_begin = begin;
                // row end can't be lower than row begin
                entry.row_end = constants
                    .get(&format!("{const_prefix}_LOVLD_ROWEND"))
                    .copied()
                    .unwrap_or(begin)
                    .max(begin);
                entry.reg_name =
                    format!("SOCFuseGen_reserved_LockoutID_{reg_prefix}_row_{begin}_bit_0");
                if let Some(fuse) = self
                    .fuses
                    .iter()
                    .chain(self.straps.iter())
                    .find(|f| f.name == entry.reg_name)
                {
                    entry.address = fuse.address;
                    entry.width = fuse.width;
                }
                entry
            })
            .collect();
    }

    fn resolve_dlut_instances(&mut self) {
        for entry in &mut self.dlut {
            match self
                .ip_instances
                .iter()
                .find(|ip| ip.port_id_full == entry.port_id_full)
            {
                Some(ip) => entry.instance = ip.instance.clone(),
                None => warn!(
                    "no instance found matching portid {:#06x}",
                    entry.port_id_full
                ),
            }
        }
        self.dlut.sort_by_key(DistributionLutEntry::sort_key);
    }
}

/// Combined lockout-ID mask for one category.
#[derive(Clone, Debug)]
pub struct CategoryMask {
    pub category: String,
    pub reg_name: String,
    /// Width of the category's lockout row in bits.
    pub row_width: u32,
    pub mask: u64,
    /// Total width of the contributing fuses in bits.
    pub combined_width: u32,
    /// Per-fuse contribution: name and bit flag.
    pub contributions: Vec<(String, u64)>,
}

/// Result of [`Catalog::lockout_masks`].
#[derive(Clone, Debug)]
pub struct LockoutMaskReport {
    pub categories: Vec<CategoryMask>,
    /// Names that matched no fuse in any category.
    pub unmatched: Vec<String>,
}

fn fuse_record(node: Node, name: &str, kind: FuseKind) -> FusegenResult<FuseRecord> {
    let width = parse_literal(child_text(node, "FUSE_WIDTH"))? as u32;
    Ok(FuseRecord {
        name: name.to_string(),
        address: parse_literal(child_text(node, "RamAddr"))?,
        start_bit: parse_literal(child_text(node, "StartBit"))? as u8,
        width,
        value: parse_literal_checked(child_text(node, "FuseDefaultValue"), width, name)?,
        category: child_text(node, "Category").to_string(),
        type_tag: kind.label().to_string(),
        rcvr_addr: parse_literal(child_text(node, "RcvrAddr"))?,
        ..Default::default()
    })
}

fn parse_constants(section: Node, constants: &mut HashMap<String, u64>) {
    for node in section.children().filter(Node::is_element) {
        if node.tag_name().name() != "Constant" {
            continue;
        }
        let (Some(name), Some(value)) = (node.attribute("Name"), node.attribute("Value")) else {
            continue;
        };
        match parse_literal(value) {
            Ok(value) => {
                constants.insert(name.to_string(), value);
            }
            Err(e) => warn!("skipping constant {name}: {e}"),
        }
    }
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.children()
        .find(|c| c.tag_name().name() == name)
        .and_then(|c| c.text())
        .map(str::trim)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
<FuseGen>
  <Constants>
    <Constant Name="INTELHVM_LOVLD_ROWBEGIN" Value="5"/>
    <Constant Name="INTELHVM_LOVLD_ROWEND" Value="6"/>
  </Constants>
  <DirectFuses>
    <Fuse>
      <name>soc/fuse a</name>
      <RamAddr>0x10</RamAddr>
      <StartBit>0</StartBit>
      <FUSE_WIDTH>8</FUSE_WIDTH>
      <FuseDefaultValue>0xAB</FuseDefaultValue>
      <Category>IntelHVM</Category>
      <CatLockoutID>3</CatLockoutID>
      <Group>DirectFuse</Group>
      <GroupNumber>5</GroupNumber>
      <IOSFSBPortID>0x42</IOSFSBPortID>
      <RcvrAddr>0x100</RcvrAddr>
    </Fuse>
    <Fuse>
      <name>SOCFuseGen_reserved_LockoutID_IntelHVM_row_5_bit_0</name>
      <RamAddr>0x20</RamAddr>
      <StartBit>0</StartBit>
      <FUSE_WIDTH>32</FUSE_WIDTH>
      <FuseDefaultValue>0</FuseDefaultValue>
      <Category>IntelHVM</Category>
      <CatLockoutID>0</CatLockoutID>
      <Group>DirectFuse</Group>
      <GroupNumber>0</GroupNumber>
      <IOSFSBPortID></IOSFSBPortID>
      <RcvrAddr>0x0</RcvrAddr>
    </Fuse>
  </DirectFuses>
  <SoftStraps>
    <SoftStrap>
      <name>strap_b</name>
      <RamAddr>0x30</RamAddr>
      <StartBit>2</StartBit>
      <FUSE_WIDTH>2</FUSE_WIDTH>
      <FuseDefaultValue>1</FuseDefaultValue>
      <Category>OEMIFP</Category>
      <Group>SoftStrap</Group>
      <GroupNumber>6</GroupNumber>
      <IOSFSBPortID>0x43</IOSFSBPortID>
      <RcvrAddr>0x200</RcvrAddr>
    </SoftStrap>
  </SoftStraps>
  <SOC>
    <Entry IP="punit" Instance="punit0" IOSFSBEP="0"
           IOSFSBHierarchicalPortID="0x00" IOSFSBPortID="0x42"
           PullTrigger="auto"/>
  </SOC>
  <DistributionLUT>
    <Entry IOSFSBEP="0" IOSFSBHierarchicalPortID="0x00" IOSFSBPortID="0x42"
           GroupNumber="1" Group="DirectFuse" Count="0" RcvrAddr="0x100"
           BAR="BAR0" RamAddr="0x10" DataSize="4"
           LockoutIDBitPosition="0" LockoutIDRowAddress="0"/>
    <Entry IOSFSBEP="0" IOSFSBHierarchicalPortID="0x00" IOSFSBPortID="0x42"
           GroupNumber="0" Group="DirectFuse" Count="0" RcvrAddr="0x100"
           BAR="BAR0" RamAddr="0x0" DataSize="16"
           LockoutIDBitPosition="0" LockoutIDRowAddress="0"/>
  </DistributionLUT>
</FuseGen>
"#;

    #[test]
    fn test_wrong_root_rejected() {
        let err = Catalog::parse("<NotFuseGen/>").unwrap_err();
        assert!(err.to_string().contains("FuseGen"));
    }

    #[test]
    fn test_fuse_fields_and_name_sanitization() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.fuses.len(), 2);
        let fuse = &catalog.fuses[0];
        assert_eq!(fuse.name, "soc_fuse_a");
        assert_eq!(fuse.address, 0x10);
        assert_eq!(fuse.start_bit, 0);
        assert_eq!(fuse.width, 8);
        assert_eq!(fuse.value, 0xAB);
        assert_eq!(fuse.category, "IntelHVM");
        assert_eq!(fuse.rcvr_addr, 0x100);
        assert_eq!(fuse.type_tag, "DirectFuse");
    }

    #[test]
    fn test_straps_parsed_separately() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.straps.len(), 1);
        assert_eq!(catalog.straps[0].name, "strap_b");
        assert_eq!(catalog.records(false).len(), 2);
        assert_eq!(catalog.records(true).len(), 3);
    }

    #[test]
    fn test_lockbits_reserved_placeholder() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.lockbits.len(), 2);
        assert_eq!(catalog.lockbits[0].lockout_id, Some(3));
        // reserved entry with id 0 is not a real lockout fuse
        assert_eq!(catalog.lockbits[1].lockout_id, None);
    }

    #[test]
    fn test_lockout_constants() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.lockouts.len(), 3);
        let hvm = &catalog.lockouts[0];
        assert_eq!(hvm.category, "IntelHVM");
        assert_eq!(hvm.row_begin, 5);
        assert_eq!(hvm.row_end, 6);
        assert_eq!(
            hvm.reg_name,
            "SOCFuseGen_reserved_LockoutID_IntelHVM_row_5_bit_0"
        );
        assert_eq!(hvm.address, 0x20);
        assert_eq!(hvm.width, 32);
        // categories absent from the document stay zeroed
        let ifp = &catalog.lockouts[1];
        assert_eq!(ifp.category, "IntelIFP");
        assert_eq!(ifp.address, 0);
        assert_eq!(ifp.width, 0);
    }

    #[test]
    fn test_high_groups() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        // fuse at group 5 (>3) and strap at group 6 (!=4) qualify; the
        // reserved fuse has no port id and is excluded
        assert_eq!(catalog.high_groups.len(), 2);
        assert_eq!(catalog.high_groups[0].name, "soc_fuse_a");
        assert_eq!(catalog.high_groups[0].group, 5);
        assert_eq!(catalog.high_groups[1].name, "strap_b");
        assert_eq!(catalog.high_groups[1].kind, FuseKind::SoftStrap);
    }

    #[test]
    fn test_dlut_sorted_and_resolved() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.dlut.len(), 2);
        // sorted by the emission-order key: group 0 before group 1
        assert_eq!(catalog.dlut[0].group, 0);
        assert_eq!(catalog.dlut[1].group, 1);
        assert_eq!(catalog.dlut[0].instance, "punit0");
        assert_eq!(catalog.dlut[0].port_id_full, 0x42);
    }

    #[test]
    fn test_ip_instances() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.ip_instances.len(), 1);
        let ip = &catalog.ip_instances[0];
        assert_eq!(ip.ip, "punit");
        assert_eq!(ip.instance, "punit0");
        assert_eq!(ip.port_id_full, 0x42);
    }

    #[test]
    fn test_matching_records() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let matches = catalog.matching_records(&["fuse_a".to_string()], true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "soc_fuse_a");
        let matches = catalog.matching_records(&["strap".to_string()], true);
        assert_eq!(matches.len(), 1);
        let matches = catalog.matching_records(&["strap".to_string()], false);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_lockout_masks() {
        let catalog = Catalog::parse(SAMPLE).unwrap();
        let report = catalog.lockout_masks(&["soc_fuse_a".to_string(), "bogus".to_string()]);
        let hvm = &report.categories[0];
        assert_eq!(hvm.mask, 1 << 3);
        assert_eq!(hvm.combined_width, 8);
        assert_eq!(hvm.contributions.len(), 1);
        assert_eq!(report.unmatched, vec!["bogus".to_string()]);
    }

    #[test]
    fn test_missing_dlut_attribute_aborts() {
        let xml = r#"<FuseGen><DistributionLUT><Entry Group="DirectFuse"/></DistributionLUT></FuseGen>"#;
        let err = Catalog::parse(xml).unwrap_err();
        assert!(err.to_string().contains("missing attribute"));
    }
}
