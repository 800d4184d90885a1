// Licensed under the Apache-2.0 license

//! Patch reconciliation: the list-to-list transforms over fuse records.
//!
//! Every operation is a pure function over its input slices, returning a
//! fresh output list plus a statistics struct for operator reporting. Input
//! lists are never mutated; each invocation is replayable given the same
//! inputs.

use std::fmt;

use log::{info, warn};

use crate::overrides::OverrideItem;
use crate::types::{find_by_name, sort_by_bit_position, FuseRecord};

/// Counts reported by [`merge_patches`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub unchanged: usize,
    pub changed: usize,
    pub added: usize,
    pub locked_skipped: usize,
    pub total: usize,
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matching items that were unchanged: {}", self.unchanged)?;
        writeln!(f, "Matching items with new values: {}", self.changed)?;
        writeln!(f, "Newly-added items: {}", self.added)?;
        writeln!(
            f,
            "Items skipped because they are locked: {}",
            self.locked_skipped
        )?;
        write!(f, "Total items returned: {}", self.total)
    }
}

/// Combine two patches into one.
///
/// `old` is the base. For every record in `new`: a name listed in `locked`
/// is skipped; a record already in the base overwrites the base value when
/// different (the prior value is recorded in the annotation); an unknown
/// record is appended. Merging a patch with itself is the identity.
pub fn merge_patches(
    old: &[FuseRecord],
    new: &[FuseRecord],
    locked: &[String],
) -> (Vec<FuseRecord>, MergeStats) {
    let mut merged: Vec<FuseRecord> = old.to_vec();
    let mut stats = MergeStats::default();

    for item in new {
        if locked.contains(&item.name) {
            info!("{} is a locked item", item.name);
            stats.locked_skipped += 1;
            continue;
        }
        match merged.iter_mut().find(|r| r.name == item.name) {
            Some(found) => {
                if found.value != item.value {
                    found.type_tag = format!("0x{:x}", found.value);
                    found.value = item.value;
                    stats.changed += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
            None => {
                merged.push(item.clone());
                stats.added += 1;
            }
        }
    }

    stats.total = merged.len();
    (merged, stats)
}

/// Counts reported by [`update_patch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub updated: usize,
    pub not_found: usize,
    pub skipped_default: usize,
    pub total_input: usize,
}

impl fmt::Display for UpdateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fuses updated: {} out of {}",
            self.updated, self.total_input
        )?;
        writeln!(
            f,
            "Fuses not updated (missing from default values file): {} out of {}",
            self.not_found, self.total_input
        )?;
        write!(
            f,
            "Fuses skipped because their values are the same as default: {}",
            self.skipped_default
        )
    }
}

/// Rebuild a patch against a new defaults list.
///
/// Values come from `old`; address, start bit, width, and annotation come
/// from the defaults entry of the same name. Records missing from the
/// defaults are dropped. Config-stub records whose value matches the
/// default carry no information and are marked `skip`. Records that end up
/// with neither an address nor a width are dropped as data-free.
pub fn update_patch(old: &[FuseRecord], defaults: &[FuseRecord]) -> (Vec<FuseRecord>, UpdateStats) {
    let mut stats = UpdateStats {
        total_input: old.len(),
        ..Default::default()
    };
    let mut updated = Vec::new();

    for record in old {
        let Some(default) = find_by_name(&record.name, defaults) else {
            warn!(
                "could not find item named {} in default values",
                record.name
            );
            stats.not_found += 1;
            continue;
        };
        if record.is_config_stub && record.value == default.value {
            info!(
                "skipping {} since its value is same as default ({:#x})",
                record.name, record.value
            );
            stats.skipped_default += 1;
            continue;
        }
        // the value is the only thing kept from the old patch
        let mut rebuilt = record.clone();
        rebuilt.address = default.address;
        rebuilt.start_bit = default.start_bit;
        rebuilt.width = default.width;
        rebuilt.type_tag = default.type_tag.clone();
        rebuilt.skip = false;
        stats.updated += 1;
        updated.push(rebuilt);
    }

    // records with no position data cannot be represented in a patch
    updated.retain(|r| r.address != 0 || r.width != 0);
    sort_by_bit_position(&mut updated);
    (updated, stats)
}

/// Counts reported by [`prune_patch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub discarded: usize,
    pub no_default: usize,
    pub kept: usize,
}

impl fmt::Display for PruneStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Items discarded from old patch: {}", self.discarded)?;
        writeln!(
            f,
            "Items not found in default values: {}",
            self.no_default
        )?;
        write!(f, "Total items from old patch kept: {}", self.kept)
    }
}

/// Drop records whose value matches the defaults.
///
/// Records absent from the defaults cannot be judged and are kept with a
/// `no default` annotation; records with a differing value are kept with
/// the default value recorded in the annotation for traceability.
pub fn prune_patch(old: &[FuseRecord], defaults: &[FuseRecord]) -> (Vec<FuseRecord>, PruneStats) {
    let mut stats = PruneStats::default();
    let mut kept = Vec::new();

    for record in old {
        match find_by_name(&record.name, defaults) {
            None => {
                warn!("unable to find {} in default values; keeping", record.name);
                stats.no_default += 1;
                let mut keep = record.clone();
                keep.type_tag = "no default".to_string();
                kept.push(keep);
            }
            Some(default) if default.value != record.value => {
                let mut keep = record.clone();
                keep.type_tag = format!("0x{:x}", default.value);
                kept.push(keep);
            }
            Some(_) => {
                info!(
                    "discarding {} since its value {:#x} is same as default",
                    record.name, record.value
                );
                stats.discarded += 1;
            }
        }
    }

    stats.kept = kept.len();
    (kept, stats)
}

/// How a record was matched during [`reconcile_patch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchClass {
    /// Same address and start bit.
    Exact,
    /// Same address only; the last defaults entry at that address in file
    /// order is the candidate.
    Closest,
    /// No defaults entry at that address; original record kept verbatim.
    NoMatch,
}

/// Counts reported by [`reconcile_patch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub exact: usize,
    pub closest: usize,
    pub no_match: usize,
}

impl fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Exact matches: {}, closest matches: {}, unmatched: {}",
            self.exact, self.closest, self.no_match
        )
    }
}

/// Recover fuse names for a patch written against an older catalog layout.
///
/// Patches reference fuses by bit position. When the catalog's bit layout
/// has shifted between hardware revisions, this maps each old record onto
/// the defaults entry at the same position (or the nearest candidate at the
/// same address) and takes that entry's name, keeping the old record's
/// position and value. The classification and the original name (plus the
/// default's geometry and value where they differ) are embedded in the
/// annotation for operator review.
pub fn reconcile_patch(
    old: &[FuseRecord],
    defaults: &[FuseRecord],
) -> (Vec<FuseRecord>, ReconcileStats) {
    let mut stats = ReconcileStats::default();
    let mut output = Vec::new();

    for record in old {
        // Fold over the defaults: the first exact (address, start-bit)
        // match wins; the closest candidate is the last entry sharing the
        // address in file order.
        let mut exact: Option<&FuseRecord> = None;
        let mut closest: Option<&FuseRecord> = None;
        for default in defaults {
            if default.address != record.address {
                continue;
            }
            closest = Some(default);
            if default.start_bit == record.start_bit && exact.is_none() {
                exact = Some(default);
            }
        }

        let mut out = record.clone();
        let original_name = record.name.clone();
        if let Some(default) = exact {
            stats.exact += 1;
            out.name = default.name.clone();
            out.type_tag = if record.value == default.value {
                format!("(exact, {original_name})")
            } else {
                format!("(exact, {original_name}, ov: 0x{:x})", default.value)
            };
        } else if let Some(default) = closest {
            stats.closest += 1;
            out.name = default.name.clone();
            out.type_tag = if record.value == default.value {
                format!(
                    "(closest, {original_name}, s:{} w:{})",
                    default.start_bit, default.width
                )
            } else {
                format!(
                    "(closest, {original_name}, s:{} w:{} v:0x{:x})",
                    default.start_bit, default.width, default.value
                )
            };
        } else {
            stats.no_match += 1;
            out.type_tag = "(no match, keeping original fuse)".to_string();
        }
        output.push(out);
    }

    (output, stats)
}

/// A record that exists in both inputs with differing content.
#[derive(Clone, Debug)]
pub struct DiffPair {
    pub old: FuseRecord,
    pub new: FuseRecord,
}

impl DiffPair {
    /// Which template fields (position/geometry) changed between the two.
    pub fn template_changes(&self) -> String {
        let mut changes = String::new();
        if self.old.address != self.new.address {
            changes += &format!("Addr: 0x{:x}->0x{:x} ", self.old.address, self.new.address);
        }
        if self.old.rcvr_addr != self.new.rcvr_addr {
            changes += &format!(
                "RcvrAddr: 0x{:x}->0x{:x} ",
                self.old.rcvr_addr, self.new.rcvr_addr
            );
        }
        if self.old.start_bit != self.new.start_bit {
            changes += &format!(
                "StartBit: {}->{} ",
                self.old.start_bit, self.new.start_bit
            );
        }
        if self.old.width != self.new.width {
            changes += &format!("NumBits: {}->{} ", self.old.width, self.new.width);
        }
        changes.trim_end().to_string()
    }
}

/// Partition of two record lists by name. Reporting only; no output patch.
#[derive(Clone, Debug, Default)]
pub struct CompareReport {
    pub only_old: Vec<FuseRecord>,
    pub only_new: Vec<FuseRecord>,
    pub same_value: Vec<FuseRecord>,
    pub diff_value: Vec<DiffPair>,
    /// Records whose position/geometry changed even if the value did not.
    /// Populated only by [`compare_catalogs`].
    pub diff_template: Vec<DiffPair>,
}

impl fmt::Display for CompareReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Items only in old ({}):", self.only_old.len())?;
        for item in &self.only_old {
            writeln!(f, "\t{}, val: 0x{:x}", item.name, item.value)?;
        }
        writeln!(f)?;
        writeln!(f, "Items only in new ({}):", self.only_new.len())?;
        for item in &self.only_new {
            writeln!(f, "\t{}, val: 0x{:x}", item.name, item.value)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Items with same values in both ({}):",
            self.same_value.len()
        )?;
        for item in &self.same_value {
            writeln!(f, "\t{}, val: 0x{:x}", item.name, item.value)?;
        }
        writeln!(f)?;
        writeln!(f, "Items with different values ({}):", self.diff_value.len())?;
        for pair in &self.diff_value {
            writeln!(
                f,
                "\t{}, old: 0x{:x}, new: 0x{:x}",
                pair.old.name, pair.old.value, pair.new.value
            )?;
        }
        if !self.diff_template.is_empty() {
            writeln!(f)?;
            writeln!(
                f,
                "Items with different templates ({}):",
                self.diff_template.len()
            )?;
            for pair in &self.diff_template {
                writeln!(f, "\t{}, {}", pair.old.name, pair.template_changes())?;
            }
        }
        Ok(())
    }
}

/// Partition two patches by name: only-old, only-new, same value,
/// different value.
pub fn compare_patches(old: &[FuseRecord], new: &[FuseRecord]) -> CompareReport {
    compare_records(old, new, false)
}

/// Like [`compare_patches`], additionally flagging records whose address,
/// width, start bit, or receiver address changed even when the value is
/// identical.
pub fn compare_catalogs(old: &[FuseRecord], new: &[FuseRecord]) -> CompareReport {
    compare_records(old, new, true)
}

fn compare_records(old: &[FuseRecord], new: &[FuseRecord], templates: bool) -> CompareReport {
    let mut report = CompareReport::default();

    for record in old {
        match find_by_name(&record.name, new) {
            None => report.only_old.push(record.clone()),
            Some(found) => {
                if record.value == found.value {
                    report.same_value.push(record.clone());
                } else {
                    report.diff_value.push(DiffPair {
                        old: record.clone(),
                        new: found.clone(),
                    });
                }
                let template_changed = record.address != found.address
                    || record.width != found.width
                    || record.start_bit != found.start_bit
                    || record.rcvr_addr != found.rcvr_addr;
                if templates && template_changed {
                    report.diff_template.push(DiffPair {
                        old: record.clone(),
                        new: found.clone(),
                    });
                }
            }
        }
    }
    for record in new {
        if find_by_name(&record.name, old).is_none() {
            report.only_new.push(record.clone());
        }
    }

    report
}

/// Fold config-override items into a patch list ahead of an update.
///
/// Items already in the patch keep their patch value (a differing override
/// is reported, not applied); unknown items become config-stub records with
/// no position data, to be filled in from the defaults at update time.
/// Returns the seeded list and the number of stubs added.
pub fn seed_config_stubs(
    old: &[FuseRecord],
    overrides: &[OverrideItem],
) -> (Vec<FuseRecord>, usize) {
    let mut seeded = old.to_vec();
    let mut added = 0;
    for item in overrides {
        match find_by_name(&item.name, &seeded) {
            Some(found) => {
                if found.value != item.value {
                    info!(
                        "keeping patch value {:#x} instead of config value {:#x} for {}",
                        found.value, item.value, item.name
                    );
                }
            }
            None => {
                info!("adding {} = {:#04x} to the patch list", item.name, item.value);
                seeded.push(FuseRecord {
                    name: item.name.clone(),
                    value: item.value,
                    type_tag: "(fuse)".to_string(),
                    is_config_stub: true,
                    ..Default::default()
                });
                added += 1;
            }
        }
    }
    (seeded, added)
}

/// Report produced by [`merge_values`].
#[derive(Clone, Debug, Default)]
pub struct MergeValuesReport {
    /// Override names with no matching defaults entry.
    pub not_found: Vec<String>,
    /// Defaults entries that received a new value.
    pub updated: Vec<FuseRecord>,
    pub unchanged: usize,
}

impl fmt::Display for MergeValuesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Items from override file not found in defaults ({}):",
            self.not_found.len()
        )?;
        for name in &self.not_found {
            writeln!(f, " - {name}")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Override items with updated values ({}):",
            self.updated.len()
        )?;
        for item in &self.updated {
            writeln!(f, " - {} = {:#x}", item.name, item.value)?;
        }
        write!(f, "Items with unchanged values: {}", self.unchanged)
    }
}

/// Apply name/value override items onto a defaults list.
///
/// Returns the full updated list when `changes_only` is false, or only the
/// entries that received a new value when true. The prior value is recorded
/// in the annotation of every updated entry.
pub fn merge_values(
    defaults: &[FuseRecord],
    overrides: &[OverrideItem],
    changes_only: bool,
) -> (Vec<FuseRecord>, MergeValuesReport) {
    let mut merged: Vec<FuseRecord> = defaults.to_vec();
    let mut report = MergeValuesReport::default();

    for item in overrides {
        match merged.iter_mut().find(|r| r.name == item.name) {
            None => report.not_found.push(item.name.clone()),
            Some(found) => {
                if found.value != item.value {
                    found.type_tag = format!("0x{:x}", found.value);
                    found.value = item.value;
                    report.updated.push(found.clone());
                } else {
                    report.unchanged += 1;
                }
            }
        }
    }

    let output = if changes_only {
        report.updated.clone()
    } else {
        merged
    };
    (output, report)
}
