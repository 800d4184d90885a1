// Licensed under the Apache-2.0 license

//! Record types shared across the catalog reader and patch operations.

/// Bits per byte, used for bit-position arithmetic throughout.
pub const BYTE_BITS: u64 = 8;

/// One addressable hardware fuse or softstrap bitfield.
///
/// Created by the catalog reader (from XML) or the patch loader (from text).
/// `(address, start_bit)` identifies the field's position in fuse RAM; the
/// canonical output order is ascending [`bit_position`](Self::bit_position).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FuseRecord {
    /// Sanitized identifier-safe name.
    pub name: String,
    /// Byte offset in fuse RAM.
    pub address: u64,
    /// Bit offset within the byte (0-7).
    pub start_bit: u8,
    /// Field width in bits.
    pub width: u32,
    /// Field value; expected (but not required) to fit in `width` bits.
    pub value: u64,
    /// Fuse category / IP grouping tag.
    pub category: String,
    /// Free-text annotation: kind marker, prior value, provenance note.
    /// Serialized parenthesized at the end of a patch line.
    pub type_tag: String,
    /// Receiver-side address, present only on catalog records.
    pub rcvr_addr: u64,
    /// True when synthesized from a config-override source that carries no
    /// address/width data.
    pub is_config_stub: bool,
    /// True when the value carries no information (unchanged from default)
    /// and the record should be omitted from saved output.
    pub skip: bool,
}

impl FuseRecord {
    /// Absolute bit position, the canonical sort key for patch output.
    pub fn bit_position(&self) -> u64 {
        self.address * BYTE_BITS + u64::from(self.start_bit)
    }
}

/// Linear first-match name lookup.
///
/// Names are expected to be unique per list; the loaders warn about
/// duplicates, and the first occurrence wins here.
pub fn find_by_name<'a>(name: &str, records: &'a [FuseRecord]) -> Option<&'a FuseRecord> {
    records.iter().find(|r| r.name == name)
}

/// Sort records into canonical patch output order.
pub fn sort_by_bit_position(records: &mut [FuseRecord]) {
    records.sort_by_key(FuseRecord::bit_position);
}

/// Whether a distribution region holds direct fuses or soft straps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuseKind {
    DirectFuse,
    SoftStrap,
}

impl FuseKind {
    /// The tag used for this kind in catalog documents.
    pub fn label(self) -> &'static str {
        match self {
            FuseKind::DirectFuse => "DirectFuse",
            FuseKind::SoftStrap => "SoftStrap",
        }
    }

    pub fn from_label(label: &str) -> Option<FuseKind> {
        match label {
            "DirectFuse" => Some(FuseKind::DirectFuse),
            "SoftStrap" => Some(FuseKind::SoftStrap),
            _ => None,
        }
    }
}

impl std::fmt::Display for FuseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-category definition of the reserved lockout-ID bitfield.
///
/// One entry exists for each of the three fixed fuse categories; categories
/// absent from the catalog keep zeroed placeholder values.
#[derive(Clone, Debug, Default)]
pub struct LockoutConstant {
    /// Constant-table prefix, e.g. `INTELHVM`.
    pub const_prefix: String,
    /// Register-name prefix, e.g. `IntelHVM`; doubles as the category tag.
    pub category: String,
    /// First lockout row number.
    pub row_begin: u64,
    /// Last lockout row number; never below `row_begin`.
    pub row_end: u64,
    /// Full reserved-register name derived from `row_begin`.
    pub reg_name: String,
    /// RAM address of the lockout row, 0 when unresolved.
    pub address: u64,
    /// Width of the lockout row in bits, 0 when unresolved.
    pub width: u32,
}

/// The three fixed fuse categories: constant-table prefix paired with the
/// register-name prefix.
pub const LOCKOUT_CATEGORIES: [(&str, &str); 3] = [
    ("INTELHVM", "IntelHVM"),
    ("INTELIFP", "IntelIFP"),
    ("OEMIFP", "OEMIFP"),
];

/// A direct fuse's lockout-ID view, used by the lockbits report and the
/// combined-mask computation.
#[derive(Clone, Debug)]
pub struct LockbitEntry {
    pub name: String,
    pub address: u64,
    pub category: String,
    /// `None` marks a reserved placeholder that is not a real fuse.
    pub lockout_id: Option<u64>,
    pub width: u32,
}

/// One region of the Distribution Lookup Table: the memory range holding an
/// IP instance's fuse or strap values for one group.
#[derive(Clone, Debug)]
pub struct DistributionLutEntry {
    /// Owning IP instance name; blank when the port-id was unresolved.
    pub instance: String,
    pub port_id_full: u64,
    pub port_id_hi: u64,
    pub port_id_lo: u64,
    pub sbep: u64,
    pub group: u64,
    pub kind: FuseKind,
    pub count: u64,
    /// Region base address in fuse RAM.
    pub ram_addr: u64,
    pub rcvr_addr: u64,
    pub bar: String,
    /// Region size in bytes.
    pub size: u64,
    pub lockout_pos: u64,
    pub lockout_addr: u64,
}

impl DistributionLutEntry {
    /// Composite key recreating hardware emission order:
    /// port-id, sub-endpoint, fuse-vs-strap, group, count.
    pub fn sort_key(&self) -> u64 {
        let type_bit = match self.kind {
            FuseKind::DirectFuse => 0,
            FuseKind::SoftStrap => 1,
        };
        (self.port_id_full << 24)
            | (self.sbep << 20)
            | (type_bit << 16)
            | (self.group << 8)
            | self.count
    }
}

/// One SOC IP instance: the port-id table used to resolve DLUT entries.
///
/// `instance` values are unique; `ip` values can repeat.
#[derive(Clone, Debug)]
pub struct IpInstance {
    pub ip: String,
    pub instance: String,
    pub port_id_hi: u64,
    pub port_id_lo: u64,
    pub port_id_full: u64,
    pub sbep: u64,
    pub pull_trigger: String,
}

/// A fuse or strap using a non-conventional group number.
#[derive(Clone, Debug)]
pub struct HighGroupRecord {
    pub category: String,
    pub port_id: u64,
    pub name: String,
    pub address: u64,
    pub kind: FuseKind,
    pub group: u64,
}

/// Combine hierarchical and local port ids into the full port id.
pub fn combine_port_id(hi: u64, lo: u64) -> u64 {
    (hi << BYTE_BITS) | lo
}
