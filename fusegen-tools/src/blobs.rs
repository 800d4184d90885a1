// Licensed under the Apache-2.0 license

//! Hardware-dump commands: import a fuse controller blob back into a patch
//! of changed values, or annotate a raw hex dump for manual inspection.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Args;
use fusegen::blob;
use fusegen::catalog::Catalog;
use fusegen::patch::{load_patch_file, save_patch_file};
use fusegen::types::FuseKind;
use fusegen::value::parse_literal;

#[derive(Args)]
pub struct ImportBlobArgs {
    /// Text blob file: one long hex string from the fuse controller log
    #[arg(long, conflicts_with = "int_blob", required_unless_present = "int_blob")]
    pub text_blob: Option<PathBuf>,
    /// Integer blob file: one decimal byte per line
    #[arg(long)]
    pub int_blob: Option<PathBuf>,
    /// Source fusegen XML file (supplies the distribution LUT)
    #[arg(long, default_value = "fusegen.xml")]
    pub source: PathBuf,
    /// Defaults file describing the fuses being decoded
    #[arg(long)]
    pub default_values: PathBuf,
    /// Output patch file
    #[arg(long)]
    pub target: PathBuf,
    /// IP instance name, also the fuse-name prefix to decode
    #[arg(long)]
    pub prefix: String,
    /// Fuse or softstrap group number to decode
    #[arg(long)]
    pub group: u64,
    /// Decode a softstrap payload instead of direct fuses
    #[arg(long)]
    pub softstraps: bool,
}

pub fn import_blob(args: &ImportBlobArgs) -> Result<()> {
    let chunks = match (&args.text_blob, &args.int_blob) {
        (Some(path), _) => blob::load_text_blob(path)?,
        (None, Some(path)) => blob::load_int_blob(path)?,
        (None, None) => unreachable!("clap requires one blob argument"),
    };
    ensure!(!chunks.is_empty(), "no chunks decoded from blob file");

    let defaults = load_patch_file(&args.default_values)?;
    ensure!(
        !defaults.is_empty(),
        "no default values found in {}",
        args.default_values.display()
    );
    let catalog = Catalog::from_file(&args.source)
        .with_context(|| format!("loading {}", args.source.display()))?;

    let kind = if args.softstraps {
        FuseKind::SoftStrap
    } else {
        FuseKind::DirectFuse
    };
    let (patch, stats) = blob::import_blob(
        &chunks,
        &defaults,
        &catalog.dlut,
        &args.prefix,
        args.group,
        kind,
    )?;
    save_patch_file(&args.target, &patch)?;
    println!("{stats}");
    Ok(())
}

#[derive(Args)]
pub struct DumpBlobArgs {
    /// Hex dump file, one header-prefixed line per row
    #[arg(long)]
    pub blob: PathBuf,
    /// Defaults file used to annotate each byte
    #[arg(long)]
    pub default_values: PathBuf,
    /// Output report file
    #[arg(long)]
    pub target: PathBuf,
    /// Memory address where the dump starts (any supported notation)
    #[arg(long)]
    pub start_address: String,
}

pub fn dump_blob(args: &DumpBlobArgs) -> Result<()> {
    let start_address = parse_literal(&args.start_address)
        .with_context(|| format!("bad start address {:?}", args.start_address))?;
    let defaults = load_patch_file(&args.default_values)?;
    let text = std::fs::read_to_string(&args.blob)
        .with_context(|| format!("unable to read {}", args.blob.display()))?;

    let lines = blob::dump_blob_lines(&text, &defaults, start_address)?;
    let mut report = lines.join("\n");
    report.push('\n');
    crate::catalog_reports::write_output(&args.target, &report)
}
