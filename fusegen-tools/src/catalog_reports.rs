// Licensed under the Apache-2.0 license

//! Catalog-driven report commands: lockbits, high groups, DLUT and
//! IP-instance dumps, distribution stats.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use fusegen::catalog::Catalog;
use fusegen::patch::load_name_list;
use fusegen::report;

/// Write report text to a file, echoing the destination for the operator.
pub(crate) fn write_output(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("unable to write {}", path.display()))?;
    println!("Saved output to {}.", path.display());
    Ok(())
}

#[derive(Args)]
pub struct LockbitsArgs {
    /// Source fusegen XML file
    #[arg(long, default_value = "fusegen.xml")]
    pub source: PathBuf,
    /// Output file
    #[arg(long, default_value = "lockbits.csv")]
    pub target: PathBuf,
    /// Compute combined lockout masks for the fuse names listed in this
    /// file (one per line) instead of dumping the CSV
    #[arg(long)]
    pub name_file: Option<PathBuf>,
    /// Write only the fuse names, one per line, for batch mask computation
    #[arg(long, conflicts_with = "name_file")]
    pub names_only: bool,
}

pub fn lockbits(args: &LockbitsArgs) -> Result<()> {
    let catalog = Catalog::from_file(&args.source)?;
    let output = match &args.name_file {
        Some(name_file) => {
            let names = load_name_list(name_file)?;
            let text = report::render_lockout_masks(&catalog.lockout_masks(&names));
            print!("{text}");
            text
        }
        None if args.names_only => report::render_lockbit_names(&catalog.lockbits),
        None => report::render_lockbits_csv(&catalog.lockbits),
    };
    write_output(&args.target, &output)
}

#[derive(Args)]
pub struct HighGroupsArgs {
    /// Source fusegen XML file
    #[arg(long, default_value = "fusegen.xml")]
    pub source: PathBuf,
    /// Output CSV file
    #[arg(long)]
    pub target: PathBuf,
}

pub fn high_groups(args: &HighGroupsArgs) -> Result<()> {
    let catalog = Catalog::from_file(&args.source)?;
    for record in &catalog.high_groups {
        println!("Adding {}...", record.name);
    }
    write_output(
        &args.target,
        &report::render_high_groups_csv(&catalog.high_groups),
    )
}

#[derive(Args)]
pub struct DumpDlutArgs {
    /// Source fusegen XML file
    #[arg(long, default_value = "fusegen.xml")]
    pub source: PathBuf,
    /// Output CSV file
    #[arg(long)]
    pub target: PathBuf,
}

pub fn dump_dlut(args: &DumpDlutArgs) -> Result<()> {
    let catalog = Catalog::from_file(&args.source)?;
    anyhow::ensure!(
        !catalog.dlut.is_empty(),
        "no DistributionLUT entries found in {}",
        args.source.display()
    );
    write_output(&args.target, &report::render_dlut_csv(&catalog.dlut))
}

#[derive(Args)]
pub struct DumpIpInfoArgs {
    /// Source fusegen XML file
    #[arg(long, default_value = "fusegen.xml")]
    pub source: PathBuf,
    /// Output CSV file
    #[arg(long)]
    pub target: PathBuf,
}

pub fn dump_ip_info(args: &DumpIpInfoArgs) -> Result<()> {
    let catalog = Catalog::from_file(&args.source)?;
    anyhow::ensure!(
        !catalog.ip_instances.is_empty(),
        "no SOC instances found in {}",
        args.source.display()
    );
    write_output(
        &args.target,
        &report::render_ip_info_csv(&catalog.ip_instances),
    )
}

#[derive(Args)]
pub struct StatsArgs {
    /// Source fusegen XML file
    #[arg(long, default_value = "fusegen.xml")]
    pub source: PathBuf,
}

pub fn stats(args: &StatsArgs) -> Result<()> {
    let catalog = Catalog::from_file(&args.source)?;
    anyhow::ensure!(
        !catalog.dlut.is_empty(),
        "no DistributionLUT entries found in {}",
        args.source.display()
    );
    print!("{}", report::render_distribution_stats(&catalog.dlut));
    Ok(())
}
