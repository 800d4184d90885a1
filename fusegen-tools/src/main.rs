// Licensed under the Apache-2.0 license

//! Command-line front end for the fusegen library.
//!
//! Each subcommand is a single batch transform: inputs are loaded fresh,
//! the selected operation runs, and the result is written once. Nothing is
//! shared between invocations.

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

mod blobs;
mod catalog_reports;
mod patches;

#[derive(Parser)]
#[command(
    name = "fusegen-tools",
    version,
    about = "Fuse catalog and patch maintenance tools"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump lockout-ID info for all fuses, or compute combined lockout masks
    Lockbits(catalog_reports::LockbitsArgs),
    /// Report fuses and straps using non-conventional group numbers
    HighGroups(catalog_reports::HighGroupsArgs),
    /// Dump the distribution lookup table to CSV
    DumpDlut(catalog_reports::DumpDlutArgs),
    /// Dump the SOC IP instances to CSV
    DumpIpInfo(catalog_reports::DumpIpInfoArgs),
    /// Print per-IP distribution stats
    Stats(catalog_reports::StatsArgs),
    /// Generate an editable patch from a list of fuse names
    MakePatch(patches::MakePatchArgs),
    /// Rebuild a patch against a new defaults file
    UpdatePatch(patches::UpdatePatchArgs),
    /// Drop patch entries whose values match the defaults
    PrunePatch(patches::PrunePatchArgs),
    /// Recover fuse names for a patch written against an older catalog layout
    ReconcilePatch(patches::ReconcilePatchArgs),
    /// Combine two patches into one
    MergePatches(patches::MergePatchesArgs),
    /// Apply a name=value override file onto a defaults list
    MergeValues(patches::MergeValuesArgs),
    /// Compare two patch files and print the differences
    ComparePatch(patches::ComparePatchArgs),
    /// Compare two fuse catalogs and print the differences
    CompareXml(patches::CompareXmlArgs),
    /// Extract fuse values from a hardware dump into a patch
    ImportBlob(blobs::ImportBlobArgs),
    /// Annotate a hex dump with the fuses covering each byte
    DumpBlob(blobs::DumpBlobArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    simple_logger::SimpleLogger::new()
        .with_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .without_timestamps()
        .init()?;

    match cli.command {
        Commands::Lockbits(args) => catalog_reports::lockbits(&args),
        Commands::HighGroups(args) => catalog_reports::high_groups(&args),
        Commands::DumpDlut(args) => catalog_reports::dump_dlut(&args),
        Commands::DumpIpInfo(args) => catalog_reports::dump_ip_info(&args),
        Commands::Stats(args) => catalog_reports::stats(&args),
        Commands::MakePatch(args) => patches::make_patch(&args),
        Commands::UpdatePatch(args) => patches::update_patch(&args),
        Commands::PrunePatch(args) => patches::prune_patch(&args),
        Commands::ReconcilePatch(args) => patches::reconcile_patch(&args),
        Commands::MergePatches(args) => patches::merge_patches(&args),
        Commands::MergeValues(args) => patches::merge_values(&args),
        Commands::ComparePatch(args) => patches::compare_patch(&args),
        Commands::CompareXml(args) => patches::compare_xml(&args),
        Commands::ImportBlob(args) => blobs::import_blob(&args),
        Commands::DumpBlob(args) => blobs::dump_blob(&args),
    }
}
