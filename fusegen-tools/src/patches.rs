// Licensed under the Apache-2.0 license

//! Patch maintenance commands: make, update, prune, reconcile, merge, and
//! compare. Each command loads its inputs fresh, runs one library
//! operation, prints the operation's statistics, and writes the result
//! once.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Args;
use fusegen::catalog::Catalog;
use fusegen::overrides::{load_cfg_file, load_override_file};
use fusegen::patch::{load_patch_file, load_patch_file_filtered, load_name_list, save_patch_file};
use fusegen::reconcile;

#[derive(Args)]
pub struct MakePatchArgs {
    /// Source fusegen XML file
    #[arg(long, default_value = "fusegen.xml")]
    pub source: PathBuf,
    /// File with fuse names (or name fragments) to include, one per line
    #[arg(long)]
    pub name_file: PathBuf,
    /// Output patch file
    #[arg(long)]
    pub target: PathBuf,
    /// Also search softstraps
    #[arg(long)]
    pub include_straps: bool,
}

pub fn make_patch(args: &MakePatchArgs) -> Result<()> {
    let catalog = Catalog::from_file(&args.source)?;
    let names = load_name_list(&args.name_file)?;
    let matches = catalog.matching_records(&names, args.include_straps);
    save_patch_file(&args.target, &matches)?;

    // report names that matched nothing in the catalog
    for name in &names {
        if !matches.iter().any(|m| m.name.contains(name.as_str())) {
            log::warn!("did not find \"{name}\" in fusegen file");
        }
    }
    println!("Fuses written: {} from {} names", matches.len(), names.len());
    Ok(())
}

#[derive(Args)]
pub struct UpdatePatchArgs {
    /// Existing patch file; its values are preserved
    #[arg(long)]
    pub old_patch: PathBuf,
    /// Defaults file supplying addresses, start bits, and widths
    #[arg(long)]
    pub default_values: PathBuf,
    /// Output patch file
    #[arg(long)]
    pub target: PathBuf,
    /// Additional patch to merge in before updating; entries not already
    /// present are added
    #[arg(long)]
    pub imported_values: Option<PathBuf>,
    /// Names of fuses whose values must not be replaced by imported values
    #[arg(long)]
    pub locked_fuses: Option<PathBuf>,
    /// Configuration report with a cfg.fuse block; fuses named there are
    /// updated or added as config stubs
    #[arg(long, conflicts_with = "override_file")]
    pub config_out: Option<PathBuf>,
    /// Fuse-name prefix prepended to cfg.fuse entries
    #[arg(long, default_value = "", requires = "config_out")]
    pub cfg_prefix: String,
    /// name=value override file, an alternative to --config-out
    #[arg(long)]
    pub override_file: Option<PathBuf>,
}

pub fn update_patch(args: &UpdatePatchArgs) -> Result<()> {
    let mut old = load_patch_file(&args.old_patch)?;
    ensure!(
        !old.is_empty(),
        "no items loaded from {}",
        args.old_patch.display()
    );
    let defaults = load_patch_file(&args.default_values)?;
    ensure!(
        !defaults.is_empty(),
        "no items loaded from {}",
        args.default_values.display()
    );
    let locked = match &args.locked_fuses {
        Some(path) => load_name_list(path)?,
        None => Vec::new(),
    };

    if let Some(path) = &args.imported_values {
        println!("Importing new items from {}...", path.display());
        let imported = load_patch_file(path)?;
        ensure!(!imported.is_empty(), "no items loaded from {}", path.display());
        let (merged, stats) = reconcile::merge_patches(&old, &imported, &locked);
        println!("{stats}");
        old = merged;
    }

    let config_items = match (&args.config_out, &args.override_file) {
        (Some(path), _) => load_cfg_file(path, &args.cfg_prefix)?,
        (None, Some(path)) => load_override_file(path)?,
        (None, None) => Vec::new(),
    };
    if !config_items.is_empty() {
        let (seeded, added) = reconcile::seed_config_stubs(&old, &config_items);
        println!("Adding {added} stub items to old item list...");
        old = seeded;
    }

    let (updated, stats) = reconcile::update_patch(&old, &defaults);
    println!("{stats}");
    save_patch_file(&args.target, &updated)?;
    Ok(())
}

#[derive(Args)]
pub struct PrunePatchArgs {
    /// Existing patch file
    #[arg(long)]
    pub old_patch: PathBuf,
    /// Defaults file to judge values against
    #[arg(long)]
    pub default_values: PathBuf,
    /// Output patch file
    #[arg(long)]
    pub target: PathBuf,
}

pub fn prune_patch(args: &PrunePatchArgs) -> Result<()> {
    let old = load_patch_file(&args.old_patch)?;
    ensure!(
        !old.is_empty(),
        "no items loaded from {}",
        args.old_patch.display()
    );
    let defaults = load_patch_file(&args.default_values)?;
    ensure!(
        !defaults.is_empty(),
        "no items loaded from {}",
        args.default_values.display()
    );

    let (kept, stats) = reconcile::prune_patch(&old, &defaults);
    save_patch_file(&args.target, &kept)?;
    println!("{stats}");
    Ok(())
}

#[derive(Args)]
pub struct ReconcilePatchArgs {
    /// Patch written against the older catalog layout
    #[arg(long)]
    pub old_patch: PathBuf,
    /// Defaults file from the newer catalog
    #[arg(long)]
    pub default_values: PathBuf,
    /// Output patch file
    #[arg(long)]
    pub target: PathBuf,
}

pub fn reconcile_patch(args: &ReconcilePatchArgs) -> Result<()> {
    let old = load_patch_file(&args.old_patch)?;
    let defaults = load_patch_file(&args.default_values)?;

    let (reconciled, stats) = reconcile::reconcile_patch(&old, &defaults);
    save_patch_file(&args.target, &reconciled)?;
    println!("{stats}");
    println!("Reconciled patch written to: {}", args.target.display());
    Ok(())
}

#[derive(Args)]
pub struct MergePatchesArgs {
    /// Base patch
    #[arg(long)]
    pub old_patch: PathBuf,
    /// Patch whose values win on conflict (unless locked)
    #[arg(long)]
    pub new_patch: PathBuf,
    /// Output patch file
    #[arg(long)]
    pub target: PathBuf,
    /// Names of fuses whose base values must be kept
    #[arg(long)]
    pub locked_fuses: Option<PathBuf>,
}

pub fn merge_patches(args: &MergePatchesArgs) -> Result<()> {
    let old = load_patch_file(&args.old_patch)?;
    ensure!(
        !old.is_empty(),
        "no items found in old patch {}",
        args.old_patch.display()
    );
    let new = load_patch_file(&args.new_patch)?;
    ensure!(
        !new.is_empty(),
        "no items found in new patch {}",
        args.new_patch.display()
    );
    let locked = match &args.locked_fuses {
        Some(path) => load_name_list(path)?,
        None => {
            println!("No locked fuses specified; using all new values when found...");
            Vec::new()
        }
    };

    let (merged, stats) = reconcile::merge_patches(&old, &new, &locked);
    save_patch_file(&args.target, &merged)?;
    println!("{stats}");
    Ok(())
}

#[derive(Args)]
pub struct MergeValuesArgs {
    /// Defaults file to apply overrides onto
    #[arg(long)]
    pub default_values: PathBuf,
    /// name=value override file
    #[arg(long)]
    pub override_file: PathBuf,
    /// Output patch file
    #[arg(long)]
    pub target: PathBuf,
    /// Save only the items whose value changed
    #[arg(long)]
    pub changes_only: bool,
}

pub fn merge_values(args: &MergeValuesArgs) -> Result<()> {
    let defaults = load_patch_file(&args.default_values)?;
    ensure!(
        !defaults.is_empty(),
        "{} contained no entries",
        args.default_values.display()
    );
    let overrides = load_override_file(&args.override_file)?;
    ensure!(
        !overrides.is_empty(),
        "no items found in {}",
        args.override_file.display()
    );

    let (output, report) = reconcile::merge_values(&defaults, &overrides, args.changes_only);
    save_patch_file(&args.target, &output)?;
    println!("{report}");
    Ok(())
}

#[derive(Args)]
pub struct ComparePatchArgs {
    /// Old patch file
    #[arg(long)]
    pub old_patch: PathBuf,
    /// New patch file
    #[arg(long)]
    pub new_patch: PathBuf,
    /// Only compare fuses whose names start with this prefix
    #[arg(long, default_value = "")]
    pub prefix: String,
}

pub fn compare_patch(args: &ComparePatchArgs) -> Result<()> {
    let old = load_patch_file_filtered(&args.old_patch, &args.prefix)?;
    ensure!(
        !old.is_empty(),
        "no items loaded from {}",
        args.old_patch.display()
    );
    let new = load_patch_file_filtered(&args.new_patch, &args.prefix)?;
    ensure!(
        !new.is_empty(),
        "no items loaded from {}",
        args.new_patch.display()
    );

    print!("{}", reconcile::compare_patches(&old, &new));
    Ok(())
}

#[derive(Args)]
pub struct CompareXmlArgs {
    /// Old fusegen XML file
    #[arg(long)]
    pub old: PathBuf,
    /// New fusegen XML file
    #[arg(long)]
    pub new: PathBuf,
    /// Only compare fuses whose names start with this prefix
    #[arg(long, default_value = "")]
    pub prefix: String,
}

pub fn compare_xml(args: &CompareXmlArgs) -> Result<()> {
    let old = Catalog::from_file(&args.old)
        .with_context(|| format!("loading {}", args.old.display()))?
        .fuses_with_prefix(&args.prefix);
    ensure!(!old.is_empty(), "no items loaded from {}", args.old.display());
    let new = Catalog::from_file(&args.new)
        .with_context(|| format!("loading {}", args.new.display()))?
        .fuses_with_prefix(&args.prefix);
    ensure!(!new.is_empty(), "no items loaded from {}", args.new.display());

    print!("{}", reconcile::compare_catalogs(&old, &new));
    Ok(())
}
