// Licensed under the Apache-2.0 license

//! Config-override readers.
//!
//! Two read-only text formats seed config-derived fuse values: the
//! `cfg.fuse` block embedded in a firmware configuration report
//! (colon-delimited), and the standalone `name=value` override format.
//! Both produce name/value pairs; the update operation turns pairs that are
//! missing from the patch into config-stub records.

use std::path::Path;

use log::warn;

use crate::error::{FusegenError, FusegenResult};
use crate::util::sanitize_name;
use crate::value::parse_literal;

/// One name/value pair read from a config-override source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverrideItem {
    pub name: String,
    pub value: u64,
}

/// Marker opening the `cfg.fuse` block.
const CFG_FUSE_BEGIN: &str = "== cfg.fuse ==";
/// A run of `=` characters terminates the block.
const CFG_FUSE_END: &str = "===============";

/// Parse the `cfg.fuse` block out of a configuration report.
///
/// Lines between the `== cfg.fuse ==` marker and the next separator row are
/// `name : value` pairs with decimal values; names are upcased and prefixed
/// with `prefix` to form full fuse names. Malformed lines are skipped with a
/// warning.
pub fn parse_cfg_block(text: &str, prefix: &str) -> Vec<OverrideItem> {
    let mut items = Vec::new();
    let mut in_block = false;
    for line in text.lines() {
        if !in_block {
            if line.contains(CFG_FUSE_BEGIN) {
                in_block = true;
            }
            continue;
        }
        if line.contains(CFG_FUSE_END) {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((name, value)) = trimmed.split_once(':') else {
            warn!("skipping cfg.fuse line without separator: {trimmed}");
            continue;
        };
        let Ok(value) = value.trim().parse::<u64>() else {
            warn!("skipping cfg.fuse line with bad value: {trimmed}");
            continue;
        };
        items.push(OverrideItem {
            name: format!("{prefix}{}", name.trim().to_uppercase()),
            value,
        });
    }
    items
}

/// Parse the `name=value` override format. Names are sanitized; values go
/// through the literal codec. Comment and blank lines are skipped.
pub fn parse_override_lines(text: &str) -> FusegenResult<Vec<OverrideItem>> {
    let mut items = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((name, value)) = trimmed.split_once('=') else {
            warn!("skipping override line without '=': {trimmed}");
            continue;
        };
        items.push(OverrideItem {
            name: sanitize_name(name.trim()),
            value: parse_literal(value.trim())?,
        });
    }
    Ok(items)
}

/// Load the `cfg.fuse` block from a configuration report file.
pub fn load_cfg_file(path: &Path, prefix: &str) -> FusegenResult<Vec<OverrideItem>> {
    let text = read(path)?;
    Ok(parse_cfg_block(&text, prefix))
}

/// Load a `name=value` override file.
pub fn load_override_file(path: &Path) -> FusegenResult<Vec<OverrideItem>> {
    let text = read(path)?;
    parse_override_lines(&text)
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

    #[test]
    fn test_parse_cfg_block() {
        let report = "\
preamble noise
== cfg.fuse ==
  vmin_volts : 12
  boot_mode : 3
===============
  trailer : 99
";
        let items = parse_cfg_block(report, "soc_fw_fuses_");
        assert_eq!(
            items,
            vec![
                OverrideItem {
                    name: "soc_fw_fuses_VMIN_VOLTS".to_string(),
                    value: 12
                },
                OverrideItem {
                    name: "soc_fw_fuses_BOOT_MODE".to_string(),
                    value: 3
                },
            ]
        );
    }

    #[test]
    fn test_parse_cfg_block_without_marker() {
        assert!(parse_cfg_block("no block here\n", "p_").is_empty());
    }

    #[test]
    fn test_parse_override_lines() {
        let text = "\
# comment
soc/fuse a = 0x1f
plain=5
";
        let items = parse_override_lines(text).unwrap();
        assert_eq!(items[0].name, "soc_fuse_a");
        assert_eq!(items[0].value, 0x1f);
        assert_eq!(items[1].name, "plain");
        assert_eq!(items[1].value, 5);
    }

    #[test]
    fn test_parse_override_bad_value_is_error() {
        assert!(parse_override_lines("a=zzz\n").is_err());
    }
}
