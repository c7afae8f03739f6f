//! Output normalization and persistence.
//!
//! Retrieved configurations carry volatile header lines (write timestamps,
//! NVRAM update markers) that would dirty every snapshot diff. The
//! normalizer drops any line whose prefix matches the denylist and
//! preserves the rest in order; the writer replaces the device's previous
//! snapshot wholesale.

use crate::models::Category;
use anyhow::{Context as _, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Filename suffix of a device's primary configuration file.
pub const RUNNING_CONFIG_SUFFIX: &str = "running-config";

/// Default volatile-line prefixes, carried over from the platforms in
/// scope (IOS, NX-OS, ASA).
pub fn default_excluded_prefixes() -> Vec<String> {
    [
        ": Written by",
        "!Time:",
        "! Last configuration change",
        "! NVRAM config last updated",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Drop denylisted lines, preserving the relative order of the rest.
pub fn normalize<'a>(raw: &'a str, excluded_prefixes: &[String]) -> Vec<&'a str> {
    raw.lines()
        .filter(|line| {
            !excluded_prefixes
                .iter()
                .any(|prefix| line.starts_with(prefix.as_str()))
        })
        .collect()
}

/// Path of a device's output file: `<root>/<CategoryDir>/<name>_<suffix>.txt`.
pub fn output_path(root: &Path, category: Category, device: &str, suffix: &str) -> PathBuf {
    root.join(category.dir_name())
        .join(format!("{}_{}.txt", device, suffix))
}

/// Persist filtered configuration lines, fully superseding any prior
/// snapshot for this device and suffix.
///
/// The content is written to a temporary sibling and renamed into place,
/// so a failed write surfaces an error instead of leaving a truncated
/// file behind.
pub fn write_config(
    root: &Path,
    category: Category,
    device: &str,
    suffix: &str,
    lines: &[&str],
) -> Result<PathBuf> {
    let dir = root.join(category.dir_name());
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create category directory {}", dir.display()))?;

    let path = output_path(root, category, device, suffix);
    let tmp = dir.join(format!(".{}_{}.txt.tmp", device, suffix));

    let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }

    fs::write(&tmp, &content)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| {
        let _ = fs::remove_file(&tmp);
        format!("failed to replace {}", path.display())
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_drops_denylisted_lines_in_order() {
        let raw = "\
: Written by admin at 12:00:00 UTC
hostname r1
!Time: Mon Nov 7 12:00:00 2022
interface GigabitEthernet0/0
 ip address 10.0.0.1 255.255.255.0
! Last configuration change at 11:59:00
end";

        let filtered = normalize(raw, &default_excluded_prefixes());
        assert_eq!(
            filtered,
            vec![
                "hostname r1",
                "interface GigabitEthernet0/0",
                " ip address 10.0.0.1 255.255.255.0",
                "end"
            ]
        );
    }

    #[test]
    fn test_normalize_counts() {
        // N lines with K denylisted yields exactly N - K lines.
        let raw = "!Time: now\na\nb\n: Written by x\nc";
        let filtered = normalize(raw, &default_excluded_prefixes());
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_normalize_prefix_not_substring() {
        // Denylist matches prefixes only.
        let raw = "description !Time: is in the middle";
        let filtered = normalize(raw, &default_excluded_prefixes());
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_write_config_creates_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            tmp.path(),
            Category::Routers,
            "r1",
            RUNNING_CONFIG_SUFFIX,
            &["hostname r1", "end"],
        )
        .unwrap();

        assert_eq!(
            path,
            tmp.path().join("Routers").join("r1_running-config.txt")
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "hostname r1\nend\n"
        );
    }

    #[test]
    fn test_write_config_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let lines = ["hostname r1", "end"];

        let path = write_config(tmp.path(), Category::Routers, "r1", "running-config", &lines)
            .unwrap();
        let first = fs::read(&path).unwrap();

        write_config(tmp.path(), Category::Routers, "r1", "running-config", &lines).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_write_config_replaces_prior_snapshot() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            Category::Switches,
            "sw1",
            "running-config",
            &["old line one", "old line two"],
        )
        .unwrap();

        let path = write_config(
            tmp.path(),
            Category::Switches,
            "sw1",
            "running-config",
            &["new"],
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn test_write_config_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), Category::Voice, "vg1", "running-config", &["x"]).unwrap();

        let entries: Vec<_> = fs::read_dir(tmp.path().join("Voice Gateways"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["vg1_running-config.txt"]);
    }
}
