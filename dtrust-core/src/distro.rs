//! Distribution identity from os-release

use crate::diagnostics::Diagnostics;
use crate::rootfs::{read_lines, rooted};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistroInfo {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub like: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty_name: Option<String>,
}

impl Default for DistroInfo {
    fn default() -> Self {
        Self {
            id: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            like: Vec::new(),
            pretty_name: None,
        }
    }
}

/// Read `etc/os-release`, falling back to `usr/lib/os-release`
pub fn detect(rootfs: &Path, diags: &mut Diagnostics) -> DistroInfo {
    let primary = rooted(rootfs, Path::new("/etc/os-release"));
    let fallback = rooted(rootfs, Path::new("/usr/lib/os-release"));

    let lines = if primary.exists() {
        read_lines(&primary, "distro", diags)
    } else {
        read_lines(&fallback, "distro", diags)
    };

    lines.map(|lines| parse_os_release(&lines)).unwrap_or_default()
}

/// Parse os-release `KEY=value` lines (values optionally quoted)
pub fn parse_os_release(lines: &[String]) -> DistroInfo {
    let fields: HashMap<&str, String> = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (key.trim(), value.to_string())
        })
        .collect();

    let non_empty = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();

    DistroInfo {
        id: non_empty("ID").unwrap_or_else(|| UNKNOWN.to_string()),
        version: non_empty("VERSION_ID").unwrap_or_else(|| UNKNOWN.to_string()),
        like: non_empty("ID_LIKE")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        pretty_name: non_empty("PRETTY_NAME"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_quoted_values_and_like_list() {
        let info = parse_os_release(&lines(
            "NAME=\"Rocky Linux\"\nID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\nVERSION_ID=\"9.3\"\nPRETTY_NAME=\"Rocky Linux 9.3 (Blue Onyx)\"\n",
        ));
        assert_eq!(info.id, "rocky");
        assert_eq!(info.version, "9.3");
        assert_eq!(info.like, vec!["rhel", "centos", "fedora"]);
        assert_eq!(info.pretty_name.as_deref(), Some("Rocky Linux 9.3 (Blue Onyx)"));
    }

    #[test]
    fn test_rolling_release_without_version() {
        let info = parse_os_release(&lines("ID=arch\nBUILD_ID=rolling\n"));
        assert_eq!(info.id, "arch");
        assert_eq!(info.version, "unknown");
        assert!(info.like.is_empty());
    }
}
