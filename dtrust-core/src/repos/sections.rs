//! INI-style `[section]` splitting shared by the DNF and pacman parsers

use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\[([^\]\r\n]+)\][ \t]*\r?$").expect("section header pattern is valid")
});

static KEY_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[A-Za-z_][A-Za-z0-9_.-]*\s*=").expect("key prefix pattern is valid")
});

/// A named block of `key = value` lines
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub body: String,
}

/// Split `text` on section headers
///
/// Text before the first header belongs to no section and is dropped, which
/// is how both DNF and pacman treat it.
pub fn split_sections(text: &str) -> Vec<Section> {
    let headers: Vec<(usize, usize, String)> = SECTION_HEADER
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let name = cap.get(1)?.as_str().trim().to_string();
            Some((whole.start(), whole.end(), name))
        })
        .filter(|(_, _, name)| !name.is_empty())
        .collect();

    headers
        .iter()
        .enumerate()
        .map(|(idx, (_, body_start, name))| {
            let body_end = headers.get(idx + 1).map(|(start, _, _)| *start).unwrap_or(text.len());
            Section {
                name: name.clone(),
                body: text[*body_start..body_end].to_string(),
            }
        })
        .collect()
}

impl Section {
    /// First value for `key` (case-insensitive), with indented continuation
    /// lines folded in. Empty values count as absent.
    pub fn value(&self, key: &str) -> Option<String> {
        self.values(key).into_iter().next()
    }

    /// Every value for `key`, in order
    pub fn values(&self, key: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Option<String> = None;

        for line in self.body.lines() {
            let is_continuation = line.starts_with([' ', '\t'])
                && !line.trim().is_empty()
                && !KEY_PREFIX.is_match(line)
                && !is_comment(line.trim());

            if is_continuation {
                if let Some(value) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some(value) = current.take() {
                out.push(value);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || is_comment(trimmed) {
                continue;
            }
            if let Some((k, v)) = trimmed.split_once('=') {
                if k.trim().eq_ignore_ascii_case(key) {
                    current = Some(v.trim().to_string());
                }
            }
        }
        if let Some(value) = current.take() {
            out.push(value);
        }

        out.retain(|v| !v.is_empty());
        out
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with(';')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ignores_preamble_and_keeps_order() {
        let text = "# preamble\nfoo=bar\n[first]\na=1\n\n[ second ]\nb=2\n";
        let sections = split_sections(text);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "first");
        assert_eq!(sections[0].value("a").as_deref(), Some("1"));
        assert_eq!(sections[1].name, "second");
        assert_eq!(sections[1].value("a"), None);
    }

    #[test]
    fn test_key_match_is_case_insensitive_and_skips_comments() {
        let sections = split_sections("[repo]\n#enabled=0\nEnabled = 1\n");
        assert_eq!(sections[0].value("enabled").as_deref(), Some("1"));
    }

    #[test]
    fn test_continuation_lines_fold_into_value() {
        let sections = split_sections(
            "[repo]\nbaseurl=http://a.example/\n        http://b.example/\ngpgcheck=1\n",
        );
        assert_eq!(
            sections[0].value("baseurl").as_deref(),
            Some("http://a.example/ http://b.example/")
        );
    }

    #[test]
    fn test_continuation_with_query_string_folds_into_value() {
        let sections = split_sections(
            "[repo]\nbaseurl=https://a.example/\n        http://b.example/?arch=x86_64\n  gpgcheck = 0\n",
        );
        assert_eq!(
            sections[0].value("baseurl").as_deref(),
            Some("https://a.example/ http://b.example/?arch=x86_64")
        );
        assert_eq!(sections[0].value("gpgcheck").as_deref(), Some("0"));
    }

    #[test]
    fn test_multiple_values() {
        let sections = split_sections("[core]\nServer = http://one/\nServer = http://two/\n");
        assert_eq!(sections[0].values("server"), vec!["http://one/", "http://two/"]);
    }

    #[test]
    fn test_truncated_header_does_not_open_section() {
        let sections = split_sections("[ok]\nx=1\n[broken\ny=2\n");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].value("y").as_deref(), Some("2"));
    }
}
