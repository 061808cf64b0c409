//! Line based `key: value` format shared by collection and metadata files.
//!
//! ```text
//! # comment
//! collection: nes
//! extensions: nes, zip
//! description: first line
//!   continued on an indented line
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

static ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<key>[A-Za-z0-9][A-Za-z0-9_.\-]*)\s*:\s*(?P<value>.*)$")
        .expect("invalid entry regex")
});

/// One `key: value` pair with its continuation lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    /// 1-based line number of the key.
    pub line: usize,
    /// Lower-cased key.
    pub key: String,
    /// Value lines; the inline value first when present.
    pub values: Vec<String>,
}

impl Entry {
    /// All value lines joined by a single space.
    pub fn text(&self) -> String {
        self.values.join(" ")
    }

    /// Values split on commas, for list keys such as `extensions`.
    pub fn list(&self) -> Vec<String> {
        self.values
            .iter()
            .flat_map(|value| value.split(','))
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

/// Problem found while reading the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseIssue {
    pub line: usize,
    pub message: String,
}

pub(crate) fn parse_entries(content: &str) -> (Vec<Entry>, Vec<ParseIssue>) {
    let mut entries: Vec<Entry> = Vec::new();
    let mut issues = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if raw.starts_with(char::is_whitespace) {
            match entries.last_mut() {
                Some(entry) => entry.values.push(trimmed.to_string()),
                None => issues.push(ParseIssue {
                    line,
                    message: "continuation line without a preceding key".to_string(),
                }),
            }
            continue;
        }

        match ENTRY_RE.captures(trimmed) {
            Some(caps) => {
                let value = caps["value"].trim();
                entries.push(Entry {
                    line,
                    key: caps["key"].to_lowercase(),
                    values: if value.is_empty() {
                        Vec::new()
                    } else {
                        vec![value.to_string()]
                    },
                });
            }
            None => issues.push(ParseIssue {
                line,
                message: format!("expected `key: value`, found `{trimmed}`"),
            }),
        }
    }

    (entries, issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_continuations_and_issues() {
        let content = "\
# header
  orphan
collection: NES
Extensions: nes,  zip
description: first
  second

not a pair
";
        let (entries, issues) = parse_entries(content);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].key, "collection");
        assert_eq!(entries[0].text(), "NES");
        assert_eq!(entries[1].key, "extensions");
        assert_eq!(entries[1].list(), ["nes", "zip"]);
        assert_eq!(entries[2].text(), "first second");
        assert_eq!(entries[2].line, 5);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].line, 2);
        assert_eq!(issues[1].line, 8);
    }
}
