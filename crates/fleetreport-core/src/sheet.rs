//! Spreadsheet sheet naming.
//!
//! Sheet names must be at most 31 characters, must not contain `\ / ? * [ ] :`
//! and must not start or end with an apostrophe. Names are sanitized first and
//! then made unique within one export, so two labels that sanitize to the same
//! string still get distinct sheets.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum sheet name length in characters.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const REPLACEMENT: char = ' ';

static ILLEGAL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\/?*\[\]:\r\n\t\x00\x03]").expect("sheet name pattern is valid"));

/// Make `label` acceptable as a sheet name.
#[must_use]
pub fn sanitize_sheet_name(label: &str) -> String {
    if label.is_empty() {
        return "empty".to_string();
    }

    let truncated: String = label.chars().take(MAX_SHEET_NAME_LEN).collect();
    let replaced = ILLEGAL_CHARS.replace_all(&truncated, " ");

    let last = replaced.chars().count() - 1;
    replaced
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c == '\'' && (i == 0 || i == last) {
                REPLACEMENT
            } else {
                c
            }
        })
        .collect()
}

/// Sheet names handed out within one export call.
#[derive(Debug, Default)]
pub struct SheetNameTable {
    counts: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl SheetNameTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `label` and return a name not yet handed out by this table.
    ///
    /// The first occurrence keeps the bare name; the n-th becomes `name-n`.
    /// The base is shortened when the suffix would exceed the length limit.
    /// Counters skip any candidate already issued, whether bare or suffixed.
    pub fn unique(&mut self, label: &str) -> String {
        let base = sanitize_sheet_name(label);
        let count = self.counts.entry(base.clone()).or_insert(0);
        *count += 1;

        if *count == 1 && !self.issued.contains(&base) {
            self.issued.insert(base.clone());
            return base;
        }

        let mut n = (*count).max(2);
        let name = loop {
            let candidate = with_suffix(&base, n);
            if !self.issued.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        *count = n;
        self.issued.insert(name.clone());
        name
    }
}

fn with_suffix(base: &str, n: usize) -> String {
    let suffix = format!("-{n}");
    let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
    let head: String = base.chars().take(keep).collect();
    format!("{head}{suffix}")
}
