//! Cookbook version numbers and interactive version menus

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::domain::DomainError;

/// Dotted cookbook version (`x.y.z` or `x.y`).
///
/// Ordering is numeric per component; the original text is kept for display
/// so `0.10` is never rewritten as `0.10.0`.
#[derive(Debug, Clone, Eq)]
pub struct VersionNumber {
    parts: [u64; 3],
    raw: String,
}

impl VersionNumber {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for VersionNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let pieces: Vec<&str> = trimmed.split('.').collect();
        if !(2..=3).contains(&pieces.len()) {
            return Err(DomainError::InvalidVersion(s.to_string()));
        }
        let mut parts = [0u64; 3];
        for (slot, piece) in parts.iter_mut().zip(&pieces) {
            *slot = piece
                .parse()
                .map_err(|_| DomainError::InvalidVersion(s.to_string()))?;
        }
        Ok(Self {
            parts,
            raw: trimmed.to_string(),
        })
    }
}

impl PartialEq for VersionNumber {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Sort version strings ascending. Unparseable entries sort first, as text.
pub fn sort_versions(versions: &mut [String]) {
    versions.sort_by(|a, b| match (a.parse::<VersionNumber>(), b.parse::<VersionNumber>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    });
}

/// Highest version in the list.
pub fn latest_version(versions: &[String]) -> Option<String> {
    let mut sorted = versions.to_vec();
    sort_versions(&mut sorted);
    sorted.pop()
}

/// One entry picked from a numbered version menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Zero-based index into the version list
    Version(usize),
    /// The trailing "All versions" entry
    All,
}

/// Parsed answer to a multi-select version menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuSelection {
    pub choices: Vec<MenuChoice>,
    pub invalid: Vec<String>,
}

impl MenuSelection {
    /// True when the user typed nothing at all.
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty() && self.invalid.is_empty()
    }

    pub fn includes_all(&self) -> bool {
        self.choices.contains(&MenuChoice::All)
    }
}

/// Parse a comma-separated menu answer against `count` versions.
///
/// Entries are numbered from 1; `count + 1` is "All versions".
pub fn parse_menu_selection(answer: &str, count: usize) -> MenuSelection {
    let mut selection = MenuSelection::default();
    for token in answer.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => {
                selection.choices.push(MenuChoice::Version(n - 1))
            }
            Ok(n) if n == count + 1 => selection.choices.push(MenuChoice::All),
            _ => selection.invalid.push(token.to_string()),
        }
    }
    selection
}

/// Parse a single numbered answer; returns the zero-based index.
pub fn parse_single_choice(answer: &str, count: usize) -> Option<usize> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Render a numbered menu: question, entries, optional extra entry, blank line.
pub fn render_menu(question: &str, entries: &[String], extra: Option<&str>) -> String {
    let mut out = format!("{question}\n");
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, entry));
    }
    if let Some(extra) = extra {
        out.push_str(&format!("{}. {}\n", entries.len() + 1, extra));
    }
    out.push('\n');
    out
}
