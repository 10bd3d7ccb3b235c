//! Case-insensitive glob selection of application names

use super::BatchSyncError;
use globset::{GlobBuilder, GlobMatcher};

#[derive(Debug, Clone)]
pub struct AppPattern {
    matcher: GlobMatcher,
}

impl AppPattern {
    /// Only `*` and `?` are wildcards; everything else matches literally
    pub fn new(pattern: &str) -> Result<Self, BatchSyncError> {
        let glob = GlobBuilder::new(&wildcards_only(pattern.trim()))
            .case_insensitive(true)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|source| BatchSyncError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            matcher: glob.compile_matcher(),
        })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }

    /// Matching names, sorted and deduplicated
    pub fn select<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut matched: Vec<String> = names
            .into_iter()
            .filter(|name| self.is_match(name))
            .map(str::to_string)
            .collect();
        matched.sort();
        matched.dedup();
        matched
    }
}

/// Escape glob syntax other than `*` and `?`. Runs of `*` collapse to one,
/// since `**` has path meaning in globset.
fn wildcards_only(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut after_star = false;
    for c in pattern.chars() {
        match c {
            '*' if after_star => {}
            '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        after_star = c == '*';
    }
    out
}
