//! Value comparisons used by `Vars.Verify*`.

use regex::Regex;

/// Returns true if the pattern contains glob wildcard characters (`*` or `?`).
fn has_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Matches a string against a glob pattern with `*` (any chars) and `?` (single char).
///
/// When the pattern has no wildcards, falls back to exact equality.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    if !has_wildcard(pattern) {
        return pattern == text;
    }

    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    // prev[j] = pattern[..i-1] matches text[..j]
    let mut prev = vec![false; txt.len() + 1];
    prev[0] = true;
    for p in &pat {
        let mut cur = vec![false; txt.len() + 1];
        cur[0] = *p == '*' && prev[0];
        for j in 1..=txt.len() {
            cur[j] = match p {
                '*' => prev[j] || cur[j - 1],
                '?' => prev[j - 1],
                c => prev[j - 1] && *c == txt[j - 1],
            };
        }
        prev = cur;
    }
    prev[txt.len()]
}

/// Matches the whole of `text` against `pattern`.
pub fn regex_match(pattern: &str, text: &str) -> Result<bool, regex::Error> {
    let re = Regex::new(&format!("^(?:{})$", pattern))?;
    Ok(re.is_match(text))
}

/// Comparison selected by a `Vars.Verify*` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    Wildcard,
    Regex,
}

/// A parsed `verify`, `verifynot`, `verifywildcard` ... action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyKind {
    pub comparison: Comparison,
    pub negated: bool,
}

impl VerifyKind {
    /// Parses a verify action name, case-insensitively.
    pub fn parse(action: &str) -> Option<Self> {
        let (comparison, negated) = match action.to_lowercase().as_str() {
            "verify" => (Comparison::Equals, false),
            "verifynot" => (Comparison::Equals, true),
            "verifywildcard" => (Comparison::Wildcard, false),
            "verifynotwildcard" => (Comparison::Wildcard, true),
            "verifyregex" => (Comparison::Regex, false),
            "verifynotregex" => (Comparison::Regex, true),
            _ => return None,
        };
        Some(Self { comparison, negated })
    }

    /// Compares `actual` with `expected`. `Ok(None)` means the check held,
    /// `Ok(Some(msg))` is a failure message, `Err` an invalid pattern.
    pub fn check(&self, expected: &str, actual: &str) -> Result<Option<String>, regex::Error> {
        let matched = match self.comparison {
            Comparison::Equals => expected == actual,
            Comparison::Wildcard => wildcard_match(expected, actual),
            Comparison::Regex => regex_match(expected, actual)?,
        };
        if matched != self.negated {
            return Ok(None);
        }
        let expectation = match (self.comparison, self.negated) {
            (Comparison::Equals, false) => "",
            (Comparison::Equals, true) => "not ",
            (Comparison::Wildcard, false) => "match to wildcard pattern ",
            (Comparison::Wildcard, true) => "non-match to wildcard pattern ",
            (Comparison::Regex, false) => "match to regex pattern ",
            (Comparison::Regex, true) => "non-match to regex pattern ",
        };
        let msg = format!(
            "Expected {}\"{}\" but found \"{}\"",
            expectation, expected, actual
        );
        Ok(Some(msg))
    }
}
