//! Parsed script commands.
//!
//! A [`Command`] is one line of a script: a component type, a target id
//! (the "monkey id"), an action, positional arguments and `%name=value`
//! modifiers. Commands are immutable once parsed; substitution and timing
//! stamps always produce a new value.
//!
//! # Example
//!
//! ```
//! use scriptplay_core::command::Command;
//!
//! let cmd = Command::parse(r#"Input name EnterText "Bo Bo" %timeout=5000"#);
//! assert_eq!(cmd.component_type, "Input");
//! assert_eq!(cmd.args, vec!["Bo Bo".to_string()]);
//! assert_eq!(cmd.timeout_ms(), Some(5000));
//! assert_eq!(cmd.to_string(), r#"Input name EnterText "Bo Bo" %timeout=5000"#);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default per-command timeout stamped onto outgoing commands, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
/// Default per-command thinktime stamped onto outgoing commands, in milliseconds.
pub const DEFAULT_THINKTIME_MS: u64 = 500;

pub const COMMENT_PREFIX: &str = "#";
pub const MODIFIER_PREFIX: &str = "%";

pub const TIMEOUT_MODIFIER: &str = "timeout";
pub const THINKTIME_MODIFIER: &str = "thinktime";
pub const IGNORE_MODIFIER: &str = "ignore";
pub const SHOULD_FAIL_MODIFIER: &str = "shouldfail";
pub const ABORT_MODIFIER: &str = "abort";
pub const SCREENSHOT_ON_ERROR_MODIFIER: &str = "screenshotonerror";

const TOKEN_PATTERN: &str = r#"[^\s"=]+="[^"]*"|[^\s"]+|"[^"]*""#;
const VARIABLE_REF_PATTERN: &str = r"\$\{([^}]+)\}";
/// Stand-in for `\"` while tokenizing so escaped quotes never split a token.
const ESCAPED_QUOTE_MARK: &str = "\u{21D0}\u{21D1}\u{21D2}\u{21D3}";

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern compiles"))
}

fn variable_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VARIABLE_REF_PATTERN).expect("variable pattern compiles"))
}

/// Splits a raw command line into tokens.
///
/// Whitespace separates tokens; `"quoted text"` and `key="quoted text"` are
/// single tokens. Quotes are kept, callers strip them where needed. A line
/// starting with `#` is returned as one token.
pub fn tokenize(line: &str) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    if line.starts_with(COMMENT_PREFIX) {
        return vec![line.to_string()];
    }

    let hidden = line.replace("\\\"", ESCAPED_QUOTE_MARK);
    token_regex()
        .find_iter(&hidden)
        .map(|m| m.as_str().replace(ESCAPED_QUOTE_MARK, "\\\""))
        .collect()
}

/// Strips surrounding whitespace and one pair of surrounding double quotes.
fn import_token(token: &str) -> String {
    let t = token.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        t[1..t.len() - 1].to_string()
    } else {
        t.to_string()
    }
}

/// Quotes a token for display when it is empty or contains whitespace.
fn export_token(token: &str) -> String {
    if !token.is_empty() && !token.chars().any(char::is_whitespace) {
        token.to_string()
    } else {
        format!("\"{}\"", token.replace('"', "\\\""))
    }
}

fn or_wildcard(s: String) -> String {
    if s.is_empty() {
        "*".to_string()
    } else {
        s
    }
}

/// Values a command's `%{...}` and `${...}` references resolve against.
///
/// Built by a scope from the command that created it plus the merged
/// global/local variable map.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub component_type: Option<&'a str>,
    pub monkey_id: Option<&'a str>,
    pub action: Option<&'a str>,
    pub args: &'a [String],
    pub variables: &'a BTreeMap<String, String>,
}

impl Bindings<'_> {
    fn apply(&self, s: &str) -> String {
        let mut out = s.to_string();
        if !out.contains('%') && !out.contains('$') {
            return out;
        }
        if let Some(v) = self.component_type {
            out = out.replace("%{componentType}", v);
        }
        if let Some(v) = self.monkey_id {
            out = out.replace("%{monkeyId}", v);
        }
        if let Some(v) = self.action {
            out = out.replace("%{action}", v);
        }
        for (i, arg) in self.args.iter().enumerate() {
            out = out.replace(&format!("%{{{}}}", i + 1), arg);
        }
        for (name, value) in self.variables {
            out = out.replace(&format!("${{{}}}", name), value);
        }
        out
    }
}

/// One parsed script instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Command {
    pub component_type: String,
    pub monkey_id: String,
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Modifier values keyed by lowercase name, without the `%` prefix.
    #[serde(default)]
    pub modifiers: BTreeMap<String, String>,
    /// Comment text (including the leading `#`) when this line is a comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Command {
    /// Creates a command from its parts. Empty identifiers become `*`.
    pub fn new(
        component_type: impl Into<String>,
        monkey_id: impl Into<String>,
        action: impl Into<String>,
        args: Vec<String>,
        modifiers: BTreeMap<String, String>,
    ) -> Self {
        let component_type: String = component_type.into();
        if component_type.trim_start().starts_with(COMMENT_PREFIX) {
            return Self::comment(component_type.trim());
        }
        Self {
            component_type: or_wildcard(import_token(&component_type)),
            monkey_id: or_wildcard(import_token(&monkey_id.into())),
            action: or_wildcard(import_token(&action.into()).split_whitespace().collect()),
            args,
            modifiers: modifiers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            comment: None,
        }
    }

    /// Creates a comment line.
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            comment: Some(text.into()),
            ..Self::default()
        }
    }

    /// Parses one line of script text.
    pub fn parse(line: &str) -> Self {
        let mut tokens = tokenize(line).into_iter();
        let Some(first) = tokens.next() else {
            return Self::new("", "", "", Vec::new(), BTreeMap::new());
        };
        if first.starts_with(COMMENT_PREFIX) {
            return Self::comment(first);
        }
        let monkey_id = tokens.next().unwrap_or_default();
        let action = tokens.next().unwrap_or_default();
        let mut cmd = Self::new(first, monkey_id, action, Vec::new(), BTreeMap::new());
        cmd.push_args_and_modifiers(tokens);
        cmd
    }

    /// Parses a list of lines, skipping blank ones.
    pub fn parse_lines(text: &str) -> Vec<Self> {
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Replaces args and modifiers with the ones parsed from `s`.
    pub fn with_args_and_modifiers(mut self, s: &str) -> Self {
        self.args.clear();
        self.modifiers.clear();
        self.push_args_and_modifiers(tokenize(s).into_iter());
        self
    }

    fn push_args_and_modifiers(&mut self, tokens: impl Iterator<Item = String>) {
        for token in tokens {
            match token.strip_prefix(MODIFIER_PREFIX) {
                Some(rest) if rest.contains('=') => {
                    let (key, val) = rest.split_once('=').unwrap_or((rest, ""));
                    self.modifiers.insert(key.to_lowercase(), import_token(val));
                }
                _ => self.args.push(import_token(&token)),
            }
        }
    }

    pub fn is_comment(&self) -> bool {
        self.comment.is_some()
    }

    /// Lowercase `componenttype.action`, used to classify the command.
    pub fn name(&self) -> String {
        format!("{}.{}", self.component_type, self.action).to_lowercase()
    }

    pub fn modifier(&self, key: &str) -> Option<&str> {
        self.modifiers.get(key).map(String::as_str)
    }

    fn modifier_u64(&self, key: &str) -> Option<u64> {
        self.modifier(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.modifier_u64(TIMEOUT_MODIFIER)
    }

    pub fn thinktime_ms(&self) -> Option<u64> {
        self.modifier_u64(THINKTIME_MODIFIER)
    }

    /// True when `%ignore=true`.
    pub fn is_ignored(&self) -> bool {
        self.modifier(IGNORE_MODIFIER)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// True when the `%ignore` value mentions `phase` (e.g. `setup`, `teardown`).
    pub fn is_ignored_for(&self, phase: &str) -> bool {
        self.modifier(IGNORE_MODIFIER)
            .is_some_and(|v| v.to_lowercase().contains(&phase.to_lowercase()))
    }

    /// True when `%shouldfail=true`.
    pub fn should_fail(&self) -> bool {
        self.modifier(SHOULD_FAIL_MODIFIER)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Explicit `%screenshotonerror` value, if the command sets one.
    pub fn screenshot_on_error(&self) -> Option<bool> {
        self.modifier(SCREENSHOT_ON_ERROR_MODIFIER)
            .map(|v| !v.eq_ignore_ascii_case("false"))
    }

    /// Returns a copy with `key` set to `value`.
    pub fn with_modifier(mut self, key: &str, value: impl Into<String>) -> Self {
        self.modifiers.insert(key.to_lowercase(), value.into());
        self
    }

    /// Returns a copy with `%timeout` and `%thinktime` filled in where absent.
    pub fn with_default_timings(mut self, timeout_ms: u64, thinktime_ms: u64) -> Self {
        if self.is_comment() {
            return self;
        }
        self.modifiers
            .entry(TIMEOUT_MODIFIER.to_string())
            .or_insert_with(|| timeout_ms.to_string());
        self.modifiers
            .entry(THINKTIME_MODIFIER.to_string())
            .or_insert_with(|| thinktime_ms.to_string());
        self
    }

    /// Args joined by spaces, quoting the ones that contain whitespace.
    pub fn args_as_string(&self) -> String {
        self.args
            .iter()
            .map(|a| {
                if is_quoted_pair(a) {
                    a.clone()
                } else if a.starts_with(MODIFIER_PREFIX) && a.contains('=') {
                    format!("\"{}\"", a)
                } else {
                    export_token(a)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Modifiers as `%key=value` pairs joined by spaces.
    pub fn modifiers_as_string(&self) -> String {
        self.modifiers
            .iter()
            .map(|(k, v)| format!("{}{}={}", MODIFIER_PREFIX, k, export_token(v)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Applies `bindings` to every field, returning a new command.
    ///
    /// Comments come back unchanged. References with no binding are left as
    /// literal text.
    pub fn substitute(&self, bindings: &Bindings<'_>) -> Self {
        if self.is_comment() {
            return self.clone();
        }
        Self {
            component_type: bindings.apply(&self.component_type),
            monkey_id: bindings.apply(&self.monkey_id),
            action: bindings.apply(&self.action),
            args: self.args.iter().map(|a| bindings.apply(a)).collect(),
            modifiers: self
                .modifiers
                .iter()
                .map(|(k, v)| (k.clone(), bindings.apply(v)))
                .collect(),
            comment: None,
        }
    }

    /// Names of `${name}` references still present in the command.
    pub fn unresolved_variables(&self) -> Vec<String> {
        let re = variable_ref_regex();
        let mut names: Vec<String> = Vec::new();
        let fields = [&self.component_type, &self.monkey_id, &self.action]
            .into_iter()
            .chain(self.args.iter())
            .chain(self.modifiers.values());
        for field in fields {
            for cap in re.captures_iter(field) {
                let name = cap[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

fn is_quoted_pair(arg: &str) -> bool {
    match arg.split_once('=') {
        Some((k, v)) => {
            !k.is_empty()
                && !k.chars().any(char::is_whitespace)
                && v.len() >= 2
                && v.starts_with('"')
                && v.ends_with('"')
                && !v[1..v.len() - 1].contains('"')
        }
        None => false,
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = &self.comment {
            return write!(f, "{}", text);
        }
        write!(
            f,
            "{} {} {}",
            self.component_type,
            export_token(&self.monkey_id),
            self.action
        )?;
        let args = self.args_as_string();
        if !args.is_empty() {
            write!(f, " {}", args)?;
        }
        let mods = self.modifiers_as_string();
        if !mods.is_empty() {
            write!(f, " {}", mods)?;
        }
        Ok(())
    }
}
