//! Global variable store.
//!
//! Globals live for a whole runner invocation, independent of any
//! [`Scope`](crate::scope::Scope). The store is an ordinary value that the
//! runner creates and hands to its processors behind an `Arc`; callers must
//! use one store per run and not share it between concurrent runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

use regex::Regex;

use crate::error::VariableError;

/// Names that would collide with the script-override runtime.
pub const RESERVED_WORDS: &[&str] = &[
    "alert", "frames", "outerHeight", "all", "frameRate", "outerWidth", "anchor", "function",
    "packages", "anchors", "getClass", "pageXOffset", "area", "hasOwnProperty", "pageYOffset",
    "Array", "hidden", "parent", "assign", "history", "parseFloat", "blur", "image", "parseInt",
    "button", "images", "password", "checkbox", "Infinity", "pkcs11", "clearInterval", "isFinite",
    "plugin", "clearTimeout", "isNaN", "prompt", "clientInformation", "isPrototypeOf",
    "propertyIsEnum", "close", "java", "prototype", "closed", "JavaArray", "radio", "confirm",
    "JavaClass", "reset", "constructor", "JavaObject", "screenX", "crypto", "JavaPackage",
    "screenY", "Date", "innerHeight", "scroll", "decodeURI", "innerWidth", "secure",
    "decodeURIComponent", "layer", "select", "defaultStatus", "layers", "self", "document",
    "length", "setInterval", "element", "link", "setTimeout", "elements", "location", "status",
    "embed", "Math", "String", "embeds", "mimeTypes", "submit", "encodeURI", "name", "taint",
    "encodeURIComponent", "NaN", "text", "escape", "navigate", "textarea", "eval", "navigator",
    "top", "event", "Number", "toString", "fileUpload", "Object", "undefined", "focus",
    "offscreenBuffering", "unescape", "form", "open", "untaint", "forms", "opener", "valueOf",
    "frame", "option", "window", "abstract", "else", "instanceof", "super", "boolean", "enum",
    "int", "switch", "break", "export", "interface", "synchronized", "byte", "extends", "let",
    "this", "case", "false", "long", "throw", "catch", "final", "native", "throws", "char",
    "finally", "new", "transient", "class", "float", "null", "true", "const", "for", "package",
    "try", "continue", "private", "typeof", "debugger", "goto", "protected", "var", "default",
    "if", "public", "void", "delete", "implements", "return", "volatile", "do", "import", "short",
    "while", "double", "in", "static", "with",
];

const ASSIGNMENT_PATTERN: &str = r#"(\S+=".*?"|\S+='.*?'|\S+=\S+)\s*"#;

fn assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ASSIGNMENT_PATTERN).expect("assignment pattern compiles"))
}

/// True when `name` is a letter followed by letters, digits or underscores.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Checks a local variable name.
pub fn validate_variable(name: &str) -> Result<(), VariableError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(VariableError::Illegal(name.to_string()))
    }
}

/// Checks a global variable name against the grammar and reserved words.
pub fn validate_name(name: &str) -> Result<(), VariableError> {
    if !is_valid_name(name) {
        return Err(VariableError::IllegalGlobal(name.to_string()));
    }
    if RESERVED_WORDS.contains(&name) {
        return Err(VariableError::ReservedGlobal(name.to_string()));
    }
    Ok(())
}

/// Strips one pair of matching single or double quotes.
pub(crate) fn unquote(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Parses `a=1 b="x y" c='z'` into ordered name/value pairs.
pub fn parse_assignments(s: &str) -> Result<Vec<(String, String)>, VariableError> {
    let mut out = Vec::new();
    for cap in assignment_regex().captures_iter(s) {
        let Some((name, value)) = cap[1].split_once('=') else {
            continue;
        };
        validate_name(name)?;
        out.push((name.to_string(), unquote(value).to_string()));
    }
    Ok(out)
}

/// Named values shared by every scope of one run.
#[derive(Debug, Default)]
pub struct Globals {
    values: Mutex<BTreeMap<String, String>>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        // a panic while holding the lock cannot leave the map half-written
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Removes every global.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Sets one global after validating its name.
    pub fn set(&self, name: &str, value: impl Into<String>) -> Result<(), VariableError> {
        validate_name(name)?;
        self.lock().insert(name.to_string(), value.into());
        Ok(())
    }

    /// Sets several globals, stopping at the first invalid name.
    pub fn set_all<I, K, V>(&self, values: I) -> Result<(), VariableError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in values {
            self.set(k.as_ref(), v)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Removes a global, returning its previous value.
    pub fn delete(&self, name: &str) -> Option<String> {
        self.lock().remove(name)
    }

    /// Copy of every global.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
