//! Script store interface.
//!
//! Loading scripts, suites and data tables is done by a [`ScriptStore`]
//! collaborator. [`MemoryStore`] keeps everything in memory and is what
//! embedders and tests use when scripts do not come from disk.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::command::Command;

pub const SCRIPT_EXT: &str = ".mt";
pub const SUITE_EXT: &str = ".mts";
pub const JS_EXT: &str = ".js";
pub const DATA_EXT: &str = ".csv";

/// One data table row: column name and value, in header order.
pub type DataRow = Vec<(String, String)>;

/// True when `name` ends with `ext`, ignoring case.
pub fn has_ext(name: &str, ext: &str) -> bool {
    name.to_lowercase().ends_with(ext)
}

/// Appends `ext` unless `name` already carries a recognized extension.
pub fn with_ext(name: &str, ext: &str) -> String {
    let known = [SCRIPT_EXT, SUITE_EXT, JS_EXT, DATA_EXT];
    if known.iter().any(|e| has_ext(name, e)) {
        name.to_string()
    } else {
        format!("{}{}", name, ext)
    }
}

/// Source of scripts, suites and data tables.
pub trait ScriptStore: Send + Sync {
    /// Commands of the script `name`, or `None` when it does not exist.
    fn get_script(&self, name: &str) -> Option<Vec<Command>>;

    /// Commands of the suite `name`, or `None` when it does not exist.
    fn get_suite(&self, name: &str) -> Option<Vec<Command>>;

    /// Rows of the data table `name`, or `None` when it does not exist.
    fn get_data(&self, name: &str) -> Option<Vec<DataRow>>;

    /// True when a file with exactly this name exists.
    fn file_exists(&self, name: &str) -> bool;

    /// True when `name` should run through the script override instead of
    /// as plain commands.
    fn has_override(&self, name: &str) -> bool;
}

/// Parses CSV text: the first record is the header, every other record is
/// a row. Blank lines are skipped and short rows are padded with empty values.
pub fn parse_csv(text: &str) -> Result<Vec<DataRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = columns
            .iter()
            .enumerate()
            .map(|(i, col)| (col.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn override_key(name: &str) -> String {
    let key = name.to_lowercase();
    let stem = key
        .strip_suffix(JS_EXT)
        .or_else(|| key.strip_suffix(SCRIPT_EXT))
        .unwrap_or(&key);
    format!("{}{}", stem, JS_EXT)
}

/// In-memory [`ScriptStore`]. Names are matched case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    scripts: BTreeMap<String, Vec<Command>>,
    suites: BTreeMap<String, Vec<Command>>,
    data: BTreeMap<String, Vec<DataRow>>,
    overrides: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a script from its source text. `.mt` is appended when the name
    /// has no extension.
    pub fn with_script(mut self, name: &str, text: &str) -> Self {
        self.scripts
            .insert(with_ext(name, SCRIPT_EXT).to_lowercase(), Command::parse_lines(text));
        self
    }

    /// Adds a suite from its source text. `.mts` is appended when the name
    /// has no extension.
    pub fn with_suite(mut self, name: &str, text: &str) -> Self {
        self.suites
            .insert(with_ext(name, SUITE_EXT).to_lowercase(), Command::parse_lines(text));
        self
    }

    /// Adds a data table from CSV text. A table that cannot be parsed is
    /// stored without rows.
    pub fn with_data(mut self, name: &str, text: &str) -> Self {
        let rows = parse_csv(text).unwrap_or_else(|e| {
            warn!(datafile = name, error = %e, "unreadable data table");
            Vec::new()
        });
        self.data.insert(with_ext(name, DATA_EXT).to_lowercase(), rows);
        self
    }

    /// Marks `name` as handled by the script override. The name is stored
    /// with a `.js` extension.
    pub fn with_override(mut self, name: &str) -> Self {
        self.overrides.insert(override_key(name));
        self
    }
}

impl ScriptStore for MemoryStore {
    fn get_script(&self, name: &str) -> Option<Vec<Command>> {
        self.scripts
            .get(&with_ext(name, SCRIPT_EXT).to_lowercase())
            .cloned()
    }

    fn get_suite(&self, name: &str) -> Option<Vec<Command>> {
        self.suites
            .get(&with_ext(name, SUITE_EXT).to_lowercase())
            .cloned()
    }

    fn get_data(&self, name: &str) -> Option<Vec<DataRow>> {
        self.data.get(&with_ext(name, DATA_EXT).to_lowercase()).cloned()
    }

    fn file_exists(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        self.scripts.contains_key(&key)
            || self.suites.contains_key(&key)
            || self.data.contains_key(&key)
            || self.overrides.contains(&key)
    }

    fn has_override(&self, name: &str) -> bool {
        self.overrides.contains(&override_key(name))
    }
}
