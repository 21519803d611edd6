//! Counting the tests of a suite before it runs.
//!
//! The count only feeds progress reporting. It follows `Test.RunWith` data
//! tables and nested `Suite.Run` commands; suite-level problems come back
//! as negative sentinels.

use crate::classify::SuiteCommandKind;
use crate::command::Command;
use crate::store::{has_ext, ScriptStore, SCRIPT_EXT};

/// The suite name was empty.
pub const BAD_FILENAME: i64 = -1;
/// The name refers to a script, not a suite.
pub const BAD_SUITE: i64 = -2;
pub const SUITE_NOT_FOUND: i64 = -3;

pub struct SuiteFlattener<'a> {
    store: &'a dyn ScriptStore,
}

impl<'a> SuiteFlattener<'a> {
    pub fn new(store: &'a dyn ScriptStore) -> Self {
        Self { store }
    }

    /// Total number of tests reachable from the suite `name`.
    pub fn flatten(&self, name: &str) -> i64 {
        self.flatten_inner(name, &mut Vec::new())
    }

    /// Tests run directly by `commands`, not counting nested suites. A
    /// `Test.RunWith` counts one test per data row, or one when its data
    /// table is missing or empty (it is then reported as a single error).
    pub fn count_tests(&self, commands: &[Command]) -> usize {
        commands
            .iter()
            .map(|cmd| match SuiteCommandKind::classify(cmd) {
                SuiteCommandKind::TestRun | SuiteCommandKind::IgnoredTest => 1,
                SuiteCommandKind::TestRunWith => cmd
                    .args
                    .first()
                    .and_then(|datafile| self.store.get_data(datafile))
                    .map_or(1, |rows| rows.len().max(1)),
                _ => 0,
            })
            .sum()
    }

    fn flatten_inner(&self, name: &str, active: &mut Vec<String>) -> i64 {
        if name.is_empty() {
            return BAD_FILENAME;
        }
        let Some(commands) = self.store.get_suite(name) else {
            return if has_ext(name, SCRIPT_EXT) {
                BAD_SUITE
            } else {
                SUITE_NOT_FOUND
            };
        };

        // a suite that includes itself is only counted once
        let key = name.to_lowercase();
        if active.contains(&key) {
            return 0;
        }
        active.push(key);

        let mut total = self.count_tests(&commands) as i64;
        for cmd in &commands {
            if SuiteCommandKind::classify(cmd) == SuiteCommandKind::SuiteRun {
                total += self.flatten_inner(&cmd.monkey_id, active).max(0);
            }
        }
        active.pop();
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_script("login.mt", "Button ok Tap")
            .with_data("users.csv", "user\na\nb\nc\nd\ne\n")
            .with_data("empty.csv", "user\n")
            .with_suite("main.mts", "Test login.mt Run\nTest login.mt RunWith users.csv")
            .with_suite("outer.mts", "# all\nSuite main.mts Run\nTest login.mt Run\nSetup login.mt Run")
            .with_suite("bad.mts", "Test login.mt RunWith empty.csv\nTest login.mt RunWith\nTest login.mt RunWith gone.csv")
            .with_suite("loop.mts", "Test login.mt Run\nSuite loop.mts Run")
            .with_suite("nothing.mts", "")
    }

    #[test]
    fn counts_rows_and_nested_suites() {
        let store = store();
        let flattener = SuiteFlattener::new(&store);
        assert_eq!(flattener.flatten("main.mts"), 6);
        assert_eq!(flattener.flatten("outer"), 7);
    }

    #[test]
    fn data_problems_count_once() {
        let store = store();
        assert_eq!(SuiteFlattener::new(&store).flatten("bad.mts"), 3);
    }

    #[test]
    fn sentinels() {
        let store = store();
        let flattener = SuiteFlattener::new(&store);
        assert_eq!(flattener.flatten(""), BAD_FILENAME);
        assert_eq!(flattener.flatten("login.mt"), BAD_SUITE);
        assert_eq!(flattener.flatten("missing.mts"), SUITE_NOT_FOUND);
        assert_eq!(flattener.flatten("nothing.mts"), 0);
    }

    #[test]
    fn ignored_commands_count_as_reported() {
        let store = store().with_suite(
            "skipped.mts",
            "Test login.mt RunWith users.csv %ignore=true\nSuite main.mts Run %ignore=true\nTest login.mt Run",
        );
        assert_eq!(SuiteFlattener::new(&store).flatten("skipped.mts"), 2);
    }

    #[test]
    fn self_inclusion_terminates() {
        let store = store();
        assert_eq!(SuiteFlattener::new(&store).flatten("loop.mts"), 1);
    }
}
