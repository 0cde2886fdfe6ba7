#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_ingest::dialect::Dialect;
use csv_ingest::progress::Reporter;
use csv_ingest::store::{Store, StoreError};
use parking_lot::Mutex;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// CSV text with an `id,name,score` header and `rows` generated data rows.
pub fn numbered_csv(rows: usize) -> String {
    let mut text = String::from("id,name,score\n");
    for i in 1..=rows {
        text.push_str(&format!("{i},name{i},{}.5\n", i % 100));
    }
    text
}

pub fn numbered_rows(rows: usize) -> Vec<Vec<String>> {
    (1..=rows)
        .map(|i| vec![i.to_string(), format!("name{i}"), format!("{}.5", i % 100)])
        .collect()
}

/// Collects every progress value and log line it receives.
#[derive(Default)]
pub struct RecordingReporter {
    pub percents: Mutex<Vec<u8>>,
    pub lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn percents(&self) -> Vec<u8> {
        self.percents.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn saw_line(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl Reporter for RecordingReporter {
    fn progress(&self, percent: u8) {
        self.percents.lock().push(percent);
    }

    fn log_line(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

type FailRule = Box<dyn Fn(&str, &[String]) -> bool + Send + Sync>;

/// In-memory store that records statements and fails the ones matching a rule.
pub struct ScriptedStore {
    dialect: Dialect,
    fail_when: FailRule,
    pub executed: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedStore {
    pub fn new(dialect: Dialect) -> Self {
        Self::failing(dialect, |_, _| false)
    }

    pub fn failing(
        dialect: Dialect,
        rule: impl Fn(&str, &[String]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            dialect,
            fail_when: Box::new(rule),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed
            .lock()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn inserted_params(&self) -> Vec<String> {
        self.executed
            .lock()
            .iter()
            .filter(|(sql, _)| sql.starts_with("INSERT"))
            .flat_map(|(_, params)| params.iter().cloned())
            .collect()
    }
}

impl Store for ScriptedStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&self, sql: &str, params: &[String]) -> Result<u64, StoreError> {
        if (self.fail_when)(sql, params) {
            return Err(StoreError::execute(
                self.dialect,
                format!("scripted failure for {} parameter(s)", params.len()),
            ));
        }
        self.executed
            .lock()
            .push((sql.to_string(), params.to_vec()));
        Ok((params.len() / 3) as u64)
    }
}
