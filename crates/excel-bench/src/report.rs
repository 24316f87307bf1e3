//! `results.json` and the plain-text score matrix.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compare::failure_note_from_actual;
use crate::model::{
    BenchmarkMetadata, BenchmarkResults, Diagnostic, Importance, JsonMap, LibraryInfo,
    OperationType, TestResult,
};

pub const RESULTS_FILE: &str = "results.json";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid results file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub metadata: BenchmarkMetadata,
    pub libraries: BTreeMap<String, LibraryInfo>,
    pub results: Vec<FeatureEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub feature: String,
    pub library: String,
    pub scores: Scores,
    pub test_cases: BTreeMap<String, CaseEntry>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub read: Option<u8>,
    pub write: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<CaseOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<CaseOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub passed: bool,
    pub expected: JsonMap,
    pub actual: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl From<&TestResult> for CaseOutcome {
    fn from(result: &TestResult) -> Self {
        let notes = match (&result.notes, result.passed) {
            (Some(notes), _) => Some(notes.clone()),
            (None, false) => Some(failure_note_from_actual(&result.actual).to_string()),
            (None, true) => None,
        };
        Self {
            passed: result.passed,
            expected: result.expected.clone(),
            actual: result.actual.clone(),
            notes,
            importance: result.importance,
            diagnostics: result.diagnostics.clone(),
        }
    }
}

/// Regroup flat per-operation results by test case id.
pub fn to_document(results: &BenchmarkResults) -> ResultsDocument {
    let entries = results
        .scores
        .iter()
        .map(|score| {
            let mut test_cases: BTreeMap<String, CaseEntry> = BTreeMap::new();
            for result in &score.test_results {
                let entry = test_cases.entry(result.test_case_id.clone()).or_default();
                let outcome = Some(CaseOutcome::from(result));
                match result.operation {
                    OperationType::Read => entry.read = outcome,
                    OperationType::Write => entry.write = outcome,
                }
            }
            FeatureEntry {
                feature: score.feature.clone(),
                library: score.library.clone(),
                scores: Scores {
                    read: score.read_score,
                    write: score.write_score,
                },
                test_cases,
                notes: score.notes.clone(),
            }
        })
        .collect();

    ResultsDocument {
        metadata: results.metadata.clone(),
        libraries: results.libraries.clone(),
        results: entries,
    }
}

/// Write `results.json` into `output_dir` (created if needed) and return its path.
pub fn write_results(results: &BenchmarkResults, output_dir: &Path) -> Result<PathBuf, ReportError> {
    let path = output_dir.join(RESULTS_FILE);
    fs::create_dir_all(output_dir).map_err(|source| ReportError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let mut bytes =
        serde_json::to_vec_pretty(&to_document(results)).map_err(|source| ReportError::Json {
            path: path.clone(),
            source,
        })?;
    bytes.push(b'\n');
    fs::write(&path, bytes).map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

pub fn load_results(path: &Path) -> Result<ResultsDocument, ReportError> {
    let bytes = fs::read(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ReportError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn score_cell(scores: Scores) -> String {
    let mut parts = Vec::new();
    if let Some(read) = scores.read {
        parts.push(format!("R{read}"));
    }
    if let Some(write) = scores.write {
        parts.push(format!("W{write}"));
    }
    if parts.is_empty() {
        "n/a".to_string()
    } else {
        parts.join(" ")
    }
}

/// Feature × library matrix of `R<read> W<write>` scores, followed by notes.
pub fn render_text_summary(document: &ResultsDocument) -> String {
    let meta = &document.metadata;
    let mut features: Vec<&str> = Vec::new();
    let mut libraries: Vec<&str> = document.libraries.keys().map(String::as_str).collect();
    let mut cells: BTreeMap<(&str, &str), Scores> = BTreeMap::new();
    for entry in &document.results {
        if !features.contains(&entry.feature.as_str()) {
            features.push(&entry.feature);
        }
        if !libraries.contains(&entry.library.as_str()) {
            libraries.push(&entry.library);
        }
        cells.insert((entry.feature.as_str(), entry.library.as_str()), entry.scores);
    }

    let mut out = String::new();
    let _ = writeln!(out, "Excel library benchmark");
    let _ = writeln!(
        out,
        "  version: {}  excel: {}  platform: {}  run: {}",
        meta.benchmark_version,
        meta.excel_version,
        meta.platform,
        meta.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out);

    if features.is_empty() {
        let _ = writeln!(out, "No results.");
        return out;
    }

    let feature_width = features.iter().map(|f| f.len()).max().unwrap_or(0).max(7);
    let widths: Vec<usize> = libraries.iter().map(|lib| lib.len().max(5)).collect();

    let _ = write!(out, "{:<feature_width$}", "feature");
    for (library, width) in libraries.iter().zip(widths.iter().copied()) {
        let _ = write!(out, "  {library:<width$}");
    }
    let _ = writeln!(out);

    for feature in &features {
        let _ = write!(out, "{feature:<feature_width$}");
        for (library, width) in libraries.iter().zip(widths.iter().copied()) {
            let cell = cells
                .get(&(*feature, *library))
                .map_or_else(|| "-".to_string(), |scores| score_cell(*scores));
            let _ = write!(out, "  {cell:<width$}");
        }
        let _ = writeln!(out);
    }

    let notes: Vec<&FeatureEntry> = document
        .results
        .iter()
        .filter(|entry| entry.notes.is_some())
        .collect();
    if !notes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Notes:");
        for entry in notes {
            let _ = writeln!(
                out,
                "  {} / {}: {}",
                entry.library,
                entry.feature,
                entry.notes.as_deref().unwrap_or_default()
            );
        }
    }
    out
}
