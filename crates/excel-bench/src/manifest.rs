//! Fixture manifest (`manifest.json`) loading and saving.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::path_extension;
use crate::feature::Feature;
use crate::model::TestFile;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const DEFAULT_FILE_FORMAT: &str = "xlsx";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{file}: Unknown feature: {feature}")]
    UnknownFeature { file: String, feature: String },
    #[error("{file}: {feature} is a tier {expected} feature, manifest says tier {tier}")]
    TierMismatch {
        file: String,
        feature: String,
        tier: u8,
        expected: u8,
    },
    #[error("{file}: duplicate test case id '{id}'")]
    DuplicateCase { file: String, id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: String,
    pub excel_version: String,
    pub generator_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<String>,
    #[serde(default)]
    pub files: Vec<TestFile>,
}

impl Manifest {
    /// Effective format of `file`: its own `file_format`, else the manifest's, else the path
    /// suffix, else `xlsx`.
    pub fn file_format_of(&self, file: &TestFile) -> String {
        if let Some(format) = file.file_format.as_deref().or(self.file_format.as_deref()) {
            return format.trim_start_matches('.').to_ascii_lowercase();
        }
        let ext = path_extension(Path::new(&file.path));
        match ext.strip_prefix('.') {
            Some(ext) if !ext.is_empty() => ext.to_string(),
            _ => DEFAULT_FILE_FORMAT.to_string(),
        }
    }

    /// Feature names present in the manifest, in first-seen order.
    pub fn feature_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.files
            .iter()
            .map(|file| file.feature.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Read and validate a manifest. Every feature must be known, carry its own tier, and have
/// case ids unique per file.
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let bytes = fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ManifestError::NotFound(path.to_path_buf())
        } else {
            ManifestError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let manifest: Manifest =
        serde_json::from_slice(&bytes).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    validate(&manifest)?;
    Ok(manifest)
}

fn validate(manifest: &Manifest) -> Result<(), ManifestError> {
    for file in &manifest.files {
        let Ok(feature) = file.feature.parse::<Feature>() else {
            return Err(ManifestError::UnknownFeature {
                file: file.path.clone(),
                feature: file.feature.clone(),
            });
        };
        if file.tier != feature.tier() {
            return Err(ManifestError::TierMismatch {
                file: file.path.clone(),
                feature: file.feature.clone(),
                tier: file.tier,
                expected: feature.tier(),
            });
        }
        let mut ids = BTreeSet::new();
        for case in &file.test_cases {
            if !ids.insert(case.id.as_str()) {
                return Err(ManifestError::DuplicateCase {
                    file: file.path.clone(),
                    id: case.id.clone(),
                });
            }
        }
    }
    Ok(())
}

pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<(), ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut bytes = serde_json::to_vec_pretty(manifest).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    bytes.push(b'\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, bytes).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Importance, TestCase};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manifest_json() -> serde_json::Value {
        json!({
            "generated_at": "2026-01-01T00:00:00",
            "excel_version": "16.0",
            "generator_version": "0.1.0",
            "files": [{
                "path": "tier1/01_cell_values.xlsx",
                "feature": "cell_values",
                "tier": 1,
                "test_cases": [
                    {"id": "string_simple", "label": "Simple string", "row": 2,
                     "expected": {"type": "string", "value": "Hello World"}},
                    {"id": "edge", "label": "Edge", "row": 3, "importance": "edge",
                     "sheet": "Other", "cell": "C3",
                     "expected": {"type": "blank"}}
                ]
            }]
        })
    }

    fn write_json(dir: &Path, value: &serde_json::Value) -> PathBuf {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn loads_cases_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = load_manifest(&write_json(dir.path(), &manifest_json())).unwrap();

        let cases = &manifest.files[0].test_cases;
        assert_eq!(cases[0].sheet, None);
        assert_eq!(cases[0].cell, None);
        assert_eq!(cases[0].importance, Importance::Basic);
        assert_eq!(cases[0].cell_ref(), "B2");
        assert_eq!(cases[1].importance, Importance::Edge);
        assert_eq!(cases[1].cell_ref(), "C3");
        assert_eq!(manifest.feature_names(), vec!["cell_values"]);
    }

    #[test]
    fn missing_manifest_is_reported_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest(&dir.path().join(MANIFEST_FILE)).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
        assert!(err.to_string().starts_with("Manifest not found: "));
    }

    #[test]
    fn schema_violations_fail_fast() {
        let dir = tempfile::tempdir().unwrap();

        let mut missing_row = manifest_json();
        missing_row["files"][0]["test_cases"][0]
            .as_object_mut()
            .unwrap()
            .remove("row");
        let err = load_manifest(&write_json(dir.path(), &missing_row)).unwrap_err();
        assert!(matches!(err, ManifestError::Json { .. }));

        let mut unknown = manifest_json();
        unknown["files"][0]["feature"] = json!("sparklines");
        let err = load_manifest(&write_json(dir.path(), &unknown)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tier1/01_cell_values.xlsx: Unknown feature: sparklines"
        );

        let mut wrong_tier = manifest_json();
        wrong_tier["files"][0]["tier"] = json!(2);
        let err = load_manifest(&write_json(dir.path(), &wrong_tier)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::TierMismatch {
                tier: 2,
                expected: 1,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "tier1/01_cell_values.xlsx: cell_values is a tier 1 feature, manifest says tier 2"
        );

        let mut duplicate = manifest_json();
        duplicate["files"][0]["test_cases"][1]["id"] = json!("string_simple");
        let err = load_manifest(&write_json(dir.path(), &duplicate)).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateCase { .. }));
    }

    #[test]
    fn file_format_resolution_order() {
        let mut manifest: Manifest = serde_json::from_value(manifest_json()).unwrap();
        let mut file = manifest.files[0].clone();
        assert_eq!(manifest.file_format_of(&file), "xlsx");

        file.path = "legacy/01_cell_values.XLS".to_string();
        assert_eq!(manifest.file_format_of(&file), "xls");

        manifest.file_format = Some("xlsb".to_string());
        assert_eq!(manifest.file_format_of(&file), "xlsb");

        file.file_format = Some(".ODS".to_string());
        assert_eq!(manifest.file_format_of(&file), "ods");

        file.file_format = None;
        manifest.file_format = None;
        file.path = "no_extension".to_string();
        assert_eq!(manifest.file_format_of(&file), DEFAULT_FILE_FORMAT);
    }

    #[test]
    fn write_then_load_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest: Manifest = serde_json::from_value(manifest_json()).unwrap();
        manifest.files[0]
            .test_cases
            .push(TestCase::new("added", 9, serde_json::Map::new()));
        let path = dir.path().join("nested").join(MANIFEST_FILE);
        write_manifest(&manifest, &path).unwrap();
        assert_eq!(load_manifest(&path).unwrap(), manifest);
    }
}
