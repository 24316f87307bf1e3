//! Choosing the reader that verifies what a writer produced.
//!
//! The library reader (the `openpyxl` slot) is always available. An Excel-backed reader and a
//! legacy BIFF (`.xls`) reader are optional and injected by the caller; nothing here consults
//! the environment except [`WriteOracle::from_env`], which the CLI calls once.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::{AdapterError, AdapterMeta, ExcelReader};
use crate::feature::Feature;

pub const WRITE_ORACLE_ENV: &str = "EXCELBENCH_WRITE_ORACLE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WriteOracle {
    /// Verify with the library reader.
    Openpyxl,
    /// Verify with the Excel-backed reader when one is configured.
    Excel,
    /// Excel when configured and reachable, else the library reader.
    #[default]
    Auto,
}

impl WriteOracle {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteOracle::Openpyxl => "openpyxl",
            WriteOracle::Excel => "excel",
            WriteOracle::Auto => "auto",
        }
    }

    /// `EXCELBENCH_WRITE_ORACLE`, if set to a known value.
    pub fn from_env() -> Option<Self> {
        let raw = std::env::var(WRITE_ORACLE_ENV).ok()?;
        match raw.parse() {
            Ok(oracle) => Some(oracle),
            Err(err) => {
                log::warn!("ignoring {WRITE_ORACLE_ENV}: {err}");
                None
            }
        }
    }
}

impl FromStr for WriteOracle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openpyxl" => Ok(WriteOracle::Openpyxl),
            "excel" => Ok(WriteOracle::Excel),
            "auto" => Ok(WriteOracle::Auto),
            other => Err(format!("unknown write oracle '{other}'")),
        }
    }
}

impl fmt::Display for WriteOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("no {0} verifier is configured")]
pub struct MissingOracle(pub &'static str);

type Probe = Box<dyn Fn() -> Result<(), AdapterError>>;

/// The verifiers available to a run.
pub struct OracleSet {
    library: Box<dyn ExcelReader>,
    excel: Option<Box<dyn ExcelReader>>,
    excel_probe: Probe,
    legacy_biff: Option<Box<dyn ExcelReader>>,
}

impl OracleSet {
    pub fn new(library: Box<dyn ExcelReader>) -> Self {
        Self {
            library,
            excel: None,
            excel_probe: Box::new(|| Err(AdapterError::Unsupported("excel oracle".to_string()))),
            legacy_biff: None,
        }
    }

    /// `probe` is consulted under [`WriteOracle::Auto`]; any error means Excel is unreachable.
    pub fn with_excel(
        mut self,
        excel: Box<dyn ExcelReader>,
        probe: impl Fn() -> Result<(), AdapterError> + 'static,
    ) -> Self {
        self.excel = Some(excel);
        self.excel_probe = Box::new(probe);
        self
    }

    pub fn with_legacy_biff(mut self, reader: Box<dyn ExcelReader>) -> Self {
        self.legacy_biff = Some(reader);
        self
    }

    pub fn library(&self) -> &dyn ExcelReader {
        self.library.as_ref()
    }

    fn excel_available(&self) -> bool {
        match (self.excel_probe)() {
            Ok(()) => true,
            Err(err) => {
                log::debug!("excel oracle unavailable: {err}");
                false
            }
        }
    }
}

impl fmt::Debug for OracleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleSet")
            .field("library", &self.library.name())
            .field("excel", &self.excel.as_ref().map(|e| e.name()))
            .field("legacy_biff", &self.legacy_biff.as_ref().map(|e| e.name()))
            .finish_non_exhaustive()
    }
}

pub fn is_macos(platform: &str) -> bool {
    platform.eq_ignore_ascii_case("macos") || platform.eq_ignore_ascii_case("darwin")
}

pub fn get_write_verifier(oracle: WriteOracle, set: &OracleSet) -> &dyn ExcelReader {
    match (oracle, set.excel.as_deref()) {
        (WriteOracle::Openpyxl, _) => set.library(),
        (WriteOracle::Excel, Some(excel)) => excel,
        (WriteOracle::Excel, None) => {
            log::warn!("excel write oracle requested but not configured; using the library reader");
            set.library()
        }
        (WriteOracle::Auto, Some(excel)) if set.excel_available() => excel,
        (WriteOracle::Auto, _) => set.library(),
    }
}

/// Features whose verification bypasses the configured oracle on matching platforms.
const FEATURE_OVERRIDES: &[(Feature, fn(&str) -> bool)] = &[
    // Excel automation on macOS misreports conditional-format rule types.
    (Feature::ConditionalFormatting, is_macos),
];

pub fn get_write_verifier_for_feature<'a>(
    feature: Feature,
    oracle: WriteOracle,
    set: &'a OracleSet,
    platform: &str,
) -> &'a dyn ExcelReader {
    let overridden = oracle == WriteOracle::Auto
        && FEATURE_OVERRIDES
            .iter()
            .any(|(f, applies)| *f == feature && applies(platform));
    if overridden {
        return set.library();
    }
    get_write_verifier(oracle, set)
}

/// `.xls` output is only readable by the legacy BIFF reader, whatever the configuration says.
pub fn get_write_verifier_for_adapter<'a, A: AdapterMeta + ?Sized>(
    adapter: &A,
    feature: Feature,
    oracle: WriteOracle,
    set: &'a OracleSet,
    platform: &str,
) -> Result<&'a dyn ExcelReader, MissingOracle> {
    if adapter.output_extension().eq_ignore_ascii_case(".xls") {
        return set
            .legacy_biff
            .as_deref()
            .ok_or(MissingOracle("legacy BIFF (.xls)"));
    }
    Ok(get_write_verifier_for_feature(feature, oracle, set, platform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{CalamineAdapter, JsonWorkbookAdapter};
    use crate::model::{Capability, LibraryInfo};
    use pretty_assertions::assert_eq;

    struct Named(&'static str, &'static str);

    impl AdapterMeta for Named {
        fn info(&self) -> LibraryInfo {
            LibraryInfo::new(self.0, "1.0", "rust", [Capability::Write])
        }

        fn output_extension(&self) -> &'static str {
            self.1
        }
    }

    fn library_only() -> OracleSet {
        OracleSet::new(Box::new(JsonWorkbookAdapter::named("openpyxl")))
    }

    fn with_excel(reachable: bool) -> OracleSet {
        library_only().with_excel(Box::new(JsonWorkbookAdapter::named("excel")), move || {
            if reachable {
                Ok(())
            } else {
                Err(AdapterError::Library("no Excel".to_string()))
            }
        })
    }

    #[test]
    fn openpyxl_always_means_the_library_reader() {
        let set = with_excel(true);
        assert_eq!(get_write_verifier(WriteOracle::Openpyxl, &set).name(), "openpyxl");
    }

    #[test]
    fn excel_falls_back_when_not_configured() {
        assert_eq!(
            get_write_verifier(WriteOracle::Excel, &library_only()).name(),
            "openpyxl"
        );
        assert_eq!(get_write_verifier(WriteOracle::Excel, &with_excel(false)).name(), "excel");
    }

    #[test]
    fn auto_depends_on_the_probe() {
        assert_eq!(get_write_verifier(WriteOracle::Auto, &with_excel(true)).name(), "excel");
        assert_eq!(get_write_verifier(WriteOracle::Auto, &with_excel(false)).name(), "openpyxl");
        assert_eq!(get_write_verifier(WriteOracle::Auto, &library_only()).name(), "openpyxl");
    }

    #[test]
    fn conditional_formatting_on_macos_uses_the_library_reader() {
        let set = with_excel(true);
        assert_eq!(
            get_write_verifier_for_feature(
                Feature::ConditionalFormatting,
                WriteOracle::Auto,
                &set,
                "macos"
            )
            .name(),
            "openpyxl"
        );
        assert_eq!(
            get_write_verifier_for_feature(Feature::Images, WriteOracle::Auto, &set, "Darwin")
                .name(),
            "excel"
        );
        assert_eq!(
            get_write_verifier_for_feature(
                Feature::ConditionalFormatting,
                WriteOracle::Auto,
                &set,
                "windows"
            )
            .name(),
            "excel"
        );
    }

    #[test]
    fn xls_output_requires_the_legacy_reader() {
        let xls = Named("xlwt", ".xls");
        let err = get_write_verifier_for_adapter(
            &xls,
            Feature::CellValues,
            WriteOracle::Openpyxl,
            &library_only(),
            "linux",
        )
        .map(|_| ())
        .unwrap_err();
        assert_eq!(err.to_string(), "no legacy BIFF (.xls) verifier is configured");

        let set = library_only().with_legacy_biff(Box::new(CalamineAdapter::new()));
        let verifier =
            get_write_verifier_for_adapter(&xls, Feature::CellValues, WriteOracle::Excel, &set, "linux")
                .unwrap();
        assert_eq!(verifier.name(), "calamine");

        let xlsx = Named("writer", ".xlsx");
        let verifier = get_write_verifier_for_adapter(
            &xlsx,
            Feature::CellValues,
            WriteOracle::Openpyxl,
            &set,
            "linux",
        )
        .unwrap();
        assert_eq!(verifier.name(), "openpyxl");
    }

    #[test]
    fn oracle_names_parse_case_insensitively() {
        assert_eq!("Excel".parse::<WriteOracle>(), Ok(WriteOracle::Excel));
        assert_eq!(WriteOracle::default(), WriteOracle::Auto);
        assert!("libreoffice".parse::<WriteOracle>().is_err());
    }
}
