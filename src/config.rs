use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{FeatureColumn, QuerySymbol, XrefDatabase, parse_symbol_list};
use crate::error::ProbeError;

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 10.0;
pub const DEFAULT_MIN_COUNT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(percent: f64) -> Result<Self, ProbeError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ProbeError::InvalidThreshold(percent));
        }
        Ok(Self(percent))
    }

    pub fn percent(&self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_PERCENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MinCount(u32);

impl MinCount {
    pub fn new(value: i64) -> Result<Self, ProbeError> {
        if value < 1 || value > i64::from(u32::MAX) {
            return Err(ProbeError::InvalidMinCount(value));
        }
        Ok(Self(value as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for MinCount {
    fn default() -> Self {
        Self(DEFAULT_MIN_COUNT)
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub symbols: Option<SymbolsEntry>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub min_count: Option<i64>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub counts_output: Option<String>,
    #[serde(default)]
    pub include_mean: Option<bool>,
    #[serde(default)]
    pub xref_database: Option<String>,
    #[serde(default)]
    pub feature_column: Option<FeatureColumn>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SymbolsEntry {
    Shorthand(String),
    List(Vec<String>),
}

impl SymbolsEntry {
    fn joined(&self) -> String {
        match self {
            SymbolsEntry::Shorthand(value) => value.clone(),
            SymbolsEntry::List(values) => values.join(","),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CliSettings {
    pub dataset: Option<String>,
    pub symbols: Option<String>,
    pub threshold: Option<f64>,
    pub min_count: Option<i64>,
    pub output: Option<String>,
    pub counts_output: Option<String>,
    pub include_mean: bool,
    pub xref_database: Option<String>,
    pub feature_column: Option<FeatureColumn>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dataset_dir: Utf8PathBuf,
    pub symbols: Vec<QuerySymbol>,
    pub threshold: Threshold,
    pub min_count: MinCount,
    pub report_path: Option<Utf8PathBuf>,
    pub counts_path: Option<Utf8PathBuf>,
    pub include_mean: bool,
    pub xref_database: XrefDatabase,
    pub feature_column: FeatureColumn,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn read(path: &Path) -> Result<ConfigFile, ProbeError> {
        let content =
            fs::read_to_string(path).map_err(|_| ProbeError::ConfigRead(PathBuf::from(path)))?;
        serde_json::from_str(&content).map_err(|err| ProbeError::ConfigParse(err.to_string()))
    }

    pub fn resolve(cli: CliSettings, file: Option<ConfigFile>) -> Result<RunOptions, ProbeError> {
        let file = file.unwrap_or_default();

        let symbols = cli
            .symbols
            .or_else(|| file.symbols.as_ref().map(SymbolsEntry::joined))
            .ok_or(ProbeError::EmptySymbolList)?;
        let symbols = parse_symbol_list(&symbols)?;

        let threshold = match cli.threshold.or(file.threshold) {
            Some(value) => Threshold::new(value)?,
            None => Threshold::default(),
        };
        let min_count = match cli.min_count.or(file.min_count) {
            Some(value) => MinCount::new(value)?,
            None => MinCount::default(),
        };
        let xref_database = match cli.xref_database.or(file.xref_database) {
            Some(value) => value.parse()?,
            None => XrefDatabase::default(),
        };

        let dataset_dir = cli
            .dataset
            .or(file.dataset)
            .map(Utf8PathBuf::from)
            .ok_or(ProbeError::MissingDatasetPath)?;

        Ok(RunOptions {
            dataset_dir,
            symbols,
            threshold,
            min_count,
            report_path: cli.output.or(file.output).map(Utf8PathBuf::from),
            counts_path: cli.counts_output.or(file.counts_output).map(Utf8PathBuf::from),
            include_mean: cli.include_mean || file.include_mean.unwrap_or(false),
            xref_database,
            feature_column: cli
                .feature_column
                .or(file.feature_column)
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn settings(symbols: &str) -> CliSettings {
        CliSettings {
            dataset: Some("data/GSM1".to_string()),
            symbols: Some(symbols.to_string()),
            ..CliSettings::default()
        }
    }

    #[test]
    fn defaults_apply() {
        let options = ConfigLoader::resolve(settings("HY5,COP1"), None).unwrap();
        assert_eq!(options.threshold.percent(), 10.0);
        assert_eq!(options.min_count.get(), 1);
        assert_eq!(options.symbols.len(), 2);
        assert!(options.report_path.is_none());
        assert_eq!(options.feature_column, FeatureColumn::Id);
    }

    #[test]
    fn zero_min_count_is_rejected() {
        let mut cli = settings("HY5");
        cli.min_count = Some(0);
        let err = ConfigLoader::resolve(cli, None).unwrap_err();
        assert_matches!(err, ProbeError::InvalidMinCount(0));
    }

    #[test]
    fn threshold_bounds_are_inclusive() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(100.0).is_ok());
        assert_matches!(
            Threshold::new(100.5).unwrap_err(),
            ProbeError::InvalidThreshold(_)
        );
        assert!(Threshold::new(f64::NAN).is_err());
    }
}
