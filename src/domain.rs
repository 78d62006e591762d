use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Drops everything from the first `.` on, so `AT5G11260.1` becomes `AT5G11260`.
pub fn strip_version(value: &str) -> &str {
    match value.split_once('.') {
        Some((head, _)) => head,
        None => value,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySymbol {
    raw: String,
}

impl QuerySymbol {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn lookup_key(&self) -> &str {
        strip_version(&self.raw)
    }
}

impl fmt::Display for QuerySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for QuerySymbol {
    type Err = ProbeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !strip_version(trimmed).is_empty()
            && !trimmed.chars().any(|ch| ch.is_whitespace() || ch == ',');
        if !is_valid {
            return Err(ProbeError::InvalidSymbol(value.to_string()));
        }
        Ok(Self {
            raw: trimmed.to_string(),
        })
    }
}

pub fn parse_symbol_list(value: &str) -> Result<Vec<QuerySymbol>, ProbeError> {
    let symbols = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<QuerySymbol>, ProbeError>>()?;
    if symbols.is_empty() {
        return Err(ProbeError::EmptySymbolList);
    }
    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn new(value: &str) -> Option<Self> {
        let stripped = strip_version(value.trim());
        if stripped.is_empty() {
            return None;
        }
        Some(Self(stripped.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct XrefDatabase(String);

impl XrefDatabase {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn field_name(&self) -> String {
        format!("xref_{}", self.0.to_lowercase())
    }
}

impl Default for XrefDatabase {
    fn default() -> Self {
        Self("EnsemblPlants".to_string())
    }
}

impl fmt::Display for XrefDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for XrefDatabase {
    type Err = ProbeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(ProbeError::InvalidXrefDatabase(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for XrefDatabase {
    type Error = ProbeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<XrefDatabase> for String {
    fn from(value: XrefDatabase) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeatureColumn {
    #[default]
    Id,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpressionStatus {
    MappingFailed,
    NotInDataset,
    Expressed,
    NotExpressed,
}

impl ExpressionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionStatus::MappingFailed => "MAPPING_FAILED",
            ExpressionStatus::NotInDataset => "NOT_IN_DATASET",
            ExpressionStatus::Expressed => "EXPRESSED",
            ExpressionStatus::NotExpressed => "NOT_EXPRESSED",
        }
    }
}

impl fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoKind {
    Series,
    Sample,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GeoAccession {
    value: String,
    kind: GeoKind,
}

impl GeoAccession {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> GeoKind {
        self.kind
    }

    pub fn digits(&self) -> &str {
        &self.value[3..]
    }
}

impl fmt::Display for GeoAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for GeoAccession {
    type Err = ProbeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let pattern = Regex::new(r"^(GSM|GSE)\d+$")
            .map_err(|err| ProbeError::InvalidGeoAccession(err.to_string()))?;
        if !pattern.is_match(&normalized) {
            return Err(ProbeError::InvalidGeoAccession(value.to_string()));
        }
        let kind = if normalized.starts_with("GSE") {
            GeoKind::Series
        } else {
            GeoKind::Sample
        };
        Ok(Self {
            value: normalized,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn strip_version_is_idempotent() {
        for value in ["AT5G11260.1", "Solyc01g000001.2.1", "HY5", "", ".1", "a.b.c"] {
            let once = strip_version(value);
            assert_eq!(strip_version(once), once);
        }
    }

    #[test]
    fn strip_version_keeps_unversioned() {
        assert_eq!(strip_version("HY5"), "HY5");
        assert_eq!(strip_version("HY5.1"), "HY5");
        assert_eq!(strip_version("Solyc01g000001.2.1"), "Solyc01g000001");
    }

    #[test]
    fn symbol_lookup_key_drops_version() {
        let symbol: QuerySymbol = "HY5.1".parse().unwrap();
        assert_eq!(symbol.as_str(), "HY5.1");
        assert_eq!(symbol.lookup_key(), "HY5");
    }

    #[test]
    fn symbol_is_case_sensitive() {
        let symbol: QuerySymbol = "hy5".parse().unwrap();
        assert_eq!(symbol.as_str(), "hy5");
    }

    #[test]
    fn symbol_rejects_version_only() {
        let err = ".1".parse::<QuerySymbol>().unwrap_err();
        assert_matches!(err, ProbeError::InvalidSymbol(_));
    }

    #[test]
    fn xref_field_name() {
        assert_eq!(XrefDatabase::default().field_name(), "xref_ensemblplants");
    }

    #[test]
    fn canonical_id_strips_version() {
        let id = CanonicalId::new("AT5G11260.1").unwrap();
        assert_eq!(id.as_str(), "AT5G11260");
        assert!(CanonicalId::new(".1").is_none());
    }
}
