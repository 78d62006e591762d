use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ProbeError {
    #[error("invalid gene symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("no gene symbols given")]
    #[diagnostic(help("pass a comma-separated list, e.g. --symbols HY5,COP1"))]
    EmptySymbolList,

    #[error("expression threshold must be a percentage in [0, 100], got {0}")]
    InvalidThreshold(f64),

    #[error("minimum count must be a positive integer, got {0}")]
    InvalidMinCount(i64),

    #[error("invalid GEO accession: {0}")]
    #[diagnostic(help("expected something like GSM6529487 or GSE123456"))]
    InvalidGeoAccession(String),

    #[error("invalid cross-reference database name: {0:?}")]
    InvalidXrefDatabase(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no dataset directory given")]
    #[diagnostic(help("pass --dataset <DIR> or set \"dataset\" in the config file"))]
    MissingDatasetPath,

    #[error("dataset directory not found: {0}")]
    DatasetNotFound(PathBuf),

    #[error("dataset directory {dir} has no {kind} file")]
    MissingDatasetFile { dir: PathBuf, kind: &'static str },

    #[error("malformed dataset file {path}: {message}")]
    MalformedDataset { path: PathBuf, message: String },

    #[error("count matrix shape does not match its labels: {0}")]
    ShapeMismatch(String),

    #[error("dataset at {0} contains no cells")]
    EmptyDataset(PathBuf),

    #[error("uniprot request failed: {0}")]
    UniprotHttp(String),

    #[error("uniprot returned status {status}: {message}")]
    UniprotStatus { status: u16, message: String },

    #[error("none of the {0} queried symbols could be mapped to a gene identifier")]
    NoSymbolResolved(usize),

    #[error("GEO request failed: {0}")]
    GeoHttp(String),

    #[error("GEO returned status {status}: {message}")]
    GeoStatus { status: u16, message: String },

    #[error("no 10x matrix files found for {0}")]
    GeoFilesNotFound(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
