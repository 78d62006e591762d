use std::collections::HashMap;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::Threshold;
use crate::domain::{CanonicalId, ExpressionStatus, QuerySymbol};
use crate::error::ProbeError;
use crate::matcher::{FeatureMatches, MatchedFeature};
use crate::matrix::CountMatrix;
use crate::quantify::ExpressionStat;

const NA: &str = "NA";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    symbol: String,
    gene_id: Option<CanonicalId>,
    feature: Option<String>,
    stat: Option<ExpressionStat>,
    status: ExpressionStatus,
}

impl ReportRow {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn gene_id(&self) -> Option<&CanonicalId> {
        self.gene_id.as_ref()
    }

    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    pub fn stat(&self) -> Option<&ExpressionStat> {
        self.stat.as_ref()
    }

    pub fn status(&self) -> ExpressionStatus {
        self.status
    }
}

pub struct AssemblyInput<'a> {
    pub symbols: &'a [QuerySymbol],
    /// Keyed by [`QuerySymbol::lookup_key`]; a missing key or `None` means unresolved.
    pub resolutions: &'a HashMap<String, Option<CanonicalId>>,
    pub matches: &'a FeatureMatches,
    pub stats: &'a HashMap<String, ExpressionStat>,
    pub threshold: Threshold,
    pub total_cells: usize,
    pub include_mean: bool,
}

/// One row per input symbol, in input order. A gene whose percentage equals the
/// threshold counts as expressed.
pub fn assemble(input: &AssemblyInput<'_>) -> Vec<ReportRow> {
    input
        .symbols
        .iter()
        .map(|symbol| classify(symbol, input))
        .collect()
}

fn classify(symbol: &QuerySymbol, input: &AssemblyInput<'_>) -> ReportRow {
    let resolved = input
        .resolutions
        .get(symbol.lookup_key())
        .and_then(|id| id.clone());
    let Some(gene_id) = resolved else {
        return ReportRow {
            symbol: symbol.as_str().to_string(),
            gene_id: None,
            feature: None,
            stat: None,
            status: ExpressionStatus::MappingFailed,
        };
    };

    let matched = input
        .matches
        .get(&gene_id)
        .and_then(|hit| Some((hit, input.stats.get(&hit.feature)?)));
    let Some((hit, stat)) = matched else {
        return ReportRow {
            symbol: symbol.as_str().to_string(),
            gene_id: Some(gene_id),
            feature: None,
            stat: Some(ExpressionStat::zero(input.total_cells, input.include_mean)),
            status: ExpressionStatus::NotInDataset,
        };
    };

    let status = if stat.percent_expressed >= input.threshold.percent() {
        ExpressionStatus::Expressed
    } else {
        ExpressionStatus::NotExpressed
    };
    ReportRow {
        symbol: symbol.as_str().to_string(),
        gene_id: Some(gene_id),
        feature: Some(hit.feature.clone()),
        stat: Some(*stat),
        status,
    }
}

pub fn status_counts(rows: &[ReportRow]) -> Vec<(ExpressionStatus, usize)> {
    [
        ExpressionStatus::Expressed,
        ExpressionStatus::NotExpressed,
        ExpressionStatus::NotInDataset,
        ExpressionStatus::MappingFailed,
    ]
    .into_iter()
    .map(|status| (status, rows.iter().filter(|row| row.status == status).count()))
    .collect()
}

pub fn write_report_tsv<W: Write>(
    rows: &[ReportRow],
    include_mean: bool,
    writer: W,
) -> Result<(), ProbeError> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    let mut header = vec![
        "Symbol",
        "GeneID",
        "ExpressedCells",
        "TotalCells",
        "PercentExpressed",
        "Status",
    ];
    if include_mean {
        header.push("MeanExpression");
    }
    out.write_record(&header).map_err(csv_error)?;

    for row in rows {
        let gene_id = row
            .gene_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| NA.to_string());
        let (expressed, total, percent, mean) = match &row.stat {
            Some(stat) => (
                stat.expressed_cells.to_string(),
                stat.total_cells.to_string(),
                format!("{:.2}", stat.percent_expressed),
                stat.mean_expression
                    .map(|mean| format!("{mean:.2}"))
                    .unwrap_or_else(|| NA.to_string()),
            ),
            None => (NA.to_string(), NA.to_string(), NA.to_string(), NA.to_string()),
        };
        let mut record = vec![
            row.symbol.clone(),
            gene_id,
            expressed,
            total,
            percent,
            row.status.to_string(),
        ];
        if include_mean {
            record.push(mean);
        }
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush()
        .map_err(|err| ProbeError::Filesystem(err.to_string()))
}

pub fn write_counts_tsv<W: Write>(
    matrix: &CountMatrix,
    features: &[MatchedFeature],
    writer: W,
) -> Result<(), ProbeError> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    let mut header = vec!["barcode".to_string()];
    header.extend(features.iter().map(|hit| hit.feature.clone()));
    out.write_record(&header).map_err(csv_error)?;

    let columns: Vec<HashMap<usize, u32>> = features
        .iter()
        .map(|hit| matrix.row(hit.index).into_iter().collect())
        .collect();
    for (cell, barcode) in matrix.barcodes().iter().enumerate() {
        let mut record = Vec::with_capacity(features.len() + 1);
        record.push(barcode.clone());
        for column in &columns {
            record.push(column.get(&cell).copied().unwrap_or(0).to_string());
        }
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush()
        .map_err(|err| ProbeError::Filesystem(err.to_string()))
}

pub struct StagedFile {
    temp: NamedTempFile,
    path: Utf8PathBuf,
}

impl StagedFile {
    pub fn commit(self) -> Result<(), ProbeError> {
        let path = self.path;
        self.temp
            .persist(path.as_std_path())
            .map_err(|err| ProbeError::Filesystem(format!("write {path}: {}", err.error)))?;
        Ok(())
    }
}

/// Writes the content for `path` into a temporary file in the same directory. Dropping
/// the result without committing removes the temporary file.
pub fn stage_output<F>(path: &Utf8Path, write: F) -> Result<StagedFile, ProbeError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), ProbeError>,
{
    if path.is_dir() {
        return Err(ProbeError::Filesystem(format!(
            "write {path}: destination is a directory"
        )));
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| ProbeError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = NamedTempFile::new_in(parent.as_std_path())
        .map_err(|err| ProbeError::Filesystem(err.to_string()))?;
    write(&mut temp)?;
    Ok(StagedFile {
        temp,
        path: path.to_path_buf(),
    })
}

pub fn commit_all(staged: Vec<StagedFile>) -> Result<(), ProbeError> {
    staged.into_iter().try_for_each(StagedFile::commit)
}

fn csv_error(err: csv::Error) -> ProbeError {
    ProbeError::Filesystem(err.to_string())
}
