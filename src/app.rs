use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunOptions;
use crate::domain::{CanonicalId, ExpressionStatus, QuerySymbol};
use crate::error::ProbeError;
use crate::matcher::match_features;
use crate::matrix::{CountMatrix, load_tenx_dir};
use crate::quantify::quantify;
use crate::report::{
    AssemblyInput, ReportRow, assemble, commit_all, stage_output, status_counts,
    write_counts_tsv, write_report_tsv,
};
use crate::uniprot::IdentifierResolver;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub path: String,
    pub features: usize,
    pub cells: usize,
    pub nonzero_entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub generated_at: String,
    pub dataset: DatasetSummary,
    pub threshold_percent: f64,
    pub min_count: u32,
    pub rows: Vec<ReportRow>,
    pub summary: Vec<StatusCount>,
    pub report_path: Option<String>,
    pub counts_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: ExpressionStatus,
    pub rows: usize,
}

pub struct App<R: IdentifierResolver> {
    resolver: R,
}

impl<R: IdentifierResolver> App<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Runs resolve, load, match, quantify and assemble in that order, then writes the
    /// requested output files. Nothing is written when a stage fails.
    pub fn run(
        &self,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PipelineResult, ProbeError> {
        let started = Instant::now();

        let resolutions = self.resolve_all(&options.symbols, sink)?;

        sink.event(ProgressEvent {
            message: format!("phase=Load; reading {}", options.dataset_dir),
            elapsed: Some(started.elapsed()),
        });
        let matrix = load_tenx_dir(options.dataset_dir.as_std_path(), options.feature_column)?;

        let ids = options
            .symbols
            .iter()
            .filter_map(|symbol| resolutions.get(symbol.lookup_key()).cloned().flatten())
            .collect::<Vec<CanonicalId>>();
        sink.event(ProgressEvent {
            message: format!(
                "phase=Match; {} identifiers against {} features",
                ids.len(),
                matrix.n_features()
            ),
            elapsed: Some(started.elapsed()),
        });
        let matches = match_features(&ids, matrix.features());
        for id in matches.unmatched() {
            warn!(gene_id = %id, "identifier not found in dataset");
        }

        sink.event(ProgressEvent {
            message: format!(
                "phase=Quantify; {} features, min count {}",
                matches.matched().len(),
                options.min_count.get()
            ),
            elapsed: Some(started.elapsed()),
        });
        let stats = quantify(
            &matrix,
            matches.matched().iter().map(|hit| hit.feature.as_str()),
            options.min_count,
            options.include_mean,
        );

        let rows = assemble(&AssemblyInput {
            symbols: &options.symbols,
            resolutions: &resolutions,
            matches: &matches,
            stats: &stats,
            threshold: options.threshold,
            total_cells: matrix.n_cells(),
            include_mean: options.include_mean,
        });

        let summary = status_counts(&rows)
            .into_iter()
            .map(|(status, rows)| StatusCount { status, rows })
            .collect::<Vec<_>>();
        for entry in &summary {
            info!(status = %entry.status, rows = entry.rows, "report summary");
        }

        // Both outputs are staged before either is committed; the report commits last.
        let mut staged = Vec::new();
        if let Some(path) = &options.counts_path {
            sink.event(ProgressEvent {
                message: format!("phase=Write; counts {path}"),
                elapsed: Some(started.elapsed()),
            });
            staged.push(stage_output(path, |file| {
                write_counts_tsv(&matrix, matches.matched(), file)
            })?);
        }
        if let Some(path) = &options.report_path {
            sink.event(ProgressEvent {
                message: format!("phase=Write; report {path}"),
                elapsed: Some(started.elapsed()),
            });
            staged.push(stage_output(path, |file| {
                write_report_tsv(&rows, options.include_mean, file)
            })?);
        }
        commit_all(staged)?;

        Ok(PipelineResult {
            generated_at: chrono::Utc::now().to_rfc3339(),
            dataset: dataset_summary(options, &matrix),
            threshold_percent: options.threshold.percent(),
            min_count: options.min_count.get(),
            rows,
            summary,
            report_path: options.report_path.as_ref().map(|path| path.to_string()),
            counts_path: options.counts_path.as_ref().map(|path| path.to_string()),
        })
    }

    pub fn resolve_all(
        &self,
        symbols: &[QuerySymbol],
        sink: &dyn ProgressSink,
    ) -> Result<HashMap<String, Option<CanonicalId>>, ProbeError> {
        let mut resolutions = HashMap::new();
        for symbol in symbols {
            let key = symbol.lookup_key();
            if resolutions.contains_key(key) {
                continue;
            }
            sink.event(ProgressEvent {
                message: format!("phase=Resolve; {key}"),
                elapsed: None,
            });
            let resolved = self.resolver.resolve(key);
            if resolved.is_none() {
                warn!(symbol = %symbol, "symbol could not be mapped");
            }
            resolutions.insert(key.to_string(), resolved);
        }

        if resolutions.values().all(Option::is_none) {
            return Err(ProbeError::NoSymbolResolved(resolutions.len()));
        }
        Ok(resolutions)
    }
}

fn dataset_summary(options: &RunOptions, matrix: &CountMatrix) -> DatasetSummary {
    DatasetSummary {
        path: options.dataset_dir.to_string(),
        features: matrix.n_features(),
        cells: matrix.n_cells(),
        nonzero_entries: matrix.nnz(),
    }
}
