use std::collections::HashMap;

use serde::Serialize;

use crate::config::MinCount;
use crate::matrix::CountMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpressionStat {
    pub expressed_cells: usize,
    pub total_cells: usize,
    pub percent_expressed: f64,
    /// Mean count over expressed cells; 0 when no cell qualifies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_expression: Option<f64>,
}

impl ExpressionStat {
    pub fn zero(total_cells: usize, include_mean: bool) -> Self {
        Self {
            expressed_cells: 0,
            total_cells,
            percent_expressed: 0.0,
            mean_expression: include_mean.then_some(0.0),
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn quantify_row(
    matrix: &CountMatrix,
    index: usize,
    min_count: MinCount,
    include_mean: bool,
) -> ExpressionStat {
    let total_cells = matrix.n_cells();
    let threshold = min_count.get();

    let (expressed_cells, sum) = matrix
        .row(index)
        .into_iter()
        .filter(|&(_, value)| value >= threshold)
        .fold((0usize, 0u64), |(cells, sum), (_, value)| {
            (cells + 1, sum + u64::from(value))
        });

    let percent_expressed = if total_cells == 0 {
        0.0
    } else {
        round2(100.0 * expressed_cells as f64 / total_cells as f64)
    };
    let mean_expression = include_mean.then(|| {
        if expressed_cells == 0 {
            0.0
        } else {
            sum as f64 / expressed_cells as f64
        }
    });

    ExpressionStat {
        expressed_cells,
        total_cells,
        percent_expressed,
        mean_expression,
    }
}

/// Computes statistics for each named feature. Names that are not in the matrix are
/// left out of the result; for repeated names the first row wins.
pub fn quantify<'a, I>(
    matrix: &CountMatrix,
    features: I,
    min_count: MinCount,
    include_mean: bool,
) -> HashMap<String, ExpressionStat>
where
    I: IntoIterator<Item = &'a str>,
{
    features
        .into_iter()
        .filter_map(|name| {
            let index = matrix.feature_index(name)?;
            Some((
                name.to_string(),
                quantify_row(matrix, index, min_count, include_mean),
            ))
        })
        .collect()
}
