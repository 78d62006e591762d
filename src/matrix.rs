use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use sprs::{CsMat, TriMat};
use tracing::{debug, info};

use crate::domain::FeatureColumn;
use crate::error::ProbeError;

const MATRIX_FILES: &[&str] = &["matrix.mtx.gz", "matrix.mtx"];
const FEATURE_FILES: &[&str] = &[
    "features.tsv.gz",
    "features.tsv",
    "genes.tsv.gz",
    "genes.tsv",
];
const BARCODE_FILES: &[&str] = &["barcodes.tsv.gz", "barcodes.tsv"];

#[derive(Debug, Clone)]
pub struct CountMatrix {
    features: Vec<String>,
    barcodes: Vec<String>,
    counts: CsMat<u32>,
}

impl CountMatrix {
    pub fn new(
        counts: CsMat<u32>,
        features: Vec<String>,
        barcodes: Vec<String>,
    ) -> Result<Self, ProbeError> {
        if counts.rows() != features.len() || counts.cols() != barcodes.len() {
            return Err(ProbeError::ShapeMismatch(format!(
                "matrix is {}x{} but there are {} features and {} barcodes",
                counts.rows(),
                counts.cols(),
                features.len(),
                barcodes.len()
            )));
        }
        let counts = if counts.is_csr() {
            counts
        } else {
            counts.to_csr()
        };
        Ok(Self {
            features,
            barcodes,
            counts,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn barcodes(&self) -> &[String] {
        &self.barcodes
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn n_cells(&self) -> usize {
        self.barcodes.len()
    }

    pub fn nnz(&self) -> usize {
        self.counts.nnz()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|feature| feature == name)
    }

    pub fn row(&self, index: usize) -> Vec<(usize, u32)> {
        self.counts
            .outer_view(index)
            .map(|view| view.iter().map(|(cell, value)| (cell, *value)).collect())
            .unwrap_or_default()
    }

    pub fn value(&self, feature: usize, cell: usize) -> u32 {
        self.counts.get(feature, cell).copied().unwrap_or(0)
    }
}

pub fn load_tenx_dir(dir: &Path, column: FeatureColumn) -> Result<CountMatrix, ProbeError> {
    if !dir.is_dir() {
        return Err(ProbeError::DatasetNotFound(dir.to_path_buf()));
    }
    let matrix_path = find_component(dir, MATRIX_FILES, "matrix")?;
    let features_path = find_component(dir, FEATURE_FILES, "features")?;
    let barcodes_path = find_component(dir, BARCODE_FILES, "barcodes")?;
    debug!(
        matrix = %matrix_path.display(),
        features = %features_path.display(),
        barcodes = %barcodes_path.display(),
        "dataset components located"
    );

    let features = read_features(&features_path, column)?;
    let barcodes = read_column(&barcodes_path, 0)?;
    if barcodes.is_empty() {
        return Err(ProbeError::EmptyDataset(dir.to_path_buf()));
    }

    let triplets = read_matrix_market(&matrix_path)?;
    let (rows, cols) = triplets.shape();
    if rows != features.len() || cols != barcodes.len() {
        return Err(malformed(
            &matrix_path,
            format!(
                "matrix is {rows}x{cols} but there are {} features and {} barcodes",
                features.len(),
                barcodes.len()
            ),
        ));
    }
    let matrix = CountMatrix::new(triplets.to_csr(), features, barcodes)?;
    info!(
        features = matrix.n_features(),
        cells = matrix.n_cells(),
        nnz = matrix.nnz(),
        "dataset loaded"
    );
    Ok(matrix)
}

fn find_component(
    dir: &Path,
    candidates: &[&str],
    kind: &'static str,
) -> Result<PathBuf, ProbeError> {
    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ProbeError::MissingDatasetFile {
            dir: dir.to_path_buf(),
            kind,
        })
}

fn open_text(path: &Path) -> Result<Box<dyn BufRead>, ProbeError> {
    let file = File::open(path)
        .map_err(|err| ProbeError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, ProbeError> {
    open_text(path)?
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| malformed(path, err.to_string()))
}

fn read_column(path: &Path, index: usize) -> Result<Vec<String>, ProbeError> {
    read_lines(path)?
        .iter()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(number, line)| {
            line.split('\t')
                .nth(index)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| malformed(path, format!("line {} has no column {}", number + 1, index + 1)))
        })
        .collect()
}

fn read_features(path: &Path, column: FeatureColumn) -> Result<Vec<String>, ProbeError> {
    match column {
        FeatureColumn::Id => read_column(path, 0),
        FeatureColumn::Name => Ok(read_lines(path)?
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut fields = line.split('\t').map(str::trim);
                let id = fields.next().unwrap_or_default();
                match fields.next() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => id.to_string(),
                }
            })
            .collect()),
    }
}

/// Parses a coordinate-format MatrixMarket file of non-negative integral counts.
/// Duplicate coordinates are summed; a sum that overflows `u32` is malformed input.
pub fn read_matrix_market(path: &Path) -> Result<TriMat<u32>, ProbeError> {
    let reader = open_text(path)?;
    let mut lines = reader.lines();

    let header = lines
        .next()
        .transpose()
        .map_err(|err| malformed(path, err.to_string()))?
        .ok_or_else(|| malformed(path, "file is empty".to_string()))?;
    parse_header(&header).map_err(|message| malformed(path, message))?;

    let mut shape: Option<(usize, usize, usize)> = None;
    let mut entries: BTreeMap<(usize, usize), u32> = BTreeMap::new();
    let mut seen = 0usize;

    for (offset, line) in lines.enumerate() {
        let line = line.map_err(|err| malformed(path, err.to_string()))?;
        let line_no = offset + 2;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        let Some((rows, cols, _)) = shape else {
            let &[rows, cols, nnz] = fields.as_slice() else {
                return Err(malformed(path, format!("line {line_no}: expected size line")));
            };
            let parsed = (
                parse_usize(rows, line_no).map_err(|m| malformed(path, m))?,
                parse_usize(cols, line_no).map_err(|m| malformed(path, m))?,
                parse_usize(nnz, line_no).map_err(|m| malformed(path, m))?,
            );
            shape = Some(parsed);
            continue;
        };

        let &[row, col, value] = fields.as_slice() else {
            return Err(malformed(path, format!("line {line_no}: expected `row col value`")));
        };
        let row = parse_usize(row, line_no).map_err(|m| malformed(path, m))?;
        let col = parse_usize(col, line_no).map_err(|m| malformed(path, m))?;
        if row == 0 || row > rows || col == 0 || col > cols {
            return Err(malformed(
                path,
                format!("line {line_no}: entry ({row}, {col}) outside {rows}x{cols}"),
            ));
        }
        let value = parse_count(value, line_no).map_err(|m| malformed(path, m))?;
        let slot = entries.entry((row - 1, col - 1)).or_insert(0);
        *slot = slot.checked_add(value).ok_or_else(|| {
            malformed(
                path,
                format!("line {line_no}: summed count at ({row}, {col}) overflows"),
            )
        })?;
        seen += 1;
    }

    let Some((rows, cols, nnz)) = shape else {
        return Err(malformed(path, "missing size line".to_string()));
    };
    if seen != nnz {
        return Err(malformed(
            path,
            format!("size line declares {nnz} entries but {seen} were found"),
        ));
    }

    let mut triplets = TriMat::with_capacity((rows, cols), entries.len());
    for ((row, col), value) in entries {
        triplets.add_triplet(row, col, value);
    }
    Ok(triplets)
}

fn parse_header(header: &str) -> Result<(), String> {
    let tokens: Vec<String> = header
        .split_whitespace()
        .map(|token| token.to_ascii_lowercase())
        .collect();
    match tokens.as_slice() {
        [banner, object, format, field, symmetry]
            if banner == "%%matrixmarket"
                && object == "matrix"
                && format == "coordinate"
                && (field == "integer" || field == "real")
                && symmetry == "general" =>
        {
            Ok(())
        }
        _ => Err(format!("unsupported MatrixMarket header: {header}")),
    }
}

fn parse_usize(value: &str, line_no: usize) -> Result<usize, String> {
    value
        .parse()
        .map_err(|_| format!("line {line_no}: {value:?} is not a non-negative integer"))
}

fn parse_count(value: &str, line_no: usize) -> Result<u32, String> {
    if let Ok(count) = value.parse::<u32>() {
        return Ok(count);
    }
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("line {line_no}: {value:?} is not a number"))?;
    if parsed < 0.0 || parsed.fract() != 0.0 || parsed > f64::from(u32::MAX) {
        return Err(format!("line {line_no}: {value:?} is not a count"));
    }
    Ok(parsed as u32)
}

fn malformed(path: &Path, message: String) -> ProbeError {
    ProbeError::MalformedDataset {
        path: path.to_path_buf(),
        message,
    }
}
