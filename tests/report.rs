mod common;

use std::collections::HashMap;

use expression_probe::config::{MinCount, Threshold};
use expression_probe::domain::{CanonicalId, ExpressionStatus, FeatureColumn, QuerySymbol};
use expression_probe::matcher::match_features;
use expression_probe::matrix::load_tenx_dir;
use expression_probe::quantify::{ExpressionStat, quantify};
use expression_probe::report::{
    AssemblyInput, assemble, status_counts, write_counts_tsv, write_report_tsv,
};

use common::{barcodes, write_dataset};

fn symbols(values: &[&str]) -> Vec<QuerySymbol> {
    values.iter().map(|v| v.parse().unwrap()).collect()
}

fn stat(expressed: usize, total: usize, percent: f64) -> ExpressionStat {
    ExpressionStat {
        expressed_cells: expressed,
        total_cells: total,
        percent_expressed: percent,
        mean_expression: None,
    }
}

#[test]
fn classifies_every_symbol_in_input_order() {
    let symbols = symbols(&["HY5", "FAKE123", "COP1", "PIF4", "HY5.2"]);
    let resolutions: HashMap<String, Option<CanonicalId>> = [
        ("HY5", CanonicalId::new("Solyc01g000001")),
        ("FAKE123", None),
        ("COP1", CanonicalId::new("Solyc02g000002")),
        ("PIF4", CanonicalId::new("Solyc03g000003")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    let features = vec![
        "Solyc01g000001.2".to_string(),
        "Solyc03g000003.1".to_string(),
    ];
    let ids: Vec<CanonicalId> = resolutions.values().flatten().cloned().collect();
    let matches = match_features(&ids, &features);
    let stats: HashMap<String, ExpressionStat> = [
        ("Solyc01g000001.2".to_string(), stat(30, 100, 30.0)),
        ("Solyc03g000003.1".to_string(), stat(2, 100, 2.0)),
    ]
    .into_iter()
    .collect();

    let rows = assemble(&AssemblyInput {
        symbols: &symbols,
        resolutions: &resolutions,
        matches: &matches,
        stats: &stats,
        threshold: Threshold::new(10.0).unwrap(),
        total_cells: 100,
        include_mean: false,
    });

    let got: Vec<(&str, ExpressionStatus)> =
        rows.iter().map(|row| (row.symbol(), row.status())).collect();
    assert_eq!(
        got,
        vec![
            ("HY5", ExpressionStatus::Expressed),
            ("FAKE123", ExpressionStatus::MappingFailed),
            ("COP1", ExpressionStatus::NotInDataset),
            ("PIF4", ExpressionStatus::NotExpressed),
            ("HY5.2", ExpressionStatus::Expressed),
        ]
    );

    assert!(rows[1].gene_id().is_none());
    assert!(rows[1].stat().is_none());

    let missing = rows[2].stat().unwrap();
    assert_eq!(missing.expressed_cells, 0);
    assert_eq!(missing.total_cells, 100);
    assert_eq!(missing.percent_expressed, 0.0);
    assert_eq!(rows[2].gene_id().unwrap().as_str(), "Solyc02g000002");

    assert_eq!(rows[0].feature(), Some("Solyc01g000001.2"));
}

#[test]
fn threshold_boundary_is_inclusive() {
    let symbols = symbols(&["HY5"]);
    let resolutions: HashMap<String, Option<CanonicalId>> =
        [("HY5".to_string(), CanonicalId::new("G1"))].into_iter().collect();
    let features = vec!["G1.1".to_string()];
    let matches = match_features(&[CanonicalId::new("G1").unwrap()], &features);
    let stats: HashMap<String, ExpressionStat> =
        [("G1.1".to_string(), stat(10, 100, 10.0))].into_iter().collect();

    let rows = assemble(&AssemblyInput {
        symbols: &symbols,
        resolutions: &resolutions,
        matches: &matches,
        stats: &stats,
        threshold: Threshold::new(10.0).unwrap(),
        total_cells: 100,
        include_mean: false,
    });
    assert_eq!(rows[0].status(), ExpressionStatus::Expressed);

    let rows = assemble(&AssemblyInput {
        symbols: &symbols,
        resolutions: &resolutions,
        matches: &matches,
        stats: &stats,
        threshold: Threshold::new(10.01).unwrap(),
        total_cells: 100,
        include_mean: false,
    });
    assert_eq!(rows[0].status(), ExpressionStatus::NotExpressed);
}

#[test]
fn status_counts_cover_all_rows() {
    let symbols = symbols(&["A", "B", "C"]);
    let resolutions: HashMap<String, Option<CanonicalId>> = HashMap::new();
    let matches = match_features(std::iter::empty(), &[]);
    let rows = assemble(&AssemblyInput {
        symbols: &symbols,
        resolutions: &resolutions,
        matches: &matches,
        stats: &HashMap::new(),
        threshold: Threshold::default(),
        total_cells: 5,
        include_mean: false,
    });
    let counts = status_counts(&rows);
    assert_eq!(counts.iter().map(|(_, n)| n).sum::<usize>(), 3);
    assert!(counts.contains(&(ExpressionStatus::MappingFailed, 3)));
}

#[test]
fn report_tsv_layout() {
    let symbols = symbols(&["HY5", "FAKE123"]);
    let resolutions: HashMap<String, Option<CanonicalId>> = [
        ("HY5".to_string(), CanonicalId::new("G1")),
        ("FAKE123".to_string(), None),
    ]
    .into_iter()
    .collect();
    let features = vec!["G1.1".to_string()];
    let matches = match_features(&[CanonicalId::new("G1").unwrap()], &features);
    let mut expressed = stat(1, 3, 33.33);
    expressed.mean_expression = Some(4.0);
    let stats: HashMap<String, ExpressionStat> =
        [("G1.1".to_string(), expressed)].into_iter().collect();
    let rows = assemble(&AssemblyInput {
        symbols: &symbols,
        resolutions: &resolutions,
        matches: &matches,
        stats: &stats,
        threshold: Threshold::default(),
        total_cells: 3,
        include_mean: true,
    });

    let mut buffer = Vec::new();
    write_report_tsv(&rows, true, &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "Symbol\tGeneID\tExpressedCells\tTotalCells\tPercentExpressed\tStatus\tMeanExpression"
    );
    assert_eq!(lines[1], "HY5\tG1\t1\t3\t33.33\tEXPRESSED\t4.00");
    assert_eq!(lines[2], "FAKE123\tNA\tNA\tNA\tNA\tMAPPING_FAILED\tNA");
}

#[test]
fn counts_tsv_has_one_row_per_barcode() {
    let temp = tempfile::tempdir().unwrap();
    write_dataset(
        temp.path(),
        &["G1.1", "G2.1"],
        &barcodes(3),
        &[(0, 0, 2), (1, 2, 5)],
        false,
    );
    let matrix = load_tenx_dir(temp.path(), FeatureColumn::Id).unwrap();
    let ids = [CanonicalId::new("G2").unwrap(), CanonicalId::new("G1").unwrap()];
    let matches = match_features(&ids, matrix.features());
    let stats = quantify(
        &matrix,
        matches.matched().iter().map(|m| m.feature.as_str()),
        MinCount::default(),
        false,
    );
    assert_eq!(stats.len(), 2);

    let mut buffer = Vec::new();
    write_counts_tsv(&matrix, matches.matched(), &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert_eq!(
        text,
        "barcode\tG2.1\tG1.1\nCELL0000-1\t0\t2\nCELL0001-1\t0\t0\nCELL0002-1\t5\t0\n"
    );
}
