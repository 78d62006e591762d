#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

/// `(feature, cell, count)` with zero-based indices.
pub type Entry = (usize, usize, u32);

pub fn barcodes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("CELL{i:04}-1")).collect()
}

/// Writes a 10x-style dataset directory. Feature ids double as names with a `_sym`
/// suffix in the second column.
pub fn write_dataset(dir: &Path, features: &[&str], cells: &[String], entries: &[Entry], gz: bool) {
    std::fs::create_dir_all(dir).unwrap();

    let mut feature_text = String::new();
    for id in features {
        feature_text.push_str(&format!("{id}\t{id}_sym\tGene Expression\n"));
    }
    let mut barcode_text = String::new();
    for cell in cells {
        barcode_text.push_str(cell);
        barcode_text.push('\n');
    }
    let mut matrix_text = String::from("%%MatrixMarket matrix coordinate integer general\n");
    matrix_text.push_str("%metadata_json: {\"software_version\": \"test\"}\n");
    matrix_text.push_str(&format!("{} {} {}\n", features.len(), cells.len(), entries.len()));
    for (feature, cell, value) in entries {
        matrix_text.push_str(&format!("{} {} {}\n", feature + 1, cell + 1, value));
    }

    write_file(dir, "features.tsv", &feature_text, gz);
    write_file(dir, "barcodes.tsv", &barcode_text, gz);
    write_file(dir, "matrix.mtx", &matrix_text, gz);
}

fn write_file(dir: &Path, name: &str, content: &str, gz: bool) {
    if gz {
        let file = File::create(dir.join(format!("{name}.gz"))).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    } else {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

/// `count` for the first `n` cells of `feature`.
pub fn first_cells(feature: usize, n: usize, count: u32) -> Vec<Entry> {
    (0..n).map(|cell| (feature, cell, count)).collect()
}
