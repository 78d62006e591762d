//! Maps gene symbols to EnsemblPlants identifiers through UniProt and reports how
//! widely each gene is expressed in a 10x single-cell count matrix.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod geo;
pub mod matcher;
pub mod matrix;
pub mod output;
pub mod quantify;
pub mod report;
pub mod uniprot;
