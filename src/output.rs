use std::io::{self, Write};

use serde::Serialize;

use crate::app::{PipelineResult, ProgressEvent, ProgressSink};
use crate::geo::GeoFetchResult;
use crate::report::write_report_tsv;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Table,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &PipelineResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_geo(result: &GeoFetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TableOutput;

impl TableOutput {
    pub fn print_run(result: &PipelineResult, include_mean: bool) -> io::Result<()> {
        let stdout = io::stdout();
        write_report_tsv(&result.rows, include_mean, stdout.lock()).map_err(io::Error::other)
    }
}
