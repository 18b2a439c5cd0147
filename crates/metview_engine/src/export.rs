use std::fmt::Write as _;
use std::path::PathBuf;

use crate::fragment::render_rows;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::{MetSample, PlotResponse};

pub const PLOT1_FILENAME: &str = "plotdiv1.html";
pub const PLOT2_FILENAME: &str = "plotdiv2.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub csv_path: PathBuf,
    pub table_path: PathBuf,
}

/// Writes `{label}_met.csv` and `{label}_met_table.html` for one flow.
pub fn export_series(
    writer: &AtomicFileWriter,
    label: &str,
    table_id: &str,
    samples: &[MetSample],
) -> Result<ExportSummary, PersistError> {
    let mut csv = String::from("time,met\n");
    for sample in samples {
        let met = sample.met.map(|m| m.to_string()).unwrap_or_default();
        let _ = writeln!(csv, "{},{}", csv_field(&sample.time), met);
    }
    let csv_path = writer.write(&format!("{label}_met.csv"), &csv)?;

    let table = format!(
        "<table id=\"{table_id}\"><tr><th>Time</th><th>MET</th></tr>{}</table>\n",
        render_rows(samples)
    );
    let table_path = writer.write(&format!("{label}_met_table.html"), &table)?;

    Ok(ExportSummary {
        csv_path,
        table_path,
    })
}

/// Writes a re-fetched fragment's markup to `{fragment_id}.html`.
pub fn export_fragment(
    writer: &AtomicFileWriter,
    fragment_id: &str,
    html: &str,
) -> Result<PathBuf, PersistError> {
    writer.write(&format!("{fragment_id}.html"), html)
}

/// Writes the two plot containers' markup.
pub fn export_plots(
    writer: &AtomicFileWriter,
    plots: &PlotResponse,
) -> Result<(PathBuf, PathBuf), PersistError> {
    let first = writer.write(PLOT1_FILENAME, &plots.plot1)?;
    let second = writer.write(PLOT2_FILENAME, &plots.plot2)?;
    Ok((first, second))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
