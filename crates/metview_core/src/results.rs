/// One row of a MET results table.
#[derive(Debug, Clone, PartialEq)]
pub struct MetRow {
    pub time: String,
    /// `None` when the server had no estimate for this timestamp.
    pub met: Option<f64>,
}

impl MetRow {
    pub fn new(time: impl Into<String>, met: Option<f64>) -> Self {
        Self {
            time: time.into(),
            met,
        }
    }

    pub fn met_label(&self) -> String {
        match self.met {
            Some(value) => format!("{value}"),
            None => String::new(),
        }
    }
}

/// Parsed upload response handed to the results table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UploadedTable {
    pub source_filename: Option<String>,
    pub rows: Vec<MetRow>,
}

/// A re-fetched page fragment: its markup and its results table size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentContent {
    /// `<tr>` count of the flow's results table, header included.
    pub table_rows: usize,
    /// Outer HTML of the fragment, `None` when the page lacks it.
    pub html: Option<String>,
}

impl FragmentContent {
    pub fn new(table_rows: usize, html: Option<String>) -> Self {
        Self { table_rows, html }
    }
}

/// Server-rendered plot markup for the two plot containers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlotMarkup {
    pub plot1: String,
    pub plot2: String,
}
