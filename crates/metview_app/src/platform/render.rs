use std::collections::HashMap;
use std::io::{self, Write};

use metview_core::{AppViewModel, FlowKind, FlowPhase, FlowView};
use metview_logging::{met_info, met_warn};

/// Reports flow progress as the view changes and prints final results.
#[derive(Debug, Default)]
pub struct Renderer {
    phases: HashMap<FlowKind, FlowPhase>,
    last_error: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&mut self, view: &AppViewModel) {
        for flow in &view.flows {
            if self.phases.get(&flow.flow) == Some(&flow.phase) {
                continue;
            }
            self.phases.insert(flow.flow, flow.phase.clone());
            match &flow.phase {
                FlowPhase::Idle => {}
                FlowPhase::Submitted => met_info!("{}: submitted", flow.flow),
                FlowPhase::Polling { attempt } => {
                    met_info!("{}: checking for results (attempt {})", flow.flow, attempt + 1)
                }
                FlowPhase::Complete => met_info!("{}: results ready", flow.flow),
                FlowPhase::Failed(failure) => met_warn!("{}: {}", flow.flow, failure),
            }
        }
        if view.last_error.is_some() && view.last_error != self.last_error {
            self.last_error = view.last_error.clone();
            if let Some(err) = &self.last_error {
                met_warn!("{}", err);
            }
        }
    }
}

pub fn print_flow(out: &mut impl Write, flow: &FlowView) -> io::Result<()> {
    match &flow.source_filename {
        Some(name) => writeln!(out, "{} results ({}): {} rows", flow.flow, name, flow.rows.len())?,
        None => writeln!(out, "{} results: {} rows", flow.flow, flow.rows.len())?,
    }
    if let Some(rows) = flow.fragment_rows {
        writeln!(out, "  #{} shows {} row(s)", flow.flow.table_id(), rows)?;
    }
    if flow.rows.is_empty() {
        return Ok(());
    }
    let width = flow
        .rows
        .iter()
        .map(|row| row.time.len())
        .max()
        .unwrap_or(0)
        .max("Time".len());
    writeln!(out, "  {:<width$}  MET", "Time")?;
    for row in &flow.rows {
        writeln!(out, "  {:<width$}  {}", row.time, row.met_label())?;
    }
    Ok(())
}

pub fn print_selection(out: &mut impl Write, flow: &FlowView) -> io::Result<()> {
    if flow.selection.is_empty() {
        return writeln!(out, "{} selection is empty", flow.flow);
    }
    writeln!(out, "{} selection (#{}):", flow.flow, flow.flow.files_list_id())?;
    for (idx, row) in flow.selection.iter().enumerate() {
        writeln!(out, "  {}. {} {}", idx + 1, row.name, row.size_label)?;
    }
    Ok(())
}
