//! Rendering of command output.

use std::io::Write;

use launchpad_plm::{ParamEntry, SelectionOutcome};
use serde::Serialize;

use crate::AppError;
use crate::bootstrap::Prepared;

pub(crate) const NO_LAUNCHER_MESSAGE: &str = "no launcher available for this environment";

pub(crate) fn write_selection<W: Write>(
    out: &mut W,
    outcome: &SelectionOutcome,
) -> Result<(), AppError> {
    match outcome.selection() {
        Some(selection) => writeln!(
            out,
            "selected {} (priority {})",
            selection.descriptor().name(),
            selection.priority()
        ),
        None => writeln!(out, "{NO_LAUNCHER_MESSAGE}"),
    }
    .map_err(AppError::WriteOutput)
}

#[derive(Debug, Serialize)]
pub(crate) struct BackendListing<'a> {
    backends: Vec<BackendSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct BackendSummary<'a> {
    name: &'a str,
    framework: &'static str,
    version: String,
    checkpoint_ready: bool,
    parameters: Vec<&'a ParamEntry>,
}

impl<'a> BackendListing<'a> {
    pub(crate) fn from_prepared(prepared: &'a Prepared) -> Self {
        let backends = prepared
            .manager()
            .descriptors()
            .map(|descriptor| {
                let component = descriptor.param_component();
                BackendSummary {
                    name: descriptor.name(),
                    framework: descriptor.framework(),
                    version: descriptor.version().to_string(),
                    checkpoint_ready: descriptor.flags().checkpoint_ready,
                    parameters: prepared.store().entries_for(&component).collect(),
                }
            })
            .collect();
        Self { backends }
    }

    pub(crate) fn write_text<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        for backend in &self.backends {
            let marker = if backend.checkpoint_ready {
                " [checkpoint-ready]"
            } else {
                ""
            };
            writeln!(
                out,
                "{}:{} {}{marker}",
                backend.framework, backend.name, backend.version
            )
            .map_err(AppError::WriteOutput)?;
            for entry in &backend.parameters {
                writeln!(
                    out,
                    "  {} = {} ({})",
                    entry.full_name(),
                    entry.value(),
                    entry.origin()
                )
                .map_err(AppError::WriteOutput)?;
            }
        }
        Ok(())
    }

    pub(crate) fn write_json<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        serde_json::to_writer_pretty(&mut *out, self).map_err(AppError::SerialiseReport)?;
        writeln!(out).map_err(AppError::WriteOutput)
    }
}
