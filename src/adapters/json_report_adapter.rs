//! Pretty-printed JSON report adapter implementing ReportPort.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::OptraderError;
use crate::domain::optimizer::SweepReport;
use crate::domain::signal::SignalStream;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_json<T: Serialize + ?Sized>(value: &T, output_path: &str) -> Result<(), OptraderError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| OptraderError::Report {
                reason: format!("cannot create {}: {e}", parent.display()),
            })?;
        }
        let mut content = serde_json::to_string_pretty(value)?;
        content.push('\n');
        fs::write(path, content).map_err(|e| OptraderError::Report {
            reason: format!("cannot write {output_path}: {e}"),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write_backtest(
        &self,
        report: &BacktestReport<'_>,
        output_path: &str,
    ) -> Result<(), OptraderError> {
        Self::write_json(report, output_path)
    }

    fn write_signals(
        &self,
        signals: &SignalStream,
        output_path: &str,
    ) -> Result<(), OptraderError> {
        Self::write_json(&signals.events, output_path)
    }

    fn write_sweep(&self, report: &SweepReport, output_path: &str) -> Result<(), OptraderError> {
        Self::write_json(report, output_path)
    }
}
