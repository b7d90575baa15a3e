//! Result sink port trait.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::OptraderError;
use crate::domain::optimizer::SweepReport;
use crate::domain::signal::SignalStream;

pub trait ReportPort {
    fn write_backtest(
        &self,
        report: &BacktestReport<'_>,
        output_path: &str,
    ) -> Result<(), OptraderError>;

    fn write_signals(&self, signals: &SignalStream, output_path: &str)
    -> Result<(), OptraderError>;

    fn write_sweep(&self, report: &SweepReport, output_path: &str) -> Result<(), OptraderError>;
}
