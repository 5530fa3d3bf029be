//! JSON execution report emitted after a run. The core exposes this data
//! through `Snapshot` and `ErrorCenter`; only the driver serializes it.

use serde::Serialize;

use ralph_core::error::ErrorRecord;
use ralph_core::Snapshot;

#[derive(Serialize)]
pub struct ErrorReportEntry {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub class: String,
    pub severity: String,
    pub source_file: String,
    pub detail: String,
}

impl From<&ErrorRecord> for ErrorReportEntry {
    fn from(r: &ErrorRecord) -> Self {
        ErrorReportEntry {
            message: r.message.clone(),
            line: r.line,
            column: r.column,
            class: r.class.name().to_string(),
            severity: format!("{:?}", r.severity),
            source_file: r.source_file.clone(),
            detail: r.detail.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct Report {
    pub fault_flag: bool,
    pub fault_message: Option<String>,
    pub instructions_executed: u64,
    pub operand_stack_depth: usize,
    pub call_depth: usize,
    pub stack_high_water: usize,
    pub errors: Vec<ErrorReportEntry>,
}

impl Report {
    pub fn build(snapshot: &Snapshot, errors: &[ErrorRecord]) -> Report {
        Report {
            fault_flag: snapshot.fault_flag,
            fault_message: snapshot.fault_message.clone(),
            instructions_executed: snapshot.instructions_executed,
            operand_stack_depth: snapshot.operand_stack_depth,
            call_depth: snapshot.call_depth,
            stack_high_water: snapshot.stack_high_water,
            errors: errors.iter().map(ErrorReportEntry::from).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
