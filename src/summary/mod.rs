//! Pipeline report and failure taxonomy

mod failure;
mod report;

pub use failure::{ExitCode, FailureKind};
pub use report::{
    FragmentOverride, FragmentRecord, PipelineReport, RequestedValueDrift, REPORT_SCHEMA_ID,
    REPORT_SCHEMA_VERSION,
};
