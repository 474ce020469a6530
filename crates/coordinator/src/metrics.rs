//! Counter/gauge names backing the completion-status table and the
//! `/metrics` passthrough exposed by `repoforge-web`.

use repoforge_protocol::BuildStatus;

pub const BUILDS_TOTAL: &str = "builds_total";
pub const BUILDS_SUCCESS_TOTAL: &str = "builds_success_total";
pub const BUILDS_ALREADY_BUILT_TOTAL: &str = "builds_already_built_total";
pub const BUILDS_SKIPPED_TOTAL: &str = "builds_skipped_total";
pub const BUILDS_FAILED_BUILD_TOTAL: &str = "builds_failed_build_total";
pub const BUILDS_FAILED_TIMEOUT_TOTAL: &str = "builds_failed_timeout_total";
pub const BUILDS_FAILED_SOFTWARE_TOTAL: &str = "builds_failed_software_total";
pub const BUILDS_CANCELLED_TOTAL: &str = "builds_cancelled_total";
pub const QUEUE_DEPTH: &str = "queue_depth";
pub const BUSY_NODES: &str = "busy_nodes";

/// Record the per-status metric bump from the completion table. `replaced`
/// only matters for the cancellation branches.
pub fn record_completion(status: BuildStatus, replaced: bool) {
    metrics::counter!(BUILDS_TOTAL).increment(1);
    match status {
        BuildStatus::Success => {
            metrics::counter!(BUILDS_SUCCESS_TOTAL).increment(1);
        }
        BuildStatus::AlreadyBuilt => {
            metrics::counter!(BUILDS_ALREADY_BUILT_TOTAL).increment(1);
        }
        BuildStatus::Skipped => {
            metrics::counter!(BUILDS_SKIPPED_TOTAL).increment(1);
        }
        BuildStatus::Failed => {
            metrics::counter!(BUILDS_FAILED_BUILD_TOTAL).increment(1);
        }
        BuildStatus::TimedOut => {
            metrics::counter!(BUILDS_FAILED_TIMEOUT_TOTAL).increment(1);
        }
        BuildStatus::SoftwareFailure => {
            metrics::counter!(BUILDS_FAILED_SOFTWARE_TOTAL).increment(1);
        }
        BuildStatus::Canceled | BuildStatus::CanceledRequeue => {
            metrics::counter!(BUILDS_CANCELLED_TOTAL, "replaced" => replaced.to_string())
                .increment(1);
        }
    }
}

pub fn record_rpc_error() {
    metrics::counter!(BUILDS_TOTAL).increment(1);
    metrics::counter!(BUILDS_FAILED_SOFTWARE_TOTAL).increment(1);
}

pub fn set_queue_gauges(queue_depth: usize, busy_nodes: usize) {
    metrics::gauge!(QUEUE_DEPTH).set(queue_depth as f64);
    metrics::gauge!(BUSY_NODES).set(busy_nodes as f64);
}
