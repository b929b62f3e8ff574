//! Wire-level constants shared by clients and workers.

use std::time::Duration;

/// Default cluster entry point.
pub const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:6660";

/// Default per-call deadline for both send and receive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Control message asking a worker to shut down. Matched case-insensitively.
pub const MSG_STOP: &str = "STOP";

/// Job accepted, artifact reference follows in the status line.
pub const REP_200_SUCCESS: &str = "200";
/// Request rejected before rendering (unparseable URL, bad document).
pub const REP_400_BAD_REQUEST: &str = "400";
/// Render aborted by the job's warning policy.
pub const REP_409_RENDER_ABORTED: &str = "409";
/// The rendering engine failed mid-job.
pub const REP_502_BAD_GATEWAY: &str = "502";
/// Worker is shutting down or cannot take jobs.
pub const REP_503_SERVICE_UNAVAILABLE: &str = "503";

/// Build a reply status line: the status token, a space, and the detail.
pub fn status_line(status: &str, detail: &str) -> String {
    if detail.is_empty() {
        status.to_string()
    } else {
        format!("{status} {detail}")
    }
}

/// Split a status line into its status token and detail.
pub fn split_status_line(line: &str) -> (&str, &str) {
    match line.split_once(' ') {
        Some((status, detail)) => (status, detail),
        None => (line, ""),
    }
}
