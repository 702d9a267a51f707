//! Order status state machine
//!
//! Both vendors speak their own status vocabulary; everything collapses onto
//! the internal `SwapStatus` enum and only moves forward through it.

use crate::shared::types::SwapStatus;

impl SwapStatus {
    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Completed | SwapStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::AwaitingDeposit => "AWAITING_DEPOSIT",
            SwapStatus::Processing => "PROCESSING",
            SwapStatus::Completed => "COMPLETED",
            SwapStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<SwapStatus> {
        match s {
            "AWAITING_DEPOSIT" => Some(SwapStatus::AwaitingDeposit),
            "PROCESSING" => Some(SwapStatus::Processing),
            "COMPLETED" => Some(SwapStatus::Completed),
            "FAILED" => Some(SwapStatus::Failed),
            _ => None,
        }
    }
}

/// Collapse an upstream vendor status onto the internal enum.
///
/// Returns None for vocabulary neither vendor documents; the reconciler
/// treats that as "no change" rather than guessing.
pub fn map_provider_status(raw: &str) -> Option<SwapStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "new" | "waiting" => Some(SwapStatus::AwaitingDeposit),
        "confirming" | "exchanging" | "sending" => Some(SwapStatus::Processing),
        "finished" => Some(SwapStatus::Completed),
        "failed" | "expired" | "refunded" | "refunding" => Some(SwapStatus::Failed),
        _ => None,
    }
}

/// Advance `current` given a freshly observed status.
///
/// Terminal states are sticky, forward progress only, and any non-terminal
/// state may drop straight to FAILED. A stale upstream response can never
/// move a record backwards.
pub fn advance(current: SwapStatus, observed: SwapStatus) -> SwapStatus {
    if current.is_terminal() {
        return current;
    }
    if observed == SwapStatus::Failed {
        return SwapStatus::Failed;
    }
    if rank(observed) >= rank(current) {
        observed
    } else {
        current
    }
}

fn rank(status: SwapStatus) -> u8 {
    match status {
        SwapStatus::AwaitingDeposit => 0,
        SwapStatus::Processing => 1,
        SwapStatus::Completed => 2,
        SwapStatus::Failed => 2,
    }
}
