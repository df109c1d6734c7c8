//! Fulfillment state machine.

use serde::{Deserialize, Serialize};

/// The state of one fulfillment run.
///
/// State transitions:
/// ```text
/// Received ──► Verified ──► ItemsExtracted ──► StockAdjusted ──► Recorded ──► Notified ──► Done
///    │            │  └──────────────┴─────────────────────────────────────────────────────► Done
///    └────────────┴───────────┴──► Failed
/// ```
///
/// `Verified → Done` acknowledges events that need no fulfillment and
/// `ItemsExtracted → Done` ends a redelivery whose order is already recorded.
/// `Failed` is only reachable before stock is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FulfillmentState {
    /// The webhook arrived; nothing is trusted yet.
    #[default]
    Received,

    /// The signature matched and the event decoded.
    Verified,

    /// The session was re-fetched and its line items mapped.
    ItemsExtracted,

    /// Every linked line item had its stock decrement attempted.
    StockAdjusted,

    /// The ledger append was attempted.
    Recorded,

    /// The order summary was sent.
    Notified,

    /// The run finished and the event can be acknowledged (terminal state).
    Done,

    /// The run stopped before any mutation (terminal state).
    Failed,
}

impl FulfillmentState {
    /// Returns true if a run may move from this state to `to`.
    pub fn can_transition_to(&self, to: FulfillmentState) -> bool {
        use FulfillmentState::*;
        matches!(
            (*self, to),
            (Received, Verified)
                | (Received, Failed)
                | (Verified, ItemsExtracted)
                | (Verified, Done)
                | (Verified, Failed)
                | (ItemsExtracted, StockAdjusted)
                | (ItemsExtracted, Done)
                | (ItemsExtracted, Failed)
                | (StockAdjusted, Recorded)
                | (Recorded, Notified)
                | (Notified, Done)
        )
    }

    /// Returns true if failures in this state still abort the run.
    ///
    /// Once stock has been adjusted the payment is treated as fulfilled and
    /// later failures are reported to operators instead.
    pub fn can_fail(&self) -> bool {
        self.can_transition_to(FulfillmentState::Failed)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FulfillmentState::Done | FulfillmentState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentState::Received => "Received",
            FulfillmentState::Verified => "Verified",
            FulfillmentState::ItemsExtracted => "ItemsExtracted",
            FulfillmentState::StockAdjusted => "StockAdjusted",
            FulfillmentState::Recorded => "Recorded",
            FulfillmentState::Notified => "Notified",
            FulfillmentState::Done => "Done",
            FulfillmentState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for FulfillmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
