//! Mission lifecycle state machine.
//!
//! The backend drives every transition; the client applies one only after a
//! successful response. Keeping the table closed here means an illegal
//! local update is a refused call, not a silently wrong badge.
//!
//! ```text
//! Open
//!     ↓ (owner accepts an application)
//! PendingPayment
//!     ↓ (escrow payment verified)
//! InProgress
//!     ↓ (accepted seller submits a delivery)
//! AwaitingValidation
//!     ↓ (owner validates the delivery)
//! Completed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::Mission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Open,
    PendingPayment,
    InProgress,
    AwaitingValidation,
    Completed,
}

impl MissionStatus {
    /// The states this one may legally move to.
    pub fn successors(self) -> &'static [MissionStatus] {
        match self {
            MissionStatus::Open => &[MissionStatus::PendingPayment],
            MissionStatus::PendingPayment => &[MissionStatus::InProgress],
            MissionStatus::InProgress => &[MissionStatus::AwaitingValidation],
            MissionStatus::AwaitingValidation => &[MissionStatus::Completed],
            MissionStatus::Completed => &[],
        }
    }

    pub fn can_transition_to(self, next: MissionStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Wire/log representation, matching the backend's snake_case strings.
    pub fn as_str(self) -> &'static str {
        match self {
            MissionStatus::Open => "open",
            MissionStatus::PendingPayment => "pending_payment",
            MissionStatus::InProgress => "in_progress",
            MissionStatus::AwaitingValidation => "awaiting_validation",
            MissionStatus::Completed => "completed",
        }
    }

    /// Human-readable badge shown on mission cards.
    pub fn badge(self) -> &'static str {
        match self {
            MissionStatus::Open => "Ouverte",
            MissionStatus::PendingPayment => "En attente de paiement",
            MissionStatus::InProgress => "En cours",
            MissionStatus::AwaitingValidation => "En attente de validation",
            MissionStatus::Completed => "Terminée",
        }
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("illegal mission transition: {from} -> {to}")]
    IllegalTransition {
        from: MissionStatus,
        to: MissionStatus,
    },
}

impl Mission {
    /// Apply a server-confirmed transition to the local copy.
    pub fn apply_transition(&mut self, next: MissionStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
