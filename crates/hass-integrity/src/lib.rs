//! HASS Clinical Record Definitions
//!
//! Defines every record the hospital system stores, the status lifecycle
//! of each record, and the validation applied before a record is written.
//! All clinical records hang off a `Patient` and a `Visit` scoped to one
//! `Hospital`.

pub mod appointment;
pub mod bed;
pub mod case_sheet;
pub mod clinical;
pub mod document;
pub mod identity;
pub mod messaging;
pub mod navigation;
pub mod notification;
pub mod patient;
pub mod visit;

pub use appointment::*;
pub use bed::*;
pub use case_sheet::*;
pub use clinical::*;
pub use document::*;
pub use identity::*;
pub use messaging::*;
pub use navigation::*;
pub use notification::*;
pub use patient::*;
pub use visit::*;

/// A status enum whose allowed moves form a fixed graph.
pub trait Lifecycle: Copy + PartialEq + std::fmt::Display + 'static {
    /// Statuses reachable from `self` in one step
    fn next_states(&self) -> &'static [Self];

    fn can_transition_to(&self, next: Self) -> bool {
        self.next_states().contains(&next)
    }

    fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }
}

/// Rejected status change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} cannot move from '{from}' to '{to}'")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

/// Check a status change against the lifecycle graph.
pub fn transition<S: Lifecycle>(entity: &'static str, current: S, next: S) -> Result<S, TransitionError> {
    if current.can_transition_to(next) {
        Ok(next)
    } else {
        Err(TransitionError {
            entity,
            from: current.to_string(),
            to: next.to_string(),
        })
    }
}
