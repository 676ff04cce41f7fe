//! Shared session context.
//!
//! A [`SessionContext`] is the mutable record of facts a session has
//! established so far (who the passenger is, which booking and train the
//! conversation is about). It is owned by the session, shared across handler
//! transfers, and mutated only by action executors and handoff transition
//! hooks. Handler instruction templates and actions read from it; a snapshot
//! is handed back to the caller after every turn for UI display.

use serde::Serialize;

use crate::ids::IdSource;

/// Session-scoped facts shared across all handlers in a session.
///
/// The account number is assigned exactly once at construction and never
/// cleared, which is why the field is private. All other fields start absent
/// and are filled in as the conversation progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub passenger_name: Option<String>,
    pub confirmation_number: Option<String>,
    pub seat_number: Option<String>,
    pub train_number: Option<String>,
    account_number: Option<String>,
}

impl SessionContext {
    /// Creates a fresh context with an account number drawn from `ids`.
    ///
    /// In production the account number would come from real user data; the
    /// generated one stands in for it and keeps the invariant that it is
    /// populated for the whole session lifetime.
    pub fn new(ids: &mut dyn IdSource) -> Self {
        Self {
            account_number: Some(ids.account_number()),
            ..Default::default()
        }
    }

    /// The customer's account number, populated at session creation.
    pub fn account_number(&self) -> Option<&str> {
        self.account_number.as_deref()
    }
}
