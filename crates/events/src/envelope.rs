use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealwallet_core::AccountId;

use crate::event::Event;

/// Envelope for a committed ledger event, carrying account + stream metadata.
///
/// This is the unit published to listeners after a mutation has been persisted.
///
/// Notes:
/// - `sequence_number` equals the account aggregate's version right after this
///   event was applied, so it is monotonically increasing per account.
/// - `event_type` is copied from the payload so listeners can route without
///   matching on the payload type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    account_id: AccountId,
    event_type: String,

    /// Monotonically increasing position in the account stream.
    sequence_number: u64,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        account_id: AccountId,
        event_type: impl Into<String>,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            account_id,
            event_type: event_type.into(),
            sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, taking type and timestamp from the event itself.
    pub fn wrap(account_id: AccountId, sequence_number: u64, event: E) -> Self {
        Self::new(
            Uuid::now_v7(),
            account_id,
            event.event_type(),
            sequence_number,
            event.occurred_at(),
            event,
        )
    }
}
