use chrono::{DateTime, Utc};

/// A ledger event: an immutable fact describing an accepted mutation.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - **self-sufficient**: applying them replays the mutation exactly
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "ledger.plan.meal_used").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the mutation happened (read once, at call time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
