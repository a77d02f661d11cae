/// Execute an aggregate command deterministically (no IO).
///
/// 1. **Decide**: `aggregate.handle(command)` produces events without mutating.
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// A rejected command returns the error and leaves the aggregate untouched, so
/// callers get all-or-nothing semantics. The ledger engine runs this on a
/// working copy of the account and commits the copy only after persistence succeeds.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: mealwallet_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
