//! Override ledger operations.
//!
//! At most one override per target is active. Adding a new one deactivates
//! the previous ones; nothing is ever removed from the ledger.

use crate::core::Override;
use crate::error::{MnemosyneError, Result};

/// Deactivate every active override for `incoming.target_id`, then append
/// `incoming` as active. Returns the ids that were superseded.
pub fn supersede_and_insert(ledger: &mut Vec<Override>, mut incoming: Override) -> Result<Vec<String>> {
    incoming.validate()?;

    let mut superseded = Vec::new();
    for existing in ledger
        .iter_mut()
        .filter(|o| o.active && o.target_id == incoming.target_id)
    {
        existing.active = false;
        superseded.push(existing.id.clone());
    }

    incoming.active = true;
    ledger.push(incoming);
    Ok(superseded)
}

/// Most recent active override for `target_id`.
pub fn active_override<'a>(ledger: &'a [Override], target_id: &str) -> Option<&'a Override> {
    ledger
        .iter()
        .rev()
        .find(|o| o.active && o.target_id == target_id)
}

/// All active overrides, in the order they were recorded.
pub fn override_debt(ledger: &[Override]) -> Vec<&Override> {
    ledger.iter().filter(|o| o.active).collect()
}

/// Deactivate an override without replacing it, paying down its debt.
pub fn resolve(ledger: &mut [Override], override_id: &str) -> Result<()> {
    let entry = ledger
        .iter_mut()
        .find(|o| o.id == override_id)
        .ok_or_else(|| MnemosyneError::not_found("override", override_id))?;
    entry.active = false;
    Ok(())
}
