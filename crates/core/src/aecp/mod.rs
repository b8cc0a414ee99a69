//! ATDECC Enumeration and Control Protocol, entity side.
//!
//! Only the AEM command set is served. The state machine in
//! [`entity_model`] answers controller commands and tracks which
//! controller has acquired the entity. The owner is published through an
//! [`Ownership`] handle so the connection manager can refuse connects
//! from anyone else.

pub mod entity_model;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use entity_model::{EntityModelEvent, EntityModelStateMachine};

/// Shared view of the acquiring controller. `0` means unowned.
///
/// Clones observe the same value. The entity-model engine is the only
/// writer.
#[derive(Debug, Clone, Default)]
pub struct Ownership {
    owner: Arc<AtomicU64>,
}

impl Ownership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> u64 {
        self.owner.load(Ordering::SeqCst)
    }

    pub fn is_owned(&self) -> bool {
        self.owner() != 0
    }

    /// Whether the entity is held by a controller other than `controller_entity_id`.
    pub fn held_by_other(&self, controller_entity_id: u64) -> bool {
        let owner = self.owner();
        owner != 0 && owner != controller_entity_id
    }

    pub(crate) fn set(&self, owner: u64) {
        self.owner.store(owner, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_owner() {
        let ownership = Ownership::new();
        let view = ownership.clone();
        assert!(!view.is_owned());

        ownership.set(43);
        assert_eq!(view.owner(), 43);
        assert!(view.held_by_other(44));
        assert!(!view.held_by_other(43));

        ownership.set(0);
        assert!(!view.held_by_other(44));
    }
}
