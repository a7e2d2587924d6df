//! Capability check for in-world actions.

use reign_db::WorldStore;
use reign_types::{UserId, WorldId};

/// Whether `actor` may act in `world_id`: true iff they hold a membership
/// in one of the world's teams.
pub fn can_act(store: &dyn WorldStore, actor: UserId, world_id: WorldId) -> bool {
    store.membership(actor, world_id).is_some()
}
