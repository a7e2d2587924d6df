//! Action point regeneration for one cycle tick.

use reign_db::{UnitOfWork, WorldStore};
use reign_types::World;

/// Points a member holds after one regeneration step.
///
/// Adds `per_cycle` and caps the result at `max`.
pub const fn regenerated_points(current: u32, per_cycle: u32, max: u32) -> u32 {
    let next = current.saturating_add(per_cycle);
    if next > max { max } else { next }
}

/// Stage the regeneration step for every member of every team of `world`.
///
/// Only members whose balance changes are staged. Returns how many were.
pub fn stage_regeneration(store: &dyn WorldStore, world: &World, uow: &mut UnitOfWork) -> usize {
    let mut staged: usize = 0;
    for team in store.teams_in_world(world.id) {
        for mut member in store.members_of_team(team.id) {
            let points = regenerated_points(
                member.current_action_points,
                world.action_points_per_cycle,
                world.max_action_points,
            );
            if points != member.current_action_points {
                member.current_action_points = points;
                uow.put_member(member);
                staged = staged.saturating_add(1);
            }
        }
    }
    staged
}
