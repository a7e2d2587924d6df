//! Units of work: staged writes plus post-commit hooks.
//!
//! Callers read fresh rows from a [`WorldStore`], stage the rows they want
//! written in a [`UnitOfWork`], attach any number of hooks with
//! [`UnitOfWork::after_commit`], and finally call [`UnitOfWork::commit`].
//!
//! - The staged [`ChangeSet`] is applied atomically or not at all.
//! - Hooks run only after the store accepted every change, in the order
//!   they were attached.
//! - Dropping a unit of work without committing (or a failed commit)
//!   discards both the changes and the hooks.

use reign_types::{Square, Team, TeamId, TeamMember, TeamMemberId, User, UserId, World, WorldId};

use crate::error::DbError;
use crate::store::WorldStore;

/// Callback executed after a successful commit.
pub type CommitHook = Box<dyn FnOnce() + Send + 'static>;

/// One staged write.
///
/// Versioned rows (`PutWorld`, `PutSquare`, `PutTeam`, `PutMember`) carry
/// the version they were read at: `0` inserts a new row (which must not
/// exist yet), any other value updates an existing row at exactly that
/// version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Insert or overwrite a user account.
    PutUser(User),
    /// Remove a user account.
    DeleteUser(UserId),
    /// Insert or update a world.
    PutWorld(World),
    /// Remove a world with its squares, teams and memberships.
    DeleteWorld(WorldId),
    /// Insert or update a square.
    PutSquare(Square),
    /// Wipe a world's board and store a freshly generated one.
    ReplaceBoard {
        /// The world whose board is replaced.
        world_id: WorldId,
        /// The new squares.
        squares: Vec<Square>,
    },
    /// Set every square of a world to unowned with no defense bonus.
    ResetBoard(WorldId),
    /// Release every square a user owns, in one world or everywhere.
    ReleaseSquares {
        /// The former owner.
        user_id: UserId,
        /// Restrict to one world; `None` releases across all worlds.
        world_id: Option<WorldId>,
    },
    /// Insert or update a team.
    ///
    /// Every membership insert or delete is staged together with its team
    /// row, so two units of work that both change one roster conflict.
    PutTeam(Team),
    /// Remove a team with its memberships.
    DeleteTeam {
        /// The team to remove.
        id: TeamId,
        /// Version the team was read at.
        version: u64,
    },
    /// Insert or update a membership.
    PutMember(TeamMember),
    /// Remove a membership. Fails if it is already gone.
    DeleteMember(TeamMemberId),
}

/// Ordered list of staged writes.
pub type ChangeSet = Vec<Change>;

/// Staged writes and post-commit hooks for one logical mutation.
#[derive(Default)]
pub struct UnitOfWork {
    changes: ChangeSet,
    hooks: Vec<CommitHook>,
}

impl core::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("changes", &self.changes)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl UnitOfWork {
    /// Start an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an arbitrary change.
    pub fn stage(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    /// Stage a user upsert.
    pub fn put_user(&mut self, user: User) -> &mut Self {
        self.stage(Change::PutUser(user))
    }

    /// Stage a world upsert.
    pub fn put_world(&mut self, world: World) -> &mut Self {
        self.stage(Change::PutWorld(world))
    }

    /// Stage a square upsert.
    pub fn put_square(&mut self, square: Square) -> &mut Self {
        self.stage(Change::PutSquare(square))
    }

    /// Stage a team upsert.
    pub fn put_team(&mut self, team: Team) -> &mut Self {
        self.stage(Change::PutTeam(team))
    }

    /// Stage the removal of a team at the version it was read at.
    pub fn delete_team(&mut self, team: &Team) -> &mut Self {
        self.stage(Change::DeleteTeam {
            id: team.id,
            version: team.version,
        })
    }

    /// Stage a membership upsert.
    pub fn put_member(&mut self, member: TeamMember) -> &mut Self {
        self.stage(Change::PutMember(member))
    }

    /// Register a hook that runs once the unit of work has committed.
    pub fn after_commit<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    /// The staged changes, in application order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Number of hooks waiting for the commit.
    pub fn pending_hooks(&self) -> usize {
        self.hooks.len()
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Apply the staged changes and, on success, run every hook.
    ///
    /// # Errors
    ///
    /// Returns the store's [`DbError`] if any change is rejected. In that
    /// case nothing was written and the hooks are dropped unexecuted.
    pub fn commit(self, store: &dyn WorldStore) -> Result<(), DbError> {
        let Self { changes, hooks } = self;
        if !changes.is_empty() {
            store.apply(changes)?;
        }
        for hook in hooks {
            hook();
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reign_types::{TeamMember, TeamMemberId};

    use super::*;
    use crate::memory::MemoryStore;

    fn counter_hook(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn hooks_run_after_successful_commit() {
        let store = MemoryStore::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut uow = UnitOfWork::new();
        uow.put_user(User {
            id: UserId::new(),
            username: "ada".to_owned(),
        });
        uow.after_commit(counter_hook(&fired));
        uow.after_commit(counter_hook(&fired));
        assert_eq!(uow.pending_hooks(), 2);

        uow.commit(&store).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_unit_of_work_runs_nothing() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut uow = UnitOfWork::new();
            uow.after_commit(counter_hook(&fired));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejected_commit_runs_no_hooks() {
        let store = MemoryStore::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut uow = UnitOfWork::new();
        uow.stage(Change::DeleteMember(TeamMemberId::new()));
        uow.after_commit(counter_hook(&fired));

        let result = uow.commit(&store);
        assert!(result.is_err_and(|e| e.is_conflict()));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_unit_of_work_still_runs_hooks() {
        let store = MemoryStore::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let mut uow = UnitOfWork::new();
        uow.after_commit(counter_hook(&fired));
        assert!(uow.is_empty());
        uow.commit(&store).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changes_keep_staging_order() {
        let member = TeamMember::new(TeamId::new(), UserId::new(), chrono::Utc::now());
        let mut uow = UnitOfWork::new();
        uow.put_member(member.clone())
            .stage(Change::DeleteMember(member.id));
        assert_eq!(uow.changes().len(), 2);
        assert!(matches!(uow.changes().first(), Some(Change::PutMember(_))));
    }
}
