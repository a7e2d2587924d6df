//! Data layer for the Reign territory game.
//!
//! Game services never write rows directly. They read owned copies from a
//! [`WorldStore`], stage the rows they want written in a [`UnitOfWork`],
//! and commit it. A commit is all-or-nothing; versioned rows are checked
//! optimistically, so a unit of work built from stale reads is rejected
//! with [`DbError::Conflict`] and the caller decides whether to retry.
//!
//! # Architecture
//!
//! ```text
//! Service (capture, scheduler, teams, worlds)
//!     |
//!     +-- reads ------------> WorldStore (owned copies)
//!     |
//!     +-- UnitOfWork::commit -> WorldStore::apply (atomic)
//!         |
//!         +-- after_commit hooks (broadcasts)
//!
//! PgStore
//!     +-- reads ---> MemoryStore read model
//!     +-- apply ---> MemoryStore::check -> one PostgreSQL transaction
//!                    (version-guarded UPDATEs) -> MemoryStore::apply
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`WorldStore`] trait
//! - [`unit_of_work`] -- Staged change sets with post-commit hooks
//! - [`memory`] -- In-process store, used directly by tests and as the
//!   read model of [`PgStore`]
//! - [`postgres`] -- `PostgreSQL` connection pool and migrations
//! - [`pg_store`] -- Transactional [`WorldStore`] over `PostgreSQL`
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod pg_store;
pub mod postgres;
pub mod store;
pub mod unit_of_work;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::{MemoryStore, TableRows};
pub use pg_store::PgStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::WorldStore;
pub use unit_of_work::{Change, ChangeSet, CommitHook, UnitOfWork};
