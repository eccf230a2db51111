#![warn(missing_docs)]

//! # Tidemark - Incremental Backup with Compact Manifests
//!
//! Tidemark takes repeated backups of a directory tree, copying only what
//! changed since the previous backup and recording each run in a compact
//! tree-structured manifest. A retention engine can later delete backups
//! that recorded nothing useful.
//!
//! ## Architecture
//!
//! The library is organised around three cores and their collaborators:
//!
//! - [`scan`]: read-only filesystem scanning into an in-memory snapshot
//!   tree, with [`exclude`] supplying the path exclusion patterns
//! - [`manifest`]: the per-backup change record and its flat token codec
//! - [`prune`]: policy-driven deletion of useless backups
//! - [`meta`]: the on-disk backup layout (start/completion info, backup
//!   enumeration)
//! - [`sum`], [`plan`], [`backup`], [`restore`]: the backup writer and
//!   reader built on top of the cores
//!
//! All operations are synchronous and single-threaded, and assume exclusive
//! access to the backup target for their duration; the `tide` binary
//! serialises runs with a lock file ([`lock`]).
//!
//! ## Error philosophy
//!
//! Failures attributable to one path or one backup are reported through
//! per-operation callback hooks and the run continues; only failures that
//! invalidate a whole operation surface as `Err`. Every callback defaults
//! to a no-op.

/// End-to-end backup orchestration.
pub mod backup;

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Command implementations for the `tide` binary.
pub mod commands;

/// Path exclusion patterns for scanning.
pub mod exclude;

/// Lock file serialising operations on a backup target.
pub mod lock;

/// Backup manifest model and codec.
pub mod manifest;

/// On-disk backup metadata and enumeration.
pub mod meta;

/// Backup planning and execution.
pub mod plan;

/// Deletion of historically useless backups.
pub mod prune;

/// Restoration of backed-up state.
pub mod restore;

/// Read-only filesystem scanning.
pub mod scan;

/// Accumulated state across a sequence of backups.
pub mod sum;

/// Current version of the tidemark crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
