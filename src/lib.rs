//! TFM core — a storage-polymorphic path layer, a metadata cache and
//! invalidation engine, and a dual-pane coordinator for a terminal file
//! manager (see spec §1 "Purpose & scope").
//!
//! This crate is the embeddable core: it owns no terminal driver, no
//! process spawner, and no CLI parser. Those are external collaborators
//! (spec §6 "External interfaces") that drive [`coordinator::Coordinator`]
//! with [`terminal::InputEvent`]s and render the [`terminal::Cell`] grid
//! it produces.

pub mod archive;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod dialog;
pub mod env_vars;
pub mod error;
pub mod job;
pub mod logging;
pub mod pane;
pub mod path;
pub mod ssh_health;
pub mod state_store;
pub mod terminal;
