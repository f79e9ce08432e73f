//! State-synchronization core for a task board: an optimistic store with
//! WIP limits, bounded undo/redo, cross-board reconciliation of assigned
//! tasks and a tombstone-based trash.

pub mod board;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod notify;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod wip;

pub use gateway::{Gateway, GatewayError};
