// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local persistence (device key-value store).

pub mod drafts;
pub mod store;

pub use drafts::DraftStore;
pub use store::{LocalStore, StoreWriter};

/// Storage keys and key prefixes.
pub mod keys {
    /// Pointer to the session currently being recorded
    pub const ACTIVE_SESSION: &str = "active_session";
    /// Advisory recording lock
    pub const SESSION_LOCK: &str = "session_lock";
    /// Draft entries live at `draft:<kind>:<id>`
    pub const DRAFT_PREFIX: &str = "draft";
    /// Draft id index per kind lives at `drafts:<kind>`
    pub const DRAFT_INDEX_PREFIX: &str = "drafts";
}
