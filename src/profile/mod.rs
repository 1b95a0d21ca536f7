//! Tunnel profile persistence
//!
//! Locates, creates and updates the single platform profile owned by this
//! application. The raw configuration text is the only thing persisted.

mod store;

pub use store::ProfileStore;
