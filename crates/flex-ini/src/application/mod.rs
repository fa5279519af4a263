//! Application layer: the thread-safe store and the policies around it.
//!
//! # Sub-modules
//!
//! - **`store`**    – [`store::IniStore`], one locked, file-backed document.
//! - **`retry`**    – [`retry::RetryPolicy`], bounded retry for transient
//!   sharing violations.
//! - **`registry`** – [`registry::StoreRegistry`], one store per normalised
//!   path plus retry-wrapped read/write calls.

pub mod registry;
pub mod retry;
pub mod store;
