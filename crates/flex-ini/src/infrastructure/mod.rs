//! Infrastructure layer: the store's only contact with the operating system.
//!
//! **Dependency rule**: this layer may depend on `domain` and `error`, but
//! MUST NOT be imported by the `domain` layer.

pub mod storage;
