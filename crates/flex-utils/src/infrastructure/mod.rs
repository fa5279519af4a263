//! Infrastructure layer: file-system adapters.
//!
//! **Dependency rule**: this layer may depend on `application` and `flex_ini`,
//! but MUST NOT be imported by the `application` layer.

pub mod storage;
