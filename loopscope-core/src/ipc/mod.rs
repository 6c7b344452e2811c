//! Serializable types for hosts that forward engine state to a front end.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` with camelCase
//! field names so they can be emitted as JSON unchanged.

pub mod events;
