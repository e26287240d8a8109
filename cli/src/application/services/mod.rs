//! Application services.
//!
//! Each module implements one step of a deployment session by composing
//! domain logic with port trait calls. Services import only from
//! `crate::domain` and `crate::application::ports`.

pub mod health;
pub mod instance;
pub mod orchestrator;
pub mod readiness;
pub mod release;
pub mod remote;
pub mod transfer;
