//! Data models for the recipe client.
//!
//! These models match the recipe service's JSON payloads for seamless interoperability.

mod recipe;
mod suggestion;
mod tab;
mod transfer;

pub use recipe::*;
pub use suggestion::*;
pub use tab::*;
pub use transfer::*;
