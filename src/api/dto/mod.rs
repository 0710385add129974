//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names are camelCase on the wire, matching [`crate::domain::DogEvent`].

pub mod event_dto;
pub mod intake_dto;
pub mod pack_dto;
pub mod profile_dto;
pub mod stats_dto;

pub use event_dto::*;
pub use intake_dto::*;
pub use pack_dto::*;
pub use profile_dto::*;
pub use stats_dto::*;
