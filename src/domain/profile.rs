//! Dog profile, life-stage and pack member roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PackCode;
use crate::error::TailTalkError;

/// Age bracket that scales how fast the gauges move.
///
/// Defaults to [`LifeStage::Adult`], which is also what the gauges use
/// before a profile exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    /// Young dog: fastest decay, shortest bladder.
    Puppy,
    /// Baseline rates.
    #[default]
    Adult,
    /// Slower decay, longest bladder.
    Senior,
}

impl LifeStage {
    /// Multiplier applied to the tummy, tank and energy decay rates.
    #[must_use]
    pub const fn decay_multiplier(&self) -> f64 {
        match self {
            Self::Puppy => 1.5,
            Self::Adult => 1.0,
            Self::Senior => 0.8,
        }
    }

    /// Hours after a potty event until urgency reaches 1.
    #[must_use]
    pub const fn urgency_hours(&self) -> f64 {
        match self {
            Self::Puppy => 4.0,
            Self::Adult => 6.0,
            Self::Senior => 8.0,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Puppy => "puppy",
            Self::Adult => "adult",
            Self::Senior => "senior",
        }
    }
}

impl fmt::Display for LifeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifeStage {
    type Err = TailTalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "puppy" => Ok(Self::Puppy),
            "adult" => Ok(Self::Adult),
            "senior" => Ok(Self::Senior),
            other => Err(TailTalkError::InvalidProfile(format!(
                "unknown life stage: {other:?}"
            ))),
        }
    }
}

/// Biological sex of the dog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
}

/// The household's dog.
///
/// Created once at onboarding and persisted in the local key-value store.
/// When the household shares a pack, the same profile is published under
/// the pack code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DogProfile {
    /// Dog's name.
    pub name: String,
    /// Breed, free text.
    pub breed: String,
    /// Age bracket driving decay rates.
    pub life_stage: LifeStage,
    /// Biological sex, if given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    /// Portrait URL or data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Pack this dog is shared in. Immutable once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<PackCode>,
}

impl DogProfile {
    /// Creates a profile with only the required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, breed: impl Into<String>, life_stage: LifeStage) -> Self {
        Self {
            name: name.into(),
            breed: breed.into(),
            life_stage,
            sex: None,
            avatar_url: None,
            pack_id: None,
        }
    }

    /// Checks required fields.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidProfile`] if the name or breed is
    /// blank.
    pub fn validate(&self) -> Result<(), TailTalkError> {
        if self.name.trim().is_empty() {
            return Err(TailTalkError::InvalidProfile("name is required".to_string()));
        }
        if self.breed.trim().is_empty() {
            return Err(TailTalkError::InvalidProfile("breed is required".to_string()));
        }
        Ok(())
    }
}

/// Permission level of a pack member on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Created the pack; may edit the profile.
    Admin,
    /// Joined via a pack code.
    Member,
}

/// A human in the household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    /// Local identifier.
    pub id: String,
    /// Display name, stamped on events as `loggedBy`.
    pub name: String,
    /// Permission level.
    pub role: UserRole,
    /// Optional avatar emoji.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}
