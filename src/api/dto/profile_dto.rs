//! Profile DTOs.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::{DogProfile, LifeStage, PackCode, Sex};
use crate::error::TailTalkError;

/// Request body for `PUT /profile`.
///
/// The life stage arrives as a string so an unknown value is reported as
/// an invalid profile rather than a malformed body.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    /// Dog's name.
    pub name: String,
    /// Breed, free text.
    pub breed: String,
    /// `puppy`, `adult` or `senior`.
    #[serde(alias = "life_stage")]
    pub life_stage: String,
    /// Biological sex.
    #[serde(default)]
    pub sex: Option<Sex>,
    /// Portrait URL or data URI.
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
    /// Pack code; may only repeat the existing one.
    #[serde(default, alias = "pack_id")]
    pub pack_id: Option<String>,
}

impl TryFrom<ProfileRequest> for DogProfile {
    type Error = TailTalkError;

    fn try_from(req: ProfileRequest) -> Result<Self, Self::Error> {
        let life_stage: LifeStage = req.life_stage.parse()?;
        let pack_id = req
            .pack_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(PackCode::parse)
            .transpose()?;
        let mut profile = Self::new(req.name, req.breed, life_stage);
        profile.sex = req.sex;
        profile.avatar_url = req.avatar_url;
        profile.pack_id = pack_id;
        Ok(profile)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn request(stage: &str) -> ProfileRequest {
        ProfileRequest {
            name: "Biscuit".to_string(),
            breed: "Beagle".to_string(),
            life_stage: stage.to_string(),
            sex: Some(Sex::Female),
            avatar_url: None,
            pack_id: Some(String::new()),
        }
    }

    #[test]
    fn converts_valid_request() {
        let Ok(profile) = DogProfile::try_from(request("Puppy")) else {
            panic!("conversion failed");
        };
        assert_eq!(profile.life_stage, LifeStage::Puppy);
        assert_eq!(profile.sex, Some(Sex::Female));
        assert!(profile.pack_id.is_none());
    }

    #[test]
    fn unknown_stage_is_invalid_profile() {
        assert!(matches!(
            DogProfile::try_from(request("teen")),
            Err(TailTalkError::InvalidProfile(_))
        ));
    }
}
