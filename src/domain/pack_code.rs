//! Shareable pack codes.
//!
//! A [`PackCode`] is six characters drawn uniformly from an alphabet with
//! the look-alikes `I`, `O`, `0` and `1` removed, so it can be read aloud
//! or typed from a screenshot. Collisions are not checked locally.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::TailTalkError;

/// Characters a pack code may contain.
pub const PACK_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a pack code.
pub const PACK_CODE_LEN: usize = 6;

/// Code identifying a household sharing one dog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "K7RM2Q")]
pub struct PackCode(String);

impl PackCode {
    /// Generates a fresh random code.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generates a code from the given random source.
    #[must_use]
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..PACK_CODE_LEN)
            .filter_map(|_| PACK_ALPHABET.choose(rng))
            .map(|&b| char::from(b))
            .collect();
        Self(code)
    }

    /// Parses user input, ignoring surrounding whitespace and case.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidPackCode`] if the input is not six
    /// characters from [`PACK_ALPHABET`].
    pub fn parse(input: &str) -> Result<Self, TailTalkError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = code.len() == PACK_CODE_LEN && code.bytes().all(|b| PACK_ALPHABET.contains(&b));
        if !valid {
            return Err(TailTalkError::InvalidPackCode(input.to_string()));
        }
        Ok(Self(code))
    }

    /// Picks the code to use when several sources offer one.
    ///
    /// A code from the current invitation link wins over the one cached in
    /// the local profile.
    ///
    /// # Errors
    ///
    /// Returns [`TailTalkError::InvalidPackCode`] if the link code is
    /// present but malformed.
    pub fn select(link: Option<&str>, cached: Option<&Self>) -> Result<Option<Self>, TailTalkError> {
        match link.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Self::parse(raw).map(Some),
            None => Ok(cached.cloned()),
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackCode {
    type Err = TailTalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackCode {
    type Error = TailTalkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackCode> for String {
    fn from(code: PackCode) -> Self {
        code.0
    }
}
