#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

/// One immutable version of a document body, written as `<generation>-<hash>`.
///
/// Ordering compares the generation first and the hash second, which is the
/// tiebreak used when picking a winning revision.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision {
    generation: u64,
    hash: String,
}

impl Revision {
    pub fn try_new(generation: u64, hash: impl Into<String>) -> Result<Self, RevisionError> {
        let hash = hash.into();
        if generation == 0 {
            return Err(RevisionError::InvalidGeneration);
        }
        validate_hash(&hash)?;
        Ok(Self { generation, hash })
    }

    pub fn parse(value: &str) -> Result<Self, RevisionError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RevisionError::Empty);
        }
        let Some((generation, hash)) = value.split_once('-') else {
            return Err(RevisionError::MissingSeparator);
        };
        let generation = generation
            .parse::<u64>()
            .map_err(|_| RevisionError::InvalidGeneration)?;
        Self::try_new(generation, hash)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The revision that follows this one on the same branch.
    pub fn child(&self, hash: impl Into<String>) -> Result<Self, RevisionError> {
        let generation = self
            .generation
            .checked_add(1)
            .ok_or(RevisionError::InvalidGeneration)?;
        Self::try_new(generation, hash)
    }

    /// The first revision of a new document.
    pub fn first(hash: impl Into<String>) -> Result<Self, RevisionError> {
        Self::try_new(1, hash)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.hash)
    }
}

impl FromStr for Revision {
    type Err = RevisionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevisionError {
    Empty,
    MissingSeparator,
    InvalidGeneration,
    InvalidHash,
}

impl RevisionError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "revision must not be empty",
            Self::MissingSeparator => "revision must look like <generation>-<hash>",
            Self::InvalidGeneration => "revision generation must be a positive integer",
            Self::InvalidHash => "revision hash must be non-empty alphanumeric text",
        }
    }
}

fn validate_hash(hash: &str) -> Result<(), RevisionError> {
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RevisionError::InvalidHash);
    }
    Ok(())
}
