//! Branch name -> environment slug derivation.
//!
//! A slug is the primary key of an environment. It has to survive being used
//! as a directory name, a compose project name and a DNS label, so the rule is
//! deliberately narrow: `[a-z0-9-]`, no leading/trailing `-`, bounded length.
//!
//! Distinct branches can collapse to the same slug (`feat/Login` and
//! `feat-login`). They then address the same environment and an `up` on either
//! one redeploys it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Upper bound on slug length; leaves room for prefixes/suffixes such as
/// `staging-<slug>-api` inside a 63-char DNS label.
pub const MAX_SLUG_LEN: usize = 40;

/// A validated environment identifier.
///
/// Deserialisation only accepts values that are already normalised, so a
/// hand-edited state file cannot hold a key that no command can address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a git branch name.
    ///
    /// ```
    /// use staging_core::domain::Slug;
    ///
    /// let slug = Slug::from_branch("feature/Feat-Login").unwrap();
    /// assert_eq!(slug.as_str(), "feature-feat-login");
    /// ```
    pub fn from_branch(branch: &str) -> Result<Self, DomainError> {
        let mut out = String::with_capacity(branch.len());
        let mut in_run = false;

        for ch in branch.chars().flat_map(char::to_lowercase) {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
                out.push(ch);
                in_run = false;
            } else if !in_run {
                out.push('-');
                in_run = true;
            }
        }

        let trimmed = out.trim_matches('-');
        // Only ASCII survives the filter, so byte truncation is char-safe.
        let truncated = &trimmed[..trimmed.len().min(MAX_SLUG_LEN)];
        let slug = truncated.trim_end_matches('-');

        if slug.is_empty() {
            return Err(DomainError::InvalidBranch {
                branch: branch.to_string(),
                reason: "no letters or digits left after normalisation".into(),
            });
        }

        Ok(Self(slug.to_string()))
    }

    /// Wrap an already-normalised slug (e.g. one typed on the command line).
    ///
    /// The value is re-derived, so `Slug::parse(s)` equals `Slug::from_branch(s)`
    /// and an arbitrary string can never produce an invalid key.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        Self::from_branch(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let derived = Self::from_branch(&value)?;
        if derived.0 != value {
            return Err(DomainError::NonCanonicalSlug {
                value,
                expected: derived.0,
            });
        }
        Ok(derived)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
