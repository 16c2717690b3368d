use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CredoError;

static UNIPROT_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2})$")
        .expect("UniProt accession pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniprotAccession(String);

impl UniprotAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniprotAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UniprotAccession {
    type Err = CredoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        if !UNIPROT_ACCESSION.is_match(&normalized) {
            return Err(CredoError::InvalidUniprotId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl AsRef<str> for UniprotAccession {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reference from an internal SIFt node to one of its two children.
///
/// Stored rows encode the kind in the sign of the position (negative for
/// internal nodes); only [`ChildRef::from_stored`] looks at that sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "node", rename_all = "lowercase")]
pub enum ChildRef {
    Internal(i64),
    Leaf(i64),
}

impl ChildRef {
    pub(crate) fn from_stored(position: i64) -> Self {
        if position < 0 {
            ChildRef::Internal(position)
        } else {
            ChildRef::Leaf(position)
        }
    }

    pub fn position(self) -> i64 {
        match self {
            ChildRef::Internal(position) | ChildRef::Leaf(position) => position,
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, ChildRef::Leaf(_))
    }
}

impl fmt::Display for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildRef::Internal(position) => write!(f, "internal:{position}"),
            ChildRef::Leaf(position) => write!(f, "leaf:{position}"),
        }
    }
}
