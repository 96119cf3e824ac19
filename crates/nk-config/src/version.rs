//! Config schema version tags.

use anyhow::Result;
use nk_core::AppError;
use serde_json::Value;

/// Totally ordered schema version tag.
///
/// Serialized into config documents as a decimal string under the top-level
/// `version` key. Integer tags are accepted on read for hand-edited files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigVersion(u32);

impl ConfigVersion {
    pub const V1: Self = Self(1);
    pub const V2: Self = Self(2);
    pub const V3: Self = Self(3);
    pub const V4: Self = Self(4);
    pub const V5: Self = Self(5);
    pub const V6: Self = Self(6);
    pub const V7: Self = Self(7);

    /// First version whose settings are split into user and project documents.
    pub const FIRST_SPLIT: Self = Self::V7;

    pub const fn new(tag: u32) -> Self {
        Self(tag)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// The version immediately after this one.
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Read the `version` tag embedded in a config document.
    pub fn from_document(document: &Value) -> Result<Self> {
        let tag = document.get("version").ok_or_else(|| {
            AppError::UnknownVersion("<missing>".to_string())
        })?;
        let parsed = match tag {
            Value::String(s) => s.trim().parse::<u32>().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        };
        parsed
            .map(Self)
            .ok_or_else(|| AppError::UnknownVersion(tag.to_string()).into())
    }

    /// The tag as it is written into documents.
    pub fn to_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl std::fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ConfigVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| AppError::UnknownVersion(s.to_string()).into())
    }
}
