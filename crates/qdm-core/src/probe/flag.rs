//! Three-valued capability flag.

use serde::Serialize;
use std::fmt;

/// Whether the server supports a capability, as far as the probe could tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    #[default]
    Unknown,
    Allowed,
    NotAllowed,
}

impl FeatureFlag {
    pub fn is_allowed(self) -> bool {
        self == FeatureFlag::Allowed
    }
}

impl fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeatureFlag::Unknown => "unknown",
            FeatureFlag::Allowed => "allowed",
            FeatureFlag::NotAllowed => "not allowed",
        };
        f.write_str(s)
    }
}
