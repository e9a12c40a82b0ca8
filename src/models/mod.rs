pub mod analysis;
pub mod document;
pub mod review;
pub mod session;

pub use analysis::*;
pub use document::*;
pub use review::*;
pub use session::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a persisted enum string does not match any known variant.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid value '{value}' for {field}")]
pub struct InvalidEnumValue {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnumValue {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ReviewStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
});

str_enum!(ExemptionCategory {
    AttorneyClient => "attorney_client",
    Personnel => "personnel",
    Deliberative => "deliberative",
});

impl ExemptionCategory {
    /// The full fixed catalog, in canonical order.
    pub const ALL: [ExemptionCategory; 3] = [
        ExemptionCategory::AttorneyClient,
        ExemptionCategory::Personnel,
        ExemptionCategory::Deliberative,
    ];
}

/// Confidence attached to a model determination. Ordinal: Low < Medium < High.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for ConfidenceLevel {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(InvalidEnumValue {
                field: "ConfidenceLevel".into(),
                value: s.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn confidence_is_ordinal() {
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
    }

    #[test]
    fn confidence_round_trips_through_str() {
        for level in [
            ConfidenceLevel::Low,
            ConfidenceLevel::Medium,
            ConfidenceLevel::High,
        ] {
            assert_eq!(ConfidenceLevel::from_str(level.as_str()).unwrap(), level);
        }
    }

    #[test]
    fn confidence_rejects_unknown_value() {
        let err = ConfidenceLevel::from_str("certain").unwrap_err();
        assert_eq!(err.value, "certain");
    }

    #[test]
    fn review_status_serializes_snake_case() {
        let json = serde_json::to_string(&ReviewStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn exemption_catalog_is_fixed() {
        assert_eq!(ExemptionCategory::ALL.len(), 3);
        assert_eq!(ExemptionCategory::AttorneyClient.as_str(), "attorney_client");
        assert_eq!(
            ExemptionCategory::from_str("deliberative").unwrap(),
            ExemptionCategory::Deliberative
        );
    }
}
