use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub fn all() -> &'static [$name] {
                &[$(Self::$variant),+]
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Arm {
    Pending => "pending",
    Intervention => "intervention",
    Control => "control",
    Excluded => "excluded",
});

impl Default for Arm {
    fn default() -> Self {
        Self::Pending
    }
}

impl Arm {
    /// True for the two randomised arms.
    pub fn is_randomised(&self) -> bool {
        matches!(self, Self::Intervention | Self::Control)
    }
}

// Variant order is evaluation order.
str_enum!(ExclusionReason {
    Pilot => "Pilot",
    NoPaperDate => "No date for retracted paper",
    PublishedBefore2000 => "Published before 2000",
    NoNoticeDate => "No date for retraction notice",
    NoContactableAuthors => "No contactable authors",
});

str_enum!(Stratification {
    Static => "static",
    Deciles => "deciles",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn arm_round_trip() {
        for (variant, s) in [
            (Arm::Pending, "pending"),
            (Arm::Intervention, "intervention"),
            (Arm::Control, "control"),
            (Arm::Excluded, "excluded"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Arm::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn exclusion_reason_labels() {
        assert_eq!(ExclusionReason::Pilot.as_str(), "Pilot");
        assert_eq!(
            ExclusionReason::from_str("No date for retracted paper").unwrap(),
            ExclusionReason::NoPaperDate
        );
        assert_eq!(
            ExclusionReason::PublishedBefore2000.to_string(),
            "Published before 2000"
        );
    }

    #[test]
    fn exclusion_reasons_listed_in_priority_order() {
        assert_eq!(
            ExclusionReason::all(),
            &[
                ExclusionReason::Pilot,
                ExclusionReason::NoPaperDate,
                ExclusionReason::PublishedBefore2000,
                ExclusionReason::NoNoticeDate,
                ExclusionReason::NoContactableAuthors,
            ]
        );
    }

    #[test]
    fn only_treatment_arms_are_randomised() {
        assert!(Arm::Intervention.is_randomised());
        assert!(Arm::Control.is_randomised());
        assert!(!Arm::Pending.is_randomised());
        assert!(!Arm::Excluded.is_randomised());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Arm::from_str("i").is_err());
        assert!(ExclusionReason::from_str("pilot").is_err());
        assert!(Stratification::from_str("").is_err());
    }
}
