//! Macro for implementing Display and FromStr for status enums
//!
//! ```rust
//! use spillway_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LinkState {
//!     Up,
//!     Down,
//! }
//!
//! impl_domain_status_conversions!(LinkState {
//!     Up => "up",
//!     Down => "down",
//! });
//!
//! assert_eq!("UP".parse::<LinkState>().unwrap(), LinkState::Up);
//! ```

/// Implements Display and case-insensitive FromStr for a fieldless enum
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Filling,
        Flushing,
    }

    impl_domain_status_conversions!(Phase {
        Filling => "filling",
        Flushing => "flushing",
    });

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(Phase::Filling.to_string(), "filling");
        assert_eq!(Phase::Flushing.to_string(), "flushing");
    }

    #[test]
    fn test_fromstr_ignores_case() {
        assert_eq!(Phase::from_str("FLUSHING").unwrap(), Phase::Flushing);
        assert_eq!(Phase::from_str("Filling").unwrap(), Phase::Filling);
    }

    #[test]
    fn test_fromstr_rejects_unknown() {
        let err = Phase::from_str("draining").unwrap_err();
        assert!(err.contains("Invalid Phase: draining"));
        assert!(Phase::from_str("").is_err());
    }
}
