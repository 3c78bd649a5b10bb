//! The small, closed architecture enum used throughout the package database,
//! the provider, and the solver.

use std::fmt;
use std::str::FromStr;

/// A target architecture.
///
/// `Invalid` is a reserved value used only transiently while parsing
/// `desc.xml`/repository index entries; it must never appear in a
/// committed database row or a resolved installation-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Architecture {
    /// 64-bit x86.
    Amd64,
    /// 32-bit x86.
    I386,
    /// Parsing placeholder; never a valid terminal state.
    Invalid,
}

impl Architecture {
    /// Whether this value is a real, installable architecture.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Amd64 => "amd64",
            Self::I386 => "i386",
            Self::Invalid => "invalid",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Architecture {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd64" => Ok(Self::Amd64),
            "i386" => Ok(Self::I386),
            other => Err(crate::error::Error::InvalidArchitecture {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Architecture;

    #[test]
    fn round_trips_through_display_and_parse() {
        for arch in [Architecture::Amd64, Architecture::I386] {
            let s = arch.to_string();
            assert_eq!(s.parse::<Architecture>().unwrap(), arch);
        }
    }

    #[test]
    fn invalid_is_not_parseable() {
        assert!("invalid".parse::<Architecture>().is_err());
        assert!("arm64".parse::<Architecture>().is_err());
    }

    #[test]
    fn invalid_is_not_valid() {
        assert!(!Architecture::Invalid.is_valid());
        assert!(Architecture::Amd64.is_valid());
    }
}
