//! Build version numbers
//!
//! Four-part `generation.version.patch.commit` numbers. Archives write them
//! dotted (`0.456.1.2345`); some older metadata uses `0, 456, 1, 2345`.
//!
//! Author: Moroya Sakamoto

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Structured build version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Version {
    pub generation: u32,
    pub version: u32,
    pub patch: u32,
    pub commit: u32,
}

impl Version {
    pub fn new(generation: u32, version: u32, patch: u32, commit: u32) -> Self {
        Self {
            generation,
            version,
            patch,
            commit,
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::Version(String::from(s));
        let mut parts = s.split([',', '.']).map(|p| p.trim().parse::<u32>());
        let mut next = || parts.next().ok_or_else(bad)?.map_err(|_| bad());
        let version = Version {
            generation: next()?,
            version: next()?,
            patch: next()?,
            commit: next()?,
        };
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.generation, self.version, self.patch, self.commit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        let v: Version = "0.456.1.2345".parse().unwrap();
        assert_eq!(v, Version::new(0, 456, 1, 2345));
    }

    #[test]
    fn test_parse_comma_separated() {
        let v: Version = "0, 456, 1, 2345".parse().unwrap();
        assert_eq!(v, Version::new(0, 456, 1, 2345));
    }

    #[test]
    fn test_parse_rejects_short_and_long() {
        assert!("0.456.1".parse::<Version>().is_err());
        assert!("0.456.1.2.3".parse::<Version>().is_err());
        assert!("a.b.c.d".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn test_display_is_dotted() {
        assert_eq!(Version::new(0, 600, 0, 6000123).to_string(), "0.600.0.6000123");
    }

    #[test]
    fn test_ordering_follows_fields() {
        assert!(Version::new(0, 455, 9, 9) < Version::new(0, 456, 0, 0));
        assert!(Version::new(0, 456, 0, 1) > Version::new(0, 456, 0, 0));
    }
}
