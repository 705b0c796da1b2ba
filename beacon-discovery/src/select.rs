//! Server selection modes.

use std::fmt;
use std::str::FromStr;

use crate::error::DiscoveryError;

/// How [`Discovery::get`](crate::Discovery::get) picks a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SelectMode {
    /// Uniform pick from the discovery's own random source.
    Random = 0,
    /// Cycle through the list from a persistent cursor.
    RoundRobin = 1,
}

impl SelectMode {
    /// Wire name of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for SelectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for SelectMode {
    type Error = DiscoveryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Random),
            1 => Ok(Self::RoundRobin),
            other => Err(DiscoveryError::UnsupportedSelectionMode(other.to_string())),
        }
    }
}

impl FromStr for SelectMode {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            other => Err(DiscoveryError::UnsupportedSelectionMode(other.to_string())),
        }
    }
}
