use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

name_newtype!(RoomId);
name_newtype!(PlayerName);

/// Name the authority reserves for the narrator, who sees every role and never plays.
pub const NARRATOR_NAME: &str = "god";

impl PlayerName {
    pub fn is_narrator(&self) -> bool {
        self.0 == NARRATOR_NAME
    }
}

pub const MIN_PLAYERS_FLOOR: u8 = 3;
pub const MAX_PLAYERS_CEILING: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mafia,
    Doctor,
    Detective,
    Villager,
}

impl Role {
    /// Parses a role as the authority spells it. Anything else is treated as unassigned.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mafia" => Some(Self::Mafia),
            "doctor" => Some(Self::Doctor),
            "detective" => Some(Self::Detective),
            "villager" => Some(Self::Villager),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mafia => "mafia",
            Self::Doctor => "doctor",
            Self::Detective => "detective",
            Self::Villager => "villager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Night,
    Day,
    Ended,
    #[default]
    #[serde(other)]
    Waiting,
}

impl Phase {
    pub fn is_round(self) -> bool {
        matches!(self, Self::Night | Self::Day)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Waiting => "waiting",
            Self::Night => "night",
            Self::Day => "day",
            Self::Ended => "ended",
        };
        f.write_str(label)
    }
}
