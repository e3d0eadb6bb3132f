use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt, ops::Deref, str::FromStr};
use uuid::Uuid;

/// Length of generated restaurant and item identifiers.
pub const SHORT_ID_LEN: usize = 6;

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::from(s))
            }
        }
    };
}

define_id_type!(RestaurantId);
define_id_type!(CategoryId);
define_id_type!(ItemId);

impl RestaurantId {
    pub fn generate() -> Self {
        Self(short_id())
    }
}

impl ItemId {
    pub fn generate() -> Self {
        Self(short_id())
    }
}

impl CategoryId {
    /// Category ids are derived from the display name rather than generated,
    /// so two names that normalise identically address the same category.
    pub fn from_name(name: &str) -> Self {
        Self(name.to_lowercase().replace(' ', "_"))
    }
}

/// Random hex identifier truncated to [`SHORT_ID_LEN`] characters.
///
/// Collisions are possible; callers that hold the whole document retry on a
/// local clash, nothing checks beyond that.
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}
