use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $inner:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            #[must_use]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    TrackId,
    i64,
    "Identifier of a track in the external catalog (the embedding file stem)."
);
define_id!(
    VectorId,
    usize,
    "Dense zero-based position of a vector inside a built index."
);

impl TrackId {
    /// Parse a track id from a file stem such as `000694`.
    ///
    /// Leading zeros are tolerated; anything that is not a plain decimal
    /// integer yields `None`.
    #[must_use]
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let trimmed = stem.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        trimmed.parse::<i64>().ok().map(Self)
    }
}

impl VectorId {
    /// The id as stored in the `vector_metadata` table.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_from_padded_stem() {
        assert_eq!(TrackId::from_file_stem("000694"), Some(TrackId::new(694)));
        assert_eq!(TrackId::from_file_stem("2"), Some(TrackId::new(2)));
    }

    #[test]
    fn test_track_id_rejects_non_numeric_stem() {
        assert_eq!(TrackId::from_file_stem("track_2"), None);
        assert_eq!(TrackId::from_file_stem(""), None);
        assert_eq!(TrackId::from_file_stem("-4"), None);
    }

    #[test]
    fn test_vector_id_display() {
        let id = VectorId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn test_id_ordering() {
        assert!(TrackId::new(1) < TrackId::new(2));
        assert!(VectorId::new(0) < VectorId::new(1));
    }
}
