//! Snowflake ID - Discord-compatible 64-bit identifier
//!
//! The gateway never mints ids; it only reads them from collaborator
//! snapshots, compares them, and partitions guilds across shards with them.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Discord-compatible Snowflake ID (64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(i64);

impl Snowflake {
    /// Create a new Snowflake from a raw i64 value
    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[inline]
    pub const fn into_inner(self) -> i64 {
        self.0
    }

    /// Check if the Snowflake is zero (uninitialized)
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Shard partition this id falls into for a given shard count.
    ///
    /// Partitioning is a plain modulo over the raw id. A shard count of
    /// zero is treated as a single shard.
    #[inline]
    pub fn shard_for(&self, shard_count: u32) -> u32 {
        let count = u64::from(shard_count.max(1));
        (self.0.unsigned_abs() % count) as u32
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Result<Self, SnowflakeParseError> {
        s.trim()
            .parse::<i64>()
            .map(Snowflake)
            .map_err(|_| SnowflakeParseError::InvalidFormat)
    }
}

/// Error when parsing a Snowflake from string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SnowflakeParseError {
    #[error("invalid snowflake format")]
    InvalidFormat,
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Snowflake {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<Snowflake> for i64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snowflake::parse(s)
    }
}

// Serialized as a string so JavaScript clients keep full precision
impl Serialize for Snowflake {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

struct SnowflakeVisitor;

impl de::Visitor<'_> for SnowflakeVisitor {
    type Value = Snowflake;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or integer snowflake")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Snowflake, E> {
        Ok(Snowflake(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Snowflake, E> {
        i64::try_from(value)
            .map(Snowflake)
            .map_err(|_| E::custom("snowflake out of range"))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Snowflake, E> {
        Snowflake::parse(value).map_err(|_| E::custom("invalid snowflake string"))
    }
}

// Clients send ids either as strings or as bare integers
impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_creation() {
        let sf = Snowflake::new(123_456_789);
        assert_eq!(sf.into_inner(), 123_456_789);
        assert!(!sf.is_zero());
        assert!(Snowflake::default().is_zero());
    }

    #[test]
    fn test_snowflake_parse() {
        assert_eq!(Snowflake::parse("42").unwrap(), Snowflake::new(42));
        assert_eq!(Snowflake::parse(" 42 ").unwrap(), Snowflake::new(42));
        assert!(Snowflake::parse("forty-two").is_err());
    }

    #[test]
    fn test_shard_partition() {
        let guild = Snowflake::new(10);
        assert_eq!(guild.shard_for(1), 0);
        assert_eq!(guild.shard_for(3), 1);
        assert_eq!(guild.shard_for(4), 2);
        // zero shards behaves like a single shard
        assert_eq!(guild.shard_for(0), 0);
    }

    #[test]
    fn test_snowflake_serialize_json() {
        let sf = Snowflake::new(123_456_789_012_345_678);
        let json = serde_json::to_string(&sf).unwrap();
        assert_eq!(json, "\"123456789012345678\"");
    }

    #[test]
    fn test_snowflake_deserialize_string_or_number() {
        let from_str: Snowflake = serde_json::from_str("\"987\"").unwrap();
        let from_num: Snowflake = serde_json::from_str("987").unwrap();
        assert_eq!(from_str, from_num);

        assert!(serde_json::from_str::<Snowflake>("\"abc\"").is_err());
        assert!(serde_json::from_str::<Snowflake>("true").is_err());
    }
}
