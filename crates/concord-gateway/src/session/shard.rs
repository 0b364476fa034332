//! Shard assignment

use serde_json::Value;

use concord_core::Snowflake;

/// Why a shard claim was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardError {
    #[error("Invalid shard payload (not a list of integers)")]
    NotIntegers,

    #[error("Invalid shard payload (length)")]
    Length,

    #[error("Invalid shard payload (shard_count < 1)")]
    ZeroCount,

    #[error("Invalid shard payload (id > count)")]
    IdOutOfRange,
}

/// The partition of a bot's guilds a session is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardInfo {
    pub shard_id: u32,
    pub shard_count: u32,
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self::UNSHARDED
    }
}

impl ShardInfo {
    pub const UNSHARDED: Self = Self {
        shard_id: 0,
        shard_count: 1,
    };

    /// Parse the optional `shard` field of IDENTIFY
    ///
    /// `shard_id == shard_count` passes; only `shard_id > shard_count`
    /// is rejected.
    pub fn parse(raw: Option<&Value>) -> Result<Self, ShardError> {
        let items = match raw {
            None | Some(Value::Null) => return Ok(Self::UNSHARDED),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ShardError::NotIntegers),
        };

        let numbers = items
            .iter()
            .map(Value::as_i64)
            .collect::<Option<Vec<i64>>>()
            .ok_or(ShardError::NotIntegers)?;

        let [shard_id, shard_count] = numbers[..] else {
            return Err(ShardError::Length);
        };

        if shard_count < 1 {
            return Err(ShardError::ZeroCount);
        }
        if shard_id > shard_count {
            return Err(ShardError::IdOutOfRange);
        }

        Ok(Self {
            shard_id: u32::try_from(shard_id).map_err(|_| ShardError::NotIntegers)?,
            shard_count: u32::try_from(shard_count).map_err(|_| ShardError::NotIntegers)?,
        })
    }

    #[must_use]
    pub fn is_sharded(&self) -> bool {
        self.shard_count > 1
    }

    /// Whether this shard is responsible for the given guild
    #[must_use]
    pub fn owns(&self, guild_id: Snowflake) -> bool {
        !self.is_sharded() || guild_id.shard_for(self.shard_count) == self.shard_id
    }

    /// Shards needed so no shard exceeds `per_shard` guilds
    #[must_use]
    pub fn recommended_count(guild_count: usize, per_shard: usize) -> usize {
        guild_count.div_ceil(per_shard.max(1)).max(1)
    }

    #[must_use]
    pub fn as_pair(&self) -> [u32; 2] {
        [self.shard_id, self.shard_count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_is_unsharded() {
        assert_eq!(ShardInfo::parse(None).unwrap(), ShardInfo::UNSHARDED);
        assert_eq!(ShardInfo::parse(Some(&Value::Null)).unwrap(), ShardInfo::UNSHARDED);
    }

    #[test]
    fn test_parse_valid() {
        let shard = ShardInfo::parse(Some(&json!([1, 4]))).unwrap();
        assert_eq!(shard.as_pair(), [1, 4]);
        assert!(shard.is_sharded());

        // id equal to count is tolerated
        assert!(ShardInfo::parse(Some(&json!([2, 2]))).is_ok());
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(ShardInfo::parse(Some(&json!([3, 2]))), Err(ShardError::IdOutOfRange));
        assert_eq!(ShardInfo::parse(Some(&json!([0, 0]))), Err(ShardError::ZeroCount));
        assert_eq!(ShardInfo::parse(Some(&json!([0]))), Err(ShardError::Length));
        assert_eq!(ShardInfo::parse(Some(&json!([0, 1, 2]))), Err(ShardError::Length));
        assert_eq!(ShardInfo::parse(Some(&json!(["a", 1]))), Err(ShardError::NotIntegers));
        assert_eq!(ShardInfo::parse(Some(&json!("0,1"))), Err(ShardError::NotIntegers));
        assert_eq!(ShardInfo::parse(Some(&json!([-1, 2]))), Err(ShardError::NotIntegers));
    }

    #[test]
    fn test_owns() {
        let unsharded = ShardInfo::UNSHARDED;
        assert!(unsharded.owns(Snowflake::new(7)));

        let shard = ShardInfo {
            shard_id: 1,
            shard_count: 2,
        };
        assert!(shard.owns(Snowflake::new(7)));
        assert!(!shard.owns(Snowflake::new(8)));
    }

    #[test]
    fn test_recommended_count() {
        assert_eq!(ShardInfo::recommended_count(0, 2500), 1);
        assert_eq!(ShardInfo::recommended_count(2500, 2500), 1);
        assert_eq!(ShardInfo::recommended_count(2501, 2500), 2);
        assert_eq!(ShardInfo::recommended_count(3000, 2500), 2);
    }
}
