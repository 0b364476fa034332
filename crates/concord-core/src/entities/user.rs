//! User entity - the account behind a gateway session

use crate::value_objects::Snowflake;

/// User account snapshot, as resolved from a token lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub verified: bool,
    pub bot: bool,
}

impl User {
    /// Create a new non-bot User with required fields
    pub fn new(id: Snowflake, username: impl Into<String>, discriminator: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            discriminator: discriminator.into(),
            avatar: None,
            email: None,
            verified: false,
            bot: false,
        }
    }

    /// Builder: mark this account as a bot
    pub fn into_bot(mut self) -> Self {
        self.bot = true;
        self
    }

    /// Get the full tag: username#discriminator
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }

    /// Check if user is a bot account
    #[inline]
    pub fn is_bot(&self) -> bool {
        self.bot
    }

    /// Case-insensitive username prefix match, used by member queries
    pub fn username_starts_with(&self, prefix: &str) -> bool {
        self.username
            .to_lowercase()
            .starts_with(&prefix.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_tag() {
        let user = User::new(Snowflake::new(1), "testuser", "1234");
        assert_eq!(user.tag(), "testuser#1234");
        assert!(!user.is_bot());
    }

    #[test]
    fn test_into_bot() {
        let bot = User::new(Snowflake::new(2), "robot", "0001").into_bot();
        assert!(bot.is_bot());
    }

    #[test]
    fn test_username_prefix() {
        let user = User::new(Snowflake::new(3), "Alice", "0001");
        assert!(user.username_starts_with("al"));
        assert!(user.username_starts_with(""));
        assert!(!user.username_starts_with("bob"));
    }
}
