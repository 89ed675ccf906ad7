//! Channel and event name definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use taskhub_core::types::UserId;

/// Private per-user channel, `user.<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelName {
    /// Owner of the channel.
    pub user_id: UserId,
}

impl ChannelName {
    /// Channel of `user_id`.
    pub fn for_user(user_id: UserId) -> Self {
        Self { user_id }
    }

    /// Parses `user.<id>` or its wire form `private-user.<id>`.
    pub fn parse(channel: &str) -> Option<Self> {
        let name = channel.strip_prefix("private-").unwrap_or(channel);
        let id = name.strip_prefix("user.")?;
        id.parse().ok().map(Self::for_user)
    }

    /// Name as seen by the wire protocol.
    pub fn wire_name(&self) -> String {
        format!("private-{self}")
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user.{}", self.user_id)
    }
}

/// The named events listened for on the user channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    /// `.task.created`
    TaskCreated,
    /// `.task.submitted`
    TaskSubmitted,
    /// `.user.followed`
    UserFollowed,
}

impl EventName {
    /// Every listened event.
    pub const ALL: [EventName; 3] = [Self::TaskCreated, Self::TaskSubmitted, Self::UserFollowed];

    /// Parses an event name with or without the leading namespace dot.
    pub fn parse(name: &str) -> Option<Self> {
        match name.strip_prefix('.').unwrap_or(name) {
            "task.created" => Some(Self::TaskCreated),
            "task.submitted" => Some(Self::TaskSubmitted),
            "user.followed" => Some(Self::UserFollowed),
            _ => None,
        }
    }

    /// Listener name, including the leading dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => ".task.created",
            Self::TaskSubmitted => ".task.submitted",
            Self::UserFollowed => ".user.followed",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_forms() {
        let channel = ChannelName::for_user(UserId::new(7));
        assert_eq!(channel.to_string(), "user.7");
        assert_eq!(channel.wire_name(), "private-user.7");
        assert_eq!(ChannelName::parse("private-user.7"), Some(channel));
        assert_eq!(ChannelName::parse("user.7"), Some(channel));
        assert_eq!(ChannelName::parse("presence-user.7"), None);
        assert_eq!(ChannelName::parse("user.abc"), None);
    }

    #[test]
    fn test_event_name_parsing() {
        assert_eq!(EventName::parse(".task.created"), Some(EventName::TaskCreated));
        assert_eq!(EventName::parse("user.followed"), Some(EventName::UserFollowed));
        assert_eq!(EventName::parse("pusher:ping"), None);
        for name in EventName::ALL {
            assert_eq!(EventName::parse(name.as_str()), Some(name));
        }
    }
}
