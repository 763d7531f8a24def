//! Message entity - a message posted to a channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Member, User};
use crate::value_objects::Snowflake;

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    pub size: u64,
    pub url: String,
    pub proxy_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub tts: bool,
    pub mention_everyone: bool,
    pub mentions: Vec<User>,
    pub mention_roles: Vec<Snowflake>,
    pub attachments: Vec<Attachment>,
    pub pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<Snowflake>,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl Message {
    /// Whether the message was sent in a direct message channel
    #[inline]
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }

    /// Whether the given user is mentioned explicitly
    pub fn mentions_user(&self, user_id: Snowflake) -> bool {
        self.mentions.iter().any(|u| u.id == user_id)
    }

    pub fn author_id(&self) -> Option<Snowflake> {
        self.author.as_ref().map(|a| a.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_decode() {
        let msg: Message = serde_json::from_str(
            r#"{
                "id": "100",
                "channel_id": "41",
                "guild_id": "1",
                "author": {"id": "9", "username": "bob"},
                "content": "hi <@5>",
                "mentions": [{"id": "5", "username": "eve"}],
                "timestamp": "2020-01-01T12:00:00.000000+00:00",
                "edited_timestamp": null,
                "type": 0
            }"#,
        )
        .unwrap();

        assert_eq!(msg.id, Snowflake::new(100));
        assert_eq!(msg.author_id(), Some(Snowflake::new(9)));
        assert!(msg.mentions_user(Snowflake::new(5)));
        assert!(!msg.is_direct());
        assert!(msg.edited_timestamp.is_none());
    }
}
