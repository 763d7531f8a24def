//! Custom guild emoji

use serde::{Deserialize, Serialize};

use crate::entities::User;
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Emoji {
    /// `None` for unicode emojis
    pub id: Option<Snowflake>,
    pub name: Option<String>,
    pub roles: Vec<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub require_colons: bool,
    pub managed: bool,
    pub animated: bool,
}

impl Emoji {
    /// Format usable inside message content
    pub fn mention(&self) -> String {
        let name = self.name.as_deref().unwrap_or_default();
        match self.id {
            Some(id) if self.animated => format!("<a:{name}:{id}>"),
            Some(id) => format!("<:{name}:{id}>"),
            None => name.to_string(),
        }
    }
}
