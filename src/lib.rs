pub mod forms;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct Url(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct UserId(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
pub struct CardId(pub String);

/// Profile of a gallery user, as the backend reports it.
///
/// The default value is the empty user the client holds before the first
/// successful fetch.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub about: String,
    pub avatar: Url,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct Card {
    #[serde(rename = "_id")]
    pub id: CardId,
    pub name: String,
    pub link: Url,
    pub owner: User,
    #[serde(default)]
    pub likes: Vec<User>,
}

impl Card {
    /// Whether `user` is among the likers. Likes are compared by id only.
    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.likes.iter().any(|like| &like.id == user)
    }
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner.id == user
    }
}
