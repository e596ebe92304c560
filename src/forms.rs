use serde::{Deserialize, Serialize};
use crate::Url;

/// Body of a profile update.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct ProfileInput {
    pub name: String,
    pub about: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct AvatarInput {
    pub avatar: Url,
}

/// Body of a new card.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct PlaceInput {
    pub name: String,
    pub link: Url,
}
