use anyhow::Result;
use mesto_common::{CardId, Url, UserId};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

/// A card as persisted: owner and likers are kept as ids and resolved to
/// full profiles when the card is served.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct StoredCard {
    pub seq: u64,
    pub id: CardId,
    pub name: String,
    pub link: Url,
    pub owner: UserId,
    pub likes: Vec<UserId>,
}

impl StoredCard {
    /// Returns whether the like set changed.
    pub fn set_liked(&mut self, user: &UserId, liked: bool) -> bool {
        let present = self.likes.contains(user);
        match (liked, present) {
            (true, false) => self.likes.push(user.clone()),
            (false, true) => self.likes.retain(|like| like != user),
            _ => return false,
        }
        true
    }
}

#[derive(Clone)]
pub struct Cards {
    tree: Tree,
}

impl Cards {
    pub fn new(db: &Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree("cards")?,
        })
    }

    pub fn get(&self, id: &CardId) -> Result<Option<StoredCard>> {
        match self.tree.get(&id.0)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, card: &StoredCard) -> Result<()> {
        self.tree.insert(&card.id.0, serde_json::to_vec(card)?)?;
        Ok(())
    }

    /// Adds or removes `user` in the card's likes as one compare-and-swap,
    /// so concurrent likers never overwrite each other. `None` when the card
    /// does not exist.
    pub fn set_liked(&self, id: &CardId, user: &UserId, liked: bool) -> Result<Option<StoredCard>> {
        let updated = self.tree.update_and_fetch(&id.0, |bytes| {
            let bytes = bytes?;
            let Ok(mut card) = serde_json::from_slice::<StoredCard>(bytes) else {
                return Some(bytes.to_vec());
            };
            card.set_liked(user, liked);
            Some(serde_json::to_vec(&card).unwrap_or_else(|_| bytes.to_vec()))
        })?;
        match updated {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn remove(&self, id: &CardId) -> Result<bool> {
        Ok(self.tree.remove(&id.0)?.is_some())
    }

    /// Every card, newest first.
    pub fn all(&self) -> Result<Vec<StoredCard>> {
        let mut cards = self
            .tree
            .iter()
            .values()
            .map(|bytes| Ok(serde_json::from_slice::<StoredCard>(&bytes?)?))
            .collect::<Result<Vec<_>>>()?;
        cards.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(cards)
    }
}
