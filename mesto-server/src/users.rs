use anyhow::Result;
use mesto_common::{User, UserId};
use sled::{Db, Tree};

/// Profiles keyed by user id, plus the token each user authenticates with.
#[derive(Clone)]
pub struct Users {
    tree: Tree,
    tokens: Tree,
}

impl Users {
    pub fn new(db: &Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree("users")?,
            tokens: db.open_tree("tokens")?,
        })
    }

    pub fn get(&self, id: &UserId) -> Result<Option<User>> {
        match self.tree.get(&id.0)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn by_token(&self, token: impl AsRef<str>) -> Result<Option<User>> {
        match self.tokens.get(token.as_ref())? {
            Some(id) => self.get(&UserId(String::from_utf8(id.to_vec())?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, user: &User) -> Result<()> {
        self.tree.insert(&user.id.0, serde_json::to_vec(user)?)?;
        Ok(())
    }

    /// Registers `user` under `token` unless the token already belongs to
    /// someone, in which case the existing profile wins.
    pub fn seed(&self, token: impl AsRef<str>, user: User) -> Result<User> {
        let token = token.as_ref();
        if let Some(existing) = self.by_token(token)? {
            return Ok(existing);
        }
        self.put(&user)?;
        self.tokens.insert(token, user.id.0.as_bytes())?;
        Ok(user)
    }
}
