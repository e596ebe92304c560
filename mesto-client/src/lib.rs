pub mod config;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mesto_common::{Card, CardId, Url, User};
use reqwest::Client;

pub use crate::config::ApiConfig;

pub mod client {
    use anyhow::{bail, Context, Result};
    use mesto_common::forms::{AvatarInput, PlaceInput, ProfileInput};
    use mesto_common::{Card, CardId, Url, User};
    use reqwest::header::AUTHORIZATION;
    use reqwest::{Client, Method, RequestBuilder, Response};
    use serde::de::DeserializeOwned;

    use crate::ApiConfig;

    fn request(client: &Client, config: &ApiConfig, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "mesto request");
        client
            .request(method, config.url(path))
            .header(AUTHORIZATION, config.token.as_str())
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let url = response.url().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} responded {}: {}", url, status, body);
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("decoding response from {url}"))
    }

    pub async fn get_user_info(client: &Client, config: &ApiConfig) -> Result<User> {
        parse(request(client, config, Method::GET, "users/me").send().await?).await
    }
    pub async fn get_initial_cards(client: &Client, config: &ApiConfig) -> Result<Vec<Card>> {
        parse(request(client, config, Method::GET, "cards").send().await?).await
    }
    pub async fn set_user_info(client: &Client, config: &ApiConfig, name: &str, about: &str) -> Result<User> {
        let body = ProfileInput { name: name.to_string(), about: about.to_string() };
        parse(request(client, config, Method::PATCH, "users/me")
            .json(&body)
            .send()
            .await?)
            .await
    }
    pub async fn edit_avatar(client: &Client, config: &ApiConfig, avatar: &Url) -> Result<User> {
        let body = AvatarInput { avatar: avatar.clone() };
        parse(request(client, config, Method::PATCH, "users/me/avatar")
            .json(&body)
            .send()
            .await?)
            .await
    }
    pub async fn create_new_card(client: &Client, config: &ApiConfig, name: &str, link: &Url) -> Result<Card> {
        let body = PlaceInput { name: name.to_string(), link: link.clone() };
        parse(request(client, config, Method::POST, "cards")
            .json(&body)
            .send()
            .await?)
            .await
    }
    /// `PUT` sets the like, `DELETE` removes it.
    pub async fn change_like_card_status(client: &Client, config: &ApiConfig, id: &CardId, liked: bool) -> Result<Card> {
        let method = if liked { Method::PUT } else { Method::DELETE };
        parse(request(client, config, method, &format!("cards/{}/likes", id.0)).send().await?).await
    }
    pub async fn delete_card(client: &Client, config: &ApiConfig, id: &CardId) -> Result<()> {
        parse::<serde_json::Value>(request(client, config, Method::DELETE, &format!("cards/{}", id.0)).send().await?).await?;
        Ok(())
    }
}

/// Operations the gallery needs from its backend.
#[async_trait]
pub trait GalleryApi: Send + Sync {
    async fn get_user_info(&self) -> Result<User>;
    async fn get_initial_cards(&self) -> Result<Vec<Card>>;
    async fn set_user_info(&self, name: &str, about: &str) -> Result<User>;
    async fn edit_avatar(&self, avatar: &Url) -> Result<User>;
    async fn create_new_card(&self, name: &str, link: &Url) -> Result<Card>;
    async fn change_like_card_status(&self, id: &CardId, liked: bool) -> Result<Card>;
    async fn delete_card(&self, id: &CardId) -> Result<()>;
}

#[async_trait]
impl<T: GalleryApi + ?Sized> GalleryApi for Arc<T> {
    async fn get_user_info(&self) -> Result<User> {
        (**self).get_user_info().await
    }
    async fn get_initial_cards(&self) -> Result<Vec<Card>> {
        (**self).get_initial_cards().await
    }
    async fn set_user_info(&self, name: &str, about: &str) -> Result<User> {
        (**self).set_user_info(name, about).await
    }
    async fn edit_avatar(&self, avatar: &Url) -> Result<User> {
        (**self).edit_avatar(avatar).await
    }
    async fn create_new_card(&self, name: &str, link: &Url) -> Result<Card> {
        (**self).create_new_card(name, link).await
    }
    async fn change_like_card_status(&self, id: &CardId, liked: bool) -> Result<Card> {
        (**self).change_like_card_status(id, liked).await
    }
    async fn delete_card(&self, id: &CardId) -> Result<()> {
        (**self).delete_card(id).await
    }
}

/// HTTP implementation of [`GalleryApi`].
#[derive(Clone, Debug)]
pub struct Api {
    client: Client,
    config: ApiConfig,
}

impl Api {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(Client::new(), config)
    }
    pub fn with_client(client: Client, config: ApiConfig) -> Self {
        Self { client, config }
    }
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

#[async_trait]
impl GalleryApi for Api {
    async fn get_user_info(&self) -> Result<User> {
        client::get_user_info(&self.client, &self.config).await
    }
    async fn get_initial_cards(&self) -> Result<Vec<Card>> {
        client::get_initial_cards(&self.client, &self.config).await
    }
    async fn set_user_info(&self, name: &str, about: &str) -> Result<User> {
        client::set_user_info(&self.client, &self.config, name, about).await
    }
    async fn edit_avatar(&self, avatar: &Url) -> Result<User> {
        client::edit_avatar(&self.client, &self.config, avatar).await
    }
    async fn create_new_card(&self, name: &str, link: &Url) -> Result<Card> {
        client::create_new_card(&self.client, &self.config, name, link).await
    }
    async fn change_like_card_status(&self, id: &CardId, liked: bool) -> Result<Card> {
        client::change_like_card_status(&self.client, &self.config, id, liked).await
    }
    async fn delete_card(&self, id: &CardId) -> Result<()> {
        client::delete_card(&self.client, &self.config, id).await
    }
}
