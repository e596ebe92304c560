pub mod cards;
pub mod users;

use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::Context;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, put};
use axum::{Extension, Json, Router};
use mesto_common::{Card, CardId, Url, User, UserId};
use sled::Db;

use crate::cards::{Cards, StoredCard};
use crate::users::Users;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Display) -> Self {
        Self {
            status,
            error: anyhow::anyhow!("{message}"),
        }
    }
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = ?self.error, "request failed");
        }
        (
            self.status,
            Json(serde_json::json!({ "message": self.error.to_string() })),
        )
            .into_response()
    }
}

// `?` on anything convertible to anyhow::Error becomes a 500.
impl<E> From<E> for AppError
    where
        E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err.into(),
        }
    }
}

#[derive(Clone)]
pub struct State {
    db: Db,
    users: Users,
    cards: Cards,
}

impl State {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_db(db)
    }
    pub fn temporary() -> anyhow::Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }
    fn from_db(db: Db) -> anyhow::Result<Self> {
        Ok(Self {
            users: Users::new(&db)?,
            cards: Cards::new(&db)?,
            db,
        })
    }

    /// Makes `token` authenticate as a fresh user with the given profile.
    /// A token that is already registered keeps its user.
    pub fn seed_user(&self, token: &str, name: &str, about: &str, avatar: &str) -> anyhow::Result<User> {
        let user = User {
            id: UserId(uuid::Uuid::new_v4().simple().to_string()),
            name: name.to_string(),
            about: about.to_string(),
            avatar: Url(avatar.to_string()),
        };
        self.users.seed(token, user)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<User> {
        let token = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "authorization required"))?;
        self.users
            .by_token(token)?
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "unknown token"))
    }

    fn user(&self, id: &UserId) -> Result<User> {
        Ok(self.users.get(id)?.with_context(|| format!("user {} missing", id.0))?)
    }

    fn card(&self, id: &CardId) -> Result<StoredCard> {
        self.cards
            .get(id)?
            .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, format!("card {} not found", id.0)))
    }

    fn populate(&self, card: StoredCard) -> Result<Card> {
        Ok(Card {
            owner: self.user(&card.owner)?,
            likes: card
                .likes
                .iter()
                .map(|id| self.user(id))
                .collect::<Result<Vec<_>>>()?,
            id: card.id,
            name: card.name,
            link: card.link,
        })
    }
}

pub fn router(state: State) -> Router {
    Router::new()
        .route("/users/me", get(routes::get_me).patch(routes::patch_me))
        .route("/users/me/avatar", patch(routes::patch_avatar))
        .route("/cards", get(routes::get_cards).post(routes::post_card))
        .route("/cards/:id", delete(routes::delete_card))
        .route("/cards/:id/likes", put(routes::put_like).delete(routes::delete_like))
        .layer(Extension(state))
}

/// Binds the backend to `addr` and returns the bound address together with
/// the future that serves it. Port 0 picks a free port.
pub fn bind(
    addr: SocketAddr,
    state: State,
) -> anyhow::Result<(SocketAddr, impl Future<Output = anyhow::Result<()>> + Send)> {
    let server = axum::Server::try_bind(&addr)?.serve(router(state).into_make_service());
    let local = server.local_addr();
    Ok((local, async move { server.await.map_err(anyhow::Error::from) }))
}

fn check_len(field: &str, value: &str, range: RangeInclusive<usize>) -> Result<()> {
    let len = value.chars().count();
    if range.contains(&len) {
        Ok(())
    } else {
        Err(AppError::new(
            StatusCode::BAD_REQUEST,
            format!("{field} must be {} to {} characters long", range.start(), range.end()),
        ))
    }
}

fn check_link(field: &str, link: &Url) -> Result<()> {
    match url::Url::parse(&link.0) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::new(
            StatusCode::BAD_REQUEST,
            format!("{field} must be an http(s) link"),
        )),
    }
}

mod routes {
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::{Extension, Json};
    use mesto_common::forms::{AvatarInput, PlaceInput, ProfileInput};
    use mesto_common::{Card, CardId, User};
    use serde_json::Value;

    use crate::cards::StoredCard;
    use crate::{check_len, check_link, AppError, Result, State};

    pub async fn get_me(Extension(state): Extension<State>, headers: HeaderMap) -> Result<Json<User>> {
        Ok(Json(state.authorize(&headers)?))
    }

    pub async fn patch_me(Extension(state): Extension<State>, headers: HeaderMap, Json(input): Json<ProfileInput>) -> Result<Json<User>> {
        let user = state.authorize(&headers)?;
        check_len("name", &input.name, 2..=30)?;
        check_len("about", &input.about, 2..=200)?;
        let user = User { name: input.name, about: input.about, ..user };
        state.users.put(&user)?;
        tracing::debug!(user = %user.id.0, "profile updated");
        Ok(Json(user))
    }

    pub async fn patch_avatar(Extension(state): Extension<State>, headers: HeaderMap, Json(input): Json<AvatarInput>) -> Result<Json<User>> {
        let user = state.authorize(&headers)?;
        check_link("avatar", &input.avatar)?;
        let user = User { avatar: input.avatar, ..user };
        state.users.put(&user)?;
        tracing::debug!(user = %user.id.0, "avatar updated");
        Ok(Json(user))
    }

    pub async fn get_cards(Extension(state): Extension<State>, headers: HeaderMap) -> Result<Json<Vec<Card>>> {
        state.authorize(&headers)?;
        let cards = state
            .cards
            .all()?
            .into_iter()
            .map(|card| state.populate(card))
            .collect::<Result<Vec<_>>>()?;
        Ok(Json(cards))
    }

    pub async fn post_card(Extension(state): Extension<State>, headers: HeaderMap, Json(input): Json<PlaceInput>) -> Result<Json<Card>> {
        let user = state.authorize(&headers)?;
        check_len("name", &input.name, 2..=30)?;
        check_link("link", &input.link)?;
        let card = StoredCard {
            seq: state.db.generate_id()?,
            id: CardId(uuid::Uuid::new_v4().simple().to_string()),
            name: input.name,
            link: input.link,
            owner: user.id,
            likes: Vec::new(),
        };
        state.cards.put(&card)?;
        tracing::info!(card = %card.id.0, "card created");
        Ok(Json(state.populate(card)?))
    }

    pub async fn delete_card(Extension(state): Extension<State>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Value>> {
        let user = state.authorize(&headers)?;
        let card = state.card(&CardId(id))?;
        if card.owner != user.id {
            return Err(AppError::new(StatusCode::FORBIDDEN, "only the owner can delete a card"));
        }
        state.cards.remove(&card.id)?;
        tracing::info!(card = %card.id.0, "card deleted");
        Ok(Json(serde_json::json!({ "message": "card deleted" })))
    }

    pub async fn put_like(Extension(state): Extension<State>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Card>> {
        set_like(state, headers, CardId(id), true).await
    }

    pub async fn delete_like(Extension(state): Extension<State>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Card>> {
        set_like(state, headers, CardId(id), false).await
    }

    async fn set_like(state: State, headers: HeaderMap, id: CardId, liked: bool) -> Result<Json<Card>> {
        let user = state.authorize(&headers)?;
        let card = state
            .cards
            .set_liked(&id, &user.id, liked)?
            .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, format!("card {} not found", id.0)))?;
        Ok(Json(state.populate(card)?))
    }
}
