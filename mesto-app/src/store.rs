//! Gallery state and the handlers that change it.
//!
//! All state lives behind a `watch` channel: each handler applies its
//! change in a single `send_modify`, so subscribers never observe a
//! half-applied transition.

use std::future::Future;

use anyhow::Result;
use mesto_client::GalleryApi;
use mesto_common::forms::{AvatarInput, PlaceInput, ProfileInput};
use mesto_common::{Card, CardId, User};
use tokio::sync::watch;

/// Which dialogs are showing. Flags are independent; only
/// [`Gallery::close_all_popups`] resets them together.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Popups {
    pub edit_profile: bool,
    pub add_place: bool,
    pub edit_avatar: bool,
    pub delete_card: bool,
    /// Card awaiting delete confirmation.
    pub pending_delete: Option<Card>,
    /// Card shown in the image preview.
    pub selected_card: Option<Card>,
}

impl Popups {
    pub fn image_open(&self) -> bool {
        self.selected_card.is_some()
    }
    pub fn any_open(&self) -> bool {
        self.edit_profile || self.add_place || self.edit_avatar || self.delete_card || self.image_open()
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AppState {
    pub current_user: User,
    /// Display order, newest first.
    pub cards: Vec<Card>,
    pub popups: Popups,
    /// Set for the duration of a mutating request. Advisory only.
    pub is_loading: bool,
}

impl AppState {
    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|card| &card.id == id)
    }
}

pub struct Gallery<A> {
    api: A,
    state: watch::Sender<AppState>,
}

impl<A: GalleryApi> Gallery<A> {
    pub fn new(api: A) -> Self {
        let (state, _) = watch::channel(AppState::default());
        Self { api, state }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// Borrows the current state. Do not hold the guard across an await.
    pub fn state(&self) -> watch::Ref<'_, AppState> {
        self.state.borrow()
    }

    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> User {
        self.state.borrow().current_user.clone()
    }

    /// Loads the current user and the initial cards concurrently. Both are
    /// applied together or not at all.
    pub async fn initialize(&self) -> Result<()> {
        match futures::try_join!(self.api.get_user_info(), self.api.get_initial_cards()) {
            Ok((user, cards)) => {
                tracing::info!(user = %user.id.0, cards = cards.len(), "gallery loaded");
                self.state.send_modify(|state| {
                    state.current_user = user;
                    state.cards = cards;
                });
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = ?err, "initial load failed");
                Err(err)
            }
        }
    }

    pub fn open_edit_profile(&self) {
        self.state.send_modify(|state| state.popups.edit_profile = true);
    }

    pub fn open_add_place(&self) {
        self.state.send_modify(|state| state.popups.add_place = true);
    }

    pub fn open_edit_avatar(&self) {
        self.state.send_modify(|state| state.popups.edit_avatar = true);
    }

    pub fn open_delete_card(&self, card: &Card) {
        self.state.send_modify(|state| {
            state.popups.delete_card = true;
            state.popups.pending_delete = Some(card.clone());
        });
    }

    pub fn open_image(&self, card: &Card) {
        self.state
            .send_modify(|state| state.popups.selected_card = Some(card.clone()));
    }

    /// Hides every popup and drops both card payloads. Subscribers are not
    /// woken when nothing was open.
    pub fn close_all_popups(&self) {
        self.state.send_if_modified(|state| {
            if state.popups == Popups::default() {
                return false;
            }
            close_popups(state);
            true
        });
    }

    /// Toggles the current user's like on `card`.
    pub async fn handle_card_like(&self, card: &Card) {
        let liked = card.is_liked_by(&self.state.borrow().current_user.id);
        self.mutate(
            "like",
            self.api.change_like_card_status(&card.id, !liked),
            |state, updated| {
                if let Some(slot) = state.cards.iter_mut().find(|c| c.id == card.id) {
                    *slot = updated;
                }
            },
        )
        .await
    }

    pub async fn handle_card_delete(&self, card: &Card) {
        self.mutate("delete card", self.api.delete_card(&card.id), |state, ()| {
            state.cards.retain(|c| c.id != card.id);
            close_popups(state);
        })
        .await
    }

    pub async fn handle_update_user(&self, input: &ProfileInput) {
        self.mutate(
            "update profile",
            self.api.set_user_info(&input.name, &input.about),
            |state, user| {
                state.current_user = user;
                close_popups(state);
            },
        )
        .await
    }

    pub async fn handle_update_avatar(&self, input: &AvatarInput) {
        self.mutate("update avatar", self.api.edit_avatar(&input.avatar), |state, user| {
            state.current_user = user;
            close_popups(state);
        })
        .await
    }

    pub async fn handle_add_place_submit(&self, input: &PlaceInput) {
        self.mutate(
            "add place",
            self.api.create_new_card(&input.name, &input.link),
            |state, card| {
                state.cards.insert(0, card);
                close_popups(state);
            },
        )
        .await
    }

    /// Raises the loading flag, awaits `request` and lowers the flag again.
    /// A success is applied in the same update that lowers the flag; a
    /// failure is logged and changes nothing else.
    async fn mutate<T>(
        &self,
        action: &str,
        request: impl Future<Output = Result<T>>,
        apply: impl FnOnce(&mut AppState, T),
    ) {
        self.state.send_modify(|state| state.is_loading = true);
        match request.await {
            Ok(value) => self.state.send_modify(|state| {
                apply(state, value);
                state.is_loading = false;
            }),
            Err(err) => {
                tracing::error!(error = ?err, "{action} failed");
                self.state.send_modify(|state| state.is_loading = false);
            }
        }
    }
}

fn close_popups(state: &mut AppState) {
    state.popups = Popups::default();
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::bail;
    use async_trait::async_trait;
    use mesto_common::{Url, UserId};
    use tokio::sync::{Barrier, Notify};

    use super::*;

    #[derive(Clone, Debug, Eq, PartialEq)]
    enum Call {
        UserInfo,
        InitialCards,
        SetUserInfo(String, String),
        EditAvatar(Url),
        CreateCard(String, Url),
        Like(CardId, bool),
        Delete(CardId),
    }

    #[derive(Default)]
    struct FakeApi {
        fail_user: bool,
        fail_cards: bool,
        fail_mutations: bool,
        gate: Option<Arc<Notify>>,
        /// Startup fetches both wait here, so they only finish when run together.
        rendezvous: Option<Arc<Barrier>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeApi {
        async fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
        async fn meet(&self) {
            if let Some(rendezvous) = &self.rendezvous {
                rendezvous.wait().await;
            }
        }
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: UserId(id.to_string()),
            name: name.to_string(),
            about: format!("about {name}"),
            avatar: Url(format!("http://img/{id}.png")),
        }
    }

    fn card(id: &str, likes: Vec<User>) -> Card {
        Card {
            id: CardId(id.to_string()),
            name: id.to_string(),
            link: Url(format!("http://img/{id}.jpg")),
            owner: user("bob", "Bob"),
            likes,
        }
    }

    fn initial_cards() -> Vec<Card> {
        vec![
            card("c1", vec![]),
            card("c2", vec![user("ann", "Ann")]),
            card("c3", vec![user("bob", "Bob")]),
        ]
    }

    #[async_trait]
    impl GalleryApi for FakeApi {
        async fn get_user_info(&self) -> Result<User> {
            self.record(Call::UserInfo).await;
            self.meet().await;
            if self.fail_user {
                bail!("user info unavailable");
            }
            Ok(user("ann", "Ann"))
        }
        async fn get_initial_cards(&self) -> Result<Vec<Card>> {
            self.record(Call::InitialCards).await;
            self.meet().await;
            if self.fail_cards {
                bail!("cards unavailable");
            }
            Ok(initial_cards())
        }
        async fn set_user_info(&self, name: &str, about: &str) -> Result<User> {
            self.record(Call::SetUserInfo(name.to_string(), about.to_string())).await;
            if self.fail_mutations {
                bail!("rejected");
            }
            Ok(User { name: name.to_string(), about: about.to_string(), ..user("ann", "Ann") })
        }
        async fn edit_avatar(&self, avatar: &Url) -> Result<User> {
            self.record(Call::EditAvatar(avatar.clone())).await;
            if self.fail_mutations {
                bail!("rejected");
            }
            Ok(User { avatar: avatar.clone(), ..user("ann", "Ann") })
        }
        async fn create_new_card(&self, name: &str, link: &Url) -> Result<Card> {
            self.record(Call::CreateCard(name.to_string(), link.clone())).await;
            if self.fail_mutations {
                bail!("rejected");
            }
            Ok(Card {
                id: CardId("new".into()),
                name: name.to_string(),
                link: link.clone(),
                owner: user("ann", "Ann"),
                likes: vec![],
            })
        }
        async fn change_like_card_status(&self, id: &CardId, liked: bool) -> Result<Card> {
            self.record(Call::Like(id.clone(), liked)).await;
            if self.fail_mutations {
                bail!("rejected");
            }
            let mut updated = initial_cards()
                .into_iter()
                .find(|c| &c.id == id)
                .unwrap_or_else(|| card(&id.0, vec![]));
            updated.likes.retain(|u| u.id.0 != "ann");
            if liked {
                updated.likes.push(user("ann", "Ann"));
            }
            Ok(updated)
        }
        async fn delete_card(&self, id: &CardId) -> Result<()> {
            self.record(Call::Delete(id.clone())).await;
            if self.fail_mutations {
                bail!("rejected");
            }
            Ok(())
        }
    }

    async fn loaded(api: FakeApi) -> Gallery<Arc<FakeApi>> {
        let gallery = Gallery::new(Arc::new(api));
        gallery.initialize().await.unwrap();
        gallery
    }

    #[tokio::test]
    async fn initialize_applies_user_and_cards_in_order() {
        let gallery = Gallery::new(Arc::new(FakeApi::default()));
        assert_eq!(gallery.snapshot(), AppState::default());

        gallery.initialize().await.unwrap();
        let state = gallery.snapshot();
        assert_eq!(state.current_user, user("ann", "Ann"));
        assert_eq!(state.cards, initial_cards());
        assert!(!state.is_loading);
        let mut calls = gallery.api().calls();
        calls.sort_by_key(|c| format!("{c:?}"));
        assert_eq!(calls, vec![Call::InitialCards, Call::UserInfo]);
    }

    #[tokio::test]
    async fn initialize_fetches_user_and_cards_concurrently() {
        let gallery = Gallery::new(Arc::new(FakeApi {
            rendezvous: Some(Arc::new(Barrier::new(2))),
            ..Default::default()
        }));
        tokio::time::timeout(Duration::from_secs(2), gallery.initialize())
            .await
            .expect("fetches ran one after the other")
            .unwrap();
        assert_eq!(gallery.snapshot().cards, initial_cards());
    }

    #[tokio::test]
    async fn initialize_applies_nothing_when_either_fetch_fails() {
        for api in [
            FakeApi { fail_cards: true, ..Default::default() },
            FakeApi { fail_user: true, ..Default::default() },
        ] {
            let gallery = Gallery::new(Arc::new(api));
            assert!(gallery.initialize().await.is_err());
            assert_eq!(gallery.snapshot(), AppState::default());
        }
    }

    #[tokio::test]
    async fn like_requests_opposite_status_and_replaces_in_place() {
        let gallery = loaded(FakeApi::default()).await;
        let target = gallery.state().cards[0].clone();
        let before = gallery.api().calls().len();

        gallery.handle_card_like(&target).await;
        let calls = gallery.api().calls();
        assert_eq!(calls[before..], [Call::Like(target.id.clone(), true)]);
        let state = gallery.snapshot();
        assert_eq!(state.cards.len(), 3);
        assert!(state.cards[0].is_liked_by(&state.current_user.id));
        assert_eq!(state.cards[1..], initial_cards()[1..]);

        let liked = state.cards[1].clone();
        let before = gallery.api().calls().len();
        gallery.handle_card_like(&liked).await;
        assert_eq!(gallery.api().calls()[before..], [Call::Like(liked.id.clone(), false)]);
        assert!(!gallery.state().cards[1].is_liked_by(&UserId("ann".into())));
    }

    #[tokio::test]
    async fn delete_removes_card_and_closes_popups() {
        let gallery = loaded(FakeApi::default()).await;
        let target = gallery.state().cards[1].clone();
        gallery.open_image(&target);
        gallery.open_delete_card(&target);
        assert!(gallery.state().popups.delete_card);
        assert_eq!(gallery.state().popups.pending_delete.as_ref(), Some(&target));

        gallery.handle_card_delete(&target).await;
        let state = gallery.snapshot();
        let ids: Vec<_> = state.cards.iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
        assert_eq!(state.popups, Popups::default());
        assert!(!state.popups.any_open());
    }

    #[tokio::test]
    async fn new_place_is_prepended() {
        let gallery = loaded(FakeApi::default()).await;
        gallery.open_add_place();
        let input = PlaceInput { name: "A".into(), link: Url("http://x".into()) };

        gallery.handle_add_place_submit(&input).await;
        let state = gallery.snapshot();
        assert_eq!(state.cards.len(), 4);
        assert_eq!(state.cards[0].id, CardId("new".into()));
        assert_eq!(state.cards[0].name, "A");
        assert_eq!(state.cards[1..], initial_cards()[..]);
        assert_eq!(state.popups, Popups::default());
        assert_eq!(
            gallery.api().calls().last(),
            Some(&Call::CreateCard("A".into(), Url("http://x".into())))
        );
    }

    #[tokio::test]
    async fn profile_and_avatar_updates_replace_user() {
        let gallery = loaded(FakeApi::default()).await;
        gallery.open_edit_profile();
        gallery
            .handle_update_user(&ProfileInput { name: "Anna".into(), about: "Explorer".into() })
            .await;
        let current = gallery.current_user();
        assert_eq!(current.name, "Anna");
        assert_eq!(current.about, "Explorer");
        assert!(!gallery.state().popups.edit_profile);

        gallery.open_edit_avatar();
        let avatar = Url("http://img/new.png".into());
        gallery.handle_update_avatar(&AvatarInput { avatar: avatar.clone() }).await;
        assert_eq!(gallery.current_user().avatar, avatar);
        assert!(!gallery.state().popups.edit_avatar);
    }

    #[tokio::test]
    async fn popups_open_independently() {
        let gallery = Gallery::new(Arc::new(FakeApi::default()));
        gallery.open_edit_profile();
        gallery.open_add_place();
        let popups = gallery.snapshot().popups;
        assert!(popups.edit_profile && popups.add_place);
        assert!(!popups.edit_avatar && !popups.delete_card && !popups.image_open());

        gallery.close_all_popups();
        assert_eq!(gallery.snapshot().popups, Popups::default());
    }

    #[tokio::test]
    async fn closing_when_nothing_is_open_changes_nothing() {
        let gallery = loaded(FakeApi::default()).await;
        let before = gallery.snapshot();
        let rx = gallery.subscribe();

        gallery.close_all_popups();
        assert_eq!(gallery.snapshot(), before);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn loading_flag_spans_the_request() {
        for fail_mutations in [false, true] {
            let gate = Arc::new(Notify::new());
            let gallery = Arc::new(Gallery::new(Arc::new(FakeApi {
                gate: Some(gate.clone()),
                fail_mutations,
                ..Default::default()
            })));
            let mut rx = gallery.subscribe();

            let task = tokio::spawn({
                let gallery = gallery.clone();
                async move {
                    let input = ProfileInput { name: "Anna".into(), about: "Explorer".into() };
                    gallery.handle_update_user(&input).await
                }
            });
            while !rx.borrow_and_update().is_loading {
                rx.changed().await.unwrap();
            }
            assert!(gallery.state().is_loading);

            gate.notify_one();
            task.await.unwrap();
            assert!(!gallery.state().is_loading);
            assert_eq!(gallery.current_user().name == "Anna", !fail_mutations);
        }
    }

    #[tokio::test]
    async fn failures_leave_state_untouched() {
        let gallery = loaded(FakeApi { fail_mutations: true, ..Default::default() }).await;
        let target = gallery.state().cards[0].clone();
        gallery.open_delete_card(&target);
        gallery.open_image(&target);
        gallery.open_edit_profile();
        let before = gallery.snapshot();

        gallery.handle_card_like(&target).await;
        gallery.handle_card_delete(&target).await;
        gallery
            .handle_update_user(&ProfileInput { name: "Anna".into(), about: "Explorer".into() })
            .await;
        gallery
            .handle_update_avatar(&AvatarInput { avatar: Url("http://img/new.png".into()) })
            .await;
        gallery
            .handle_add_place_submit(&PlaceInput { name: "A".into(), link: Url("http://x".into()) })
            .await;

        assert_eq!(gallery.snapshot(), before);
        assert_eq!(gallery.api().calls().len(), 7);
    }

    #[tokio::test]
    async fn subscribers_see_result_and_cleared_flag_together() {
        let gallery = loaded(FakeApi::default()).await;
        let mut rx = gallery.subscribe();
        gallery
            .handle_add_place_submit(&PlaceInput { name: "A".into(), link: Url("http://x".into()) })
            .await;

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.cards[0].name, "A");
        assert!(!seen.is_loading);
        assert!(!rx.has_changed().unwrap());
    }
}
