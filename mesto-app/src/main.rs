use std::sync::Arc;

use anyhow::{Context, Result};
use mesto_app::Gallery;
use mesto_client::{Api, ApiConfig, GalleryApi};
use mesto_common::{Card, CardId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod command;

use crate::command::{Command, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ApiConfig::from_env();
    tracing::info!(base_url = %config.base_url, "connecting");
    let gallery = Arc::new(Gallery::new(Api::new(config)));
    gallery.initialize().await.context("loading gallery")?;

    let mut changes = gallery.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            tracing::debug!(
                cards = state.cards.len(),
                loading = state.is_loading,
                popups = state.popups.any_open(),
                "state changed"
            );
        }
    });

    print_cards(&gallery);
    println!("{USAGE}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = command::parse(&line) else {
            println!("{USAGE}");
            continue;
        };
        match command {
            Command::Nothing => {}
            Command::Quit => break,
            Command::List => print_cards(&gallery),
            Command::Me => {
                let me = gallery.current_user();
                println!("{} ({}) {}", me.name, me.about, me.avatar.0);
            }
            Command::View(id) => {
                if let Some(card) = find(&gallery, &id) {
                    gallery.open_image(&card);
                    println!("{}: {}", card.name, card.link.0);
                }
            }
            Command::Like(id) => {
                if let Some(card) = find(&gallery, &id) {
                    gallery.handle_card_like(&card).await;
                    print_cards(&gallery);
                }
            }
            Command::Delete(id) => {
                if let Some(card) = find(&gallery, &id) {
                    if !card.is_owned_by(&gallery.current_user().id) {
                        println!("only your own cards can be deleted");
                        continue;
                    }
                    gallery.open_delete_card(&card);
                    gallery.handle_card_delete(&card).await;
                    report(&gallery);
                }
            }
            Command::Add(input) => {
                gallery.open_add_place();
                gallery.handle_add_place_submit(&input).await;
                report(&gallery);
            }
            Command::Profile(input) => {
                gallery.open_edit_profile();
                gallery.handle_update_user(&input).await;
                report(&gallery);
            }
            Command::Avatar(input) => {
                gallery.open_edit_avatar();
                gallery.handle_update_avatar(&input).await;
                report(&gallery);
            }
            Command::Close => gallery.close_all_popups(),
        }
    }
    Ok(())
}

fn find<A: GalleryApi>(gallery: &Gallery<A>, id: &CardId) -> Option<Card> {
    let card = gallery.state().card(id).cloned();
    if card.is_none() {
        println!("no card {}", id.0);
    }
    card
}

/// A handler that succeeded has closed its popup; one that failed left it
/// open. Returns whether the request failed, with the popups closed again.
fn report<A: GalleryApi>(gallery: &Gallery<A>) -> bool {
    if gallery.state().popups.any_open() {
        println!("request failed, see log");
        gallery.close_all_popups();
        true
    } else {
        print_cards(gallery);
        false
    }
}

fn print_cards<A: GalleryApi>(gallery: &Gallery<A>) {
    let state = gallery.state();
    for card in &state.cards {
        let mark = if card.is_liked_by(&state.current_user.id) { "♥" } else { "♡" };
        let mine = if card.is_owned_by(&state.current_user.id) { " (yours)" } else { "" };
        println!("{} {} {} {}{}", card.id.0, mark, card.likes.len(), card.name, mine);
    }
}
