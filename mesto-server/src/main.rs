use std::env;
use std::net::SocketAddr;

use anyhow::Context;
use mesto_server::State;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_NAME: &str = "Jacques Cousteau";
const DEFAULT_ABOUT: &str = "Sailor, researcher";
const DEFAULT_AVATAR: &str = "https://pictures.s3.yandex.net/frontend-developer/ava.jpg";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mesto_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut port = 8000;
    if let Some(p) = env::args().nth(1) {
        port = p.parse().with_context(|| format!("invalid port {p}"))?;
    }
    let token = env::var("MESTO_TOKEN").unwrap_or_else(|_| String::from("dev-token"));

    let state = State::open(String::from("sled") + &port.to_string())?;
    let user = state.seed_user(&token, DEFAULT_NAME, DEFAULT_ABOUT, DEFAULT_AVATAR)?;
    tracing::info!(user = %user.id.0, "serving as {}", user.name);

    let (addr, server) = mesto_server::bind(SocketAddr::from(([127, 0, 0, 1], port)), state)?;
    tracing::info!("listening on {}", addr);
    server.await
}
