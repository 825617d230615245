#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that connects a tactical bot to a game server.

mod config;
mod logging;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use skirmish_core::OwnShipId;
use skirmish_protocol::{ClientError, Session, SessionConfig};
use skirmish_system_tactics::TacticalEngine;

use crate::{
    config::{Args, Settings},
    transport::WebSocketTransport,
};

/// Entry point of the `skirmish-bot` binary.
#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load(Args::parse())?;
    logging::init(&settings.logging)?;

    let transport = WebSocketTransport::connect(&settings.connection_url()).await?;

    let own_id = OwnShipId::from_credentials(&settings.token, &settings.bot_name);
    let tactics = settings.tactics.clone();
    let factory = move || TacticalEngine::new(own_id.clone(), tactics.clone());

    let mut session = Session::new(
        transport,
        SessionConfig {
            token: settings.token,
            bot_name: settings.bot_name,
            safety_margin: settings.safety_margin,
        },
        factory,
    );

    match session.run().await {
        Err(ClientError::ConnectionClosed) => {
            tracing::info!("connection closed, shutting down");
            Ok(())
        }
        outcome => outcome.context("session terminated"),
    }
}
