mod commands;
mod config;
mod render;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    ActionPanel, ClientEvent, GameClient, GamePanel, HttpAuthority, Panel, SyncSettings,
};
use commands::{TerminalCommand, HELP};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Terminal client for a night/day party game")]
struct Args {
    /// Base URL of the game authority.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    #[arg(long, default_value = "client.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms.filter(|ms| *ms > 0) {
        settings.poll_interval_ms = poll_interval_ms;
    }
    let server_url = config::normalize_server_url(&settings.server_url)?;

    let authority = HttpAuthority::new(&server_url)
        .with_context(|| format!("cannot use server url '{server_url}'"))?;
    info!(
        base_url = %authority.base_url(),
        poll_interval_ms = settings.poll_interval_ms,
        "terminal: starting"
    );
    let client = GameClient::new_with_authority(
        Arc::new(authority),
        SyncSettings {
            poll_interval: settings.poll_interval(),
        },
    );

    match client.ping().await {
        Ok(greeting) => println!("Connected to {server_url}: {greeting}"),
        Err(err) => warn!(%server_url, error = %err, "terminal: authority not reachable yet"),
    }
    println!("{HELP}\n");

    run(client).await
}

async fn run(client: Arc<GameClient>) -> Result<()> {
    let mut events = client.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_screen(&client).await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match TerminalCommand::parse(&line) {
                    Ok(None) => continue,
                    Ok(Some(TerminalCommand::Quit)) => break,
                    Ok(Some(TerminalCommand::Help)) => {
                        println!("{HELP}");
                        continue;
                    }
                    Ok(Some(command)) => {
                        if let Err(err) = execute(&client, command).await {
                            println!("! {err}");
                        }
                    }
                    Err(err) => {
                        println!("! {err}");
                        continue;
                    }
                }
                print_screen(&client).await;
            }
            event = events.recv() => match event {
                Ok(ClientEvent::SnapshotApplied | ClientEvent::VoteTallyUpdated) => {
                    print_screen(&client).await;
                }
                Ok(event) => debug!(?event, "terminal: client event"),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "terminal: event receiver lagged");
                    print_screen(&client).await;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.open_menu().await;
    Ok(())
}

async fn execute(client: &Arc<GameClient>, command: TerminalCommand) -> Result<()> {
    match command {
        TerminalCommand::Help | TerminalCommand::Quit => {}
        TerminalCommand::Menu => client.open_menu().await,
        TerminalCommand::Create(bounds) => {
            client.open_create().await;
            let bounds = match bounds {
                Some(bounds) => bounds,
                None => client.session().await.bounds,
            };
            let room_id = client.create_room(bounds).await?;
            println!("Room created: {room_id}");
        }
        TerminalCommand::Join {
            room_id,
            player_name,
        } => {
            let room_id = match room_id {
                Some(room_id) => room_id,
                None => client.session().await.room_id,
            };
            if room_id.is_empty() {
                bail!("no room to join yet; use join <room> <name>");
            }
            client.open_join().await;
            client.join_room(room_id, player_name).await?;
        }
        TerminalCommand::Vote(vote) => client.vote_start(vote).await?,
        TerminalCommand::Enter => client.enter_game().await?,
        TerminalCommand::Target(target) => match client.view().await.panel {
            Panel::Game(GamePanel {
                action: ActionPanel::Night(_),
                ..
            }) => client.choose_night_target(target).await?,
            Panel::Game(GamePanel {
                action: ActionPanel::Day(_),
                ..
            }) => client.choose_day_target(target).await?,
            _ => bail!("nothing to target right now"),
        },
        TerminalCommand::Act => match client.view().await.panel {
            Panel::Game(GamePanel {
                action: ActionPanel::Night(_),
                ..
            }) => client.submit_night_action().await?,
            Panel::Game(GamePanel {
                action: ActionPanel::Day(_),
                ..
            }) => client.submit_day_vote().await?,
            _ => bail!("nothing to submit right now"),
        },
        TerminalCommand::Refresh => {
            client.refresh().await?;
        }
    }
    Ok(())
}

async fn print_screen(client: &GameClient) {
    let session = client.session().await;
    let view = client_core::phase::select(&session);
    println!("\n{}", render::render(&view, &session));
}
