use std::fmt::Write;

use client_core::{
    ActionPanel, DayPanel, GamePanel, LobbyPanel, NightPanel, Panel, PhaseView, RoleCard,
    SessionState,
};
use shared::domain::{Phase, PlayerName};

pub fn render(view: &PhaseView, session: &SessionState) -> String {
    let mut out = String::new();
    match &view.panel {
        Panel::Menu => {
            out.push_str("== Menu ==\n");
            out.push_str("  create [min max]    Create Room\n");
            out.push_str("  join [room] <name>  Join Room\n");
        }
        Panel::CreateRoom(bounds) => {
            out.push_str("== Create Room ==\n");
            let _ = writeln!(out, "Min players: {}", bounds.min_players);
            let _ = writeln!(out, "Max players: {}", bounds.max_players);
            out.push_str("  create [min max] | menu\n");
        }
        Panel::JoinRoom {
            room_id,
            player_name,
        } => {
            out.push_str("== Join Room ==\n");
            let _ = writeln!(out, "Room ID: {}", or_dash(room_id.as_str()));
            let _ = writeln!(out, "Name: {}", or_dash(player_name.as_str()));
            out.push_str("  join [room] <name> | menu\n");
        }
        Panel::Lobby(lobby) => render_lobby(&mut out, lobby),
        Panel::Game(game) => render_game(&mut out, game),
    }
    if let Some(error) = &session.error {
        let _ = writeln!(out, "Error: {error}");
    }
    out
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

fn join_names(names: &[PlayerName]) -> String {
    names
        .iter()
        .map(PlayerName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_lobby(out: &mut String, lobby: &LobbyPanel) {
    let _ = writeln!(out, "== Room: {} ==", lobby.room_id);
    let _ = writeln!(
        out,
        "Players ({}): {}",
        lobby.players.len(),
        join_names(&lobby.players)
    );
    if let (Some(min), Some(max)) = (lobby.min_players, lobby.max_players) {
        let _ = writeln!(out, "Room size: {min}-{max}");
    }
    out.push_str("Votes to Start:\n");
    for (name, vote) in &lobby.tally {
        let _ = writeln!(out, "  {name}: {}", vote.label());
    }
    let mut controls = Vec::new();
    if lobby.can_vote_yes {
        controls.push("vote yes");
    }
    if lobby.can_vote_no {
        controls.push("vote no");
    }
    if lobby.can_enter_game {
        out.push_str("Game Started!\n");
        controls.push("enter");
    }
    if !controls.is_empty() {
        let _ = writeln!(out, "  {}", controls.join(" | "));
    }
}

fn render_card(out: &mut String, card: &RoleCard) {
    let _ = writeln!(out, "Your Name: {}", card.player_name);
    let _ = writeln!(
        out,
        "Your Role: {}",
        card.role.map(|role| role.as_str()).unwrap_or("-")
    );
    let _ = writeln!(out, "Alive Players: {}", join_names(&card.alive));
}

fn render_game(out: &mut String, game: &GamePanel) {
    render_card(out, &game.card);
    match &game.action {
        ActionPanel::Waiting => out.push_str("Waiting for the game to begin...\n"),
        ActionPanel::Night(night) => render_night(out, night),
        ActionPanel::Day(day) => render_day(out, day),
        ActionPanel::Spectator { phase, roster } => {
            let _ = writeln!(out, "{} (spectating)", phase_title(*phase));
            if roster.is_empty() {
                out.push_str("You are out of the game.\n");
            }
            for entry in roster {
                let _ = writeln!(
                    out,
                    "  {}: {}",
                    entry.name,
                    entry.role.map(|role| role.as_str()).unwrap_or("-")
                );
            }
        }
        ActionPanel::GameOver {
            winner,
            detective_win,
        } => {
            let _ = writeln!(
                out,
                "Game Over! Winner: {}",
                winner.as_deref().unwrap_or("-")
            );
            if *detective_win {
                out.push_str("The detective unmasked the mafia!\n");
            }
        }
    }
}

fn phase_title(phase: Phase) -> &'static str {
    match phase {
        Phase::Night => "Night Phase",
        Phase::Day => "Day Phase",
        Phase::Waiting => "Waiting",
        Phase::Ended => "Game Over",
    }
}

fn render_targets(out: &mut String, targets: &[PlayerName], pending: Option<&PlayerName>) {
    let _ = writeln!(out, "  targets: {}", join_names(targets));
    match pending {
        Some(target) => {
            let _ = writeln!(out, "  selected: {target} (act to submit)");
        }
        None => out.push_str("  target <name> to select\n"),
    }
}

fn render_night(out: &mut String, night: &NightPanel) {
    out.push_str("Night Phase\n");
    out.push_str(night.action.prompt());
    out.push('\n');
    if !night.targets.is_empty() {
        render_targets(out, &night.targets, night.pending.as_ref());
    }
    if let Some(killed) = &night.killed {
        let _ = writeln!(out, "Last night: {killed} was killed.");
    }
    if let Some(saved) = &night.saved {
        let _ = writeln!(out, "But {saved} was saved by the doctor!");
    }
    if let Some(found) = &night.investigation {
        let _ = writeln!(
            out,
            "Investigation: {} is a {}",
            found.target,
            found.role.map(|role| role.as_str()).unwrap_or("-")
        );
    }
}

fn render_day(out: &mut String, day: &DayPanel) {
    out.push_str("Day Phase\n");
    out.push_str("Vote to eliminate a player:\n");
    render_targets(out, &day.targets, day.pending.as_ref());
    if let Some(voted_out) = &day.voted_out {
        let _ = writeln!(out, "Yesterday: {voted_out} was voted out.");
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
