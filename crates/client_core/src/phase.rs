use shared::{
    domain::{Phase, PlayerName, Role, RoomId},
    protocol::{Investigation, PlayerRole},
};

use crate::session::{RoomBounds, SessionState, Step};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseView {
    pub current_step: Step,
    pub panel: Panel,
    pub action_eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    Menu,
    CreateRoom(RoomBounds),
    JoinRoom {
        room_id: RoomId,
        player_name: PlayerName,
    },
    Lobby(LobbyPanel),
    Game(GamePanel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartVote {
    NotVoted,
    Yes,
    No,
}

impl StartVote {
    pub fn from_tally(vote: Option<bool>) -> Self {
        match vote {
            None => Self::NotVoted,
            Some(true) => Self::Yes,
            Some(false) => Self::No,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotVoted => "Not voted",
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyPanel {
    pub room_id: RoomId,
    pub players: Vec<PlayerName>,
    pub min_players: Option<u8>,
    pub max_players: Option<u8>,
    /// One entry per player, in join order.
    pub tally: Vec<(PlayerName, StartVote)>,
    pub can_vote_yes: bool,
    pub can_vote_no: bool,
    /// Set once the room has started; unlocks the "enter game" control.
    pub can_enter_game: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCard {
    pub player_name: PlayerName,
    pub role: Option<Role>,
    pub alive: Vec<PlayerName>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePanel {
    pub card: RoleCard,
    pub action: ActionPanel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPanel {
    Waiting,
    Night(NightPanel),
    Day(DayPanel),
    /// Dead participants and the narrator watch without acting. `roster` is only filled for the narrator.
    Spectator {
        phase: Phase,
        roster: Vec<PlayerRole>,
    },
    GameOver {
        winner: Option<String>,
        detective_win: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightAction {
    Eliminate,
    Protect,
    Investigate,
    /// Villagers and unassigned roles only watch the night pass.
    Wait,
}

impl NightAction {
    pub fn for_role(role: Option<Role>) -> Self {
        match role {
            Some(Role::Mafia) => Self::Eliminate,
            Some(Role::Doctor) => Self::Protect,
            Some(Role::Detective) => Self::Investigate,
            Some(Role::Villager) | None => Self::Wait,
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Eliminate => "Choose someone to eliminate:",
            Self::Protect => "Choose someone to save:",
            Self::Investigate => "Choose someone to investigate:",
            Self::Wait => "Waiting for night actions...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightPanel {
    pub role: Option<Role>,
    pub action: NightAction,
    /// Empty when the role has no night action.
    pub targets: Vec<PlayerName>,
    pub pending: Option<PlayerName>,
    pub killed: Option<PlayerName>,
    pub saved: Option<PlayerName>,
    /// Only ever filled for the detective.
    pub investigation: Option<Investigation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPanel {
    pub targets: Vec<PlayerName>,
    pub pending: Option<PlayerName>,
    pub voted_out: Option<PlayerName>,
}

impl PhaseView {
    /// Targets a pending selection may currently name, if any panel accepts one.
    pub fn selectable_targets(&self) -> Option<&[PlayerName]> {
        match &self.panel {
            Panel::Game(GamePanel {
                action: ActionPanel::Night(night),
                ..
            }) if !night.targets.is_empty() => Some(&night.targets),
            Panel::Game(GamePanel {
                action: ActionPanel::Day(day),
                ..
            }) => Some(&day.targets),
            _ => None,
        }
    }
}

pub fn select(state: &SessionState) -> PhaseView {
    let panel = match state.step {
        Step::Menu => Panel::Menu,
        Step::Create => Panel::CreateRoom(state.bounds),
        Step::Join => Panel::JoinRoom {
            room_id: state.room_id.clone(),
            player_name: state.player_name.clone(),
        },
        Step::Lobby => Panel::Lobby(lobby_panel(state)),
        Step::Game => Panel::Game(GamePanel {
            card: RoleCard {
                player_name: state.player_name.clone(),
                role: state.game.role,
                alive: state.game.alive.clone(),
            },
            action: action_panel(state),
        }),
    };
    let action_eligible = is_eligible(&panel);
    PhaseView {
        current_step: state.step,
        panel,
        action_eligible,
    }
}

fn lobby_panel(state: &SessionState) -> LobbyPanel {
    let room = &state.room;
    let tally = room
        .players
        .iter()
        .map(|name| {
            (
                name.clone(),
                StartVote::from_tally(room.votes.get(name).copied()),
            )
        })
        .collect();
    let may_vote = !room.started && !state.is_narrator();
    LobbyPanel {
        room_id: state.room_id.clone(),
        players: room.players.clone(),
        min_players: room.min_players,
        max_players: room.max_players,
        tally,
        can_vote_yes: may_vote && state.my_vote != Some(true),
        can_vote_no: may_vote && state.my_vote != Some(false),
        can_enter_game: room.started,
    }
}

fn others(alive: &[PlayerName], me: &PlayerName) -> Vec<PlayerName> {
    alive.iter().filter(|name| *name != me).cloned().collect()
}

fn action_panel(state: &SessionState) -> ActionPanel {
    let game = &state.game;
    if game.winner.is_some() || game.phase == Phase::Ended {
        return ActionPanel::GameOver {
            winner: game.winner.clone(),
            detective_win: game.last_result.detective_win,
        };
    }
    if state.is_narrator() {
        return ActionPanel::Spectator {
            phase: game.phase,
            roster: game.player_roles.clone(),
        };
    }
    if game.phase.is_round() && !state.is_alive() {
        return ActionPanel::Spectator {
            phase: game.phase,
            roster: Vec::new(),
        };
    }
    let me = &state.player_name;
    match game.phase {
        Phase::Night => {
            let action = NightAction::for_role(game.role);
            let targets = match action {
                NightAction::Eliminate | NightAction::Investigate => others(&game.alive, me),
                NightAction::Protect => game.alive.clone(),
                NightAction::Wait => Vec::new(),
            };
            let investigation = match game.role {
                Some(Role::Detective) => game.last_result.investigated.clone(),
                _ => None,
            };
            ActionPanel::Night(NightPanel {
                role: game.role,
                action,
                targets,
                pending: state.pending.night_target.clone(),
                killed: game.last_result.killed.clone(),
                saved: game.last_result.saved.clone(),
                investigation,
            })
        }
        Phase::Day => ActionPanel::Day(DayPanel {
            targets: others(&game.alive, me),
            pending: state.pending.day_target.clone(),
            voted_out: game.last_result.voted_out.clone(),
        }),
        Phase::Waiting | Phase::Ended => ActionPanel::Waiting,
    }
}

fn is_eligible(panel: &Panel) -> bool {
    match panel {
        Panel::Menu => false,
        Panel::CreateRoom(_) | Panel::JoinRoom { .. } => true,
        Panel::Lobby(lobby) => lobby.can_vote_yes || lobby.can_vote_no || lobby.can_enter_game,
        Panel::Game(game) => match &game.action {
            ActionPanel::Night(night) => !night.targets.is_empty(),
            ActionPanel::Day(day) => !day.targets.is_empty(),
            ActionPanel::Waiting | ActionPanel::Spectator { .. } | ActionPanel::GameOver { .. } => {
                false
            }
        },
    }
}

#[cfg(test)]
#[path = "tests/phase_tests.rs"]
mod tests;
