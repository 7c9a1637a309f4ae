use std::collections::BTreeMap;

use shared::{
    domain::{Phase, PlayerName, Role, RoomId, MAX_PLAYERS_CEILING, MIN_PLAYERS_FLOOR},
    protocol::{LastResult, PlayerRole, RoomStatus, VoteStartResponse},
};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Step {
    #[default]
    Menu,
    Create,
    Join,
    Lobby,
    Game,
}

impl Step {
    /// Steps during which the room snapshot is kept in sync.
    pub fn is_synced(self) -> bool {
        matches!(self, Self::Lobby | Self::Game)
    }
}

/// Player-count bounds as entered on the create form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomBounds {
    pub min_players: u8,
    pub max_players: u8,
}

impl Default for RoomBounds {
    fn default() -> Self {
        Self {
            min_players: 5,
            max_players: 10,
        }
    }
}

impl RoomBounds {
    pub fn new(min_players: u8, max_players: u8) -> Self {
        Self {
            min_players,
            max_players,
        }
    }

    pub fn validate(self) -> ClientResult<Self> {
        if self.min_players < MIN_PLAYERS_FLOOR {
            return Err(ClientError::validation(format!(
                "minimum players must be at least {MIN_PLAYERS_FLOOR}"
            )));
        }
        if self.max_players > MAX_PLAYERS_CEILING {
            return Err(ClientError::validation(format!(
                "maximum players must be at most {MAX_PLAYERS_CEILING}"
            )));
        }
        if self.max_players < self.min_players {
            return Err(ClientError::validation(
                "maximum players must not be below minimum players",
            ));
        }
        Ok(self)
    }
}

/// Room fields owned by synchronization (start-vote replies may refresh `votes`/`started`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomView {
    pub players: Vec<PlayerName>,
    pub min_players: Option<u8>,
    pub max_players: Option<u8>,
    pub votes: BTreeMap<PlayerName, bool>,
    pub started: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameView {
    pub phase: Phase,
    pub role: Option<Role>,
    pub alive: Vec<PlayerName>,
    pub last_result: LastResult,
    pub winner: Option<String>,
    pub player_roles: Vec<PlayerRole>,
}

impl GameView {
    pub fn is_alive(&self, name: &PlayerName) -> bool {
        self.alive.contains(name)
    }
}

/// Unsubmitted selections. Only local input fills these; dispatch clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInput {
    pub night_target: Option<PlayerName>,
    pub day_target: Option<PlayerName>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub step: Step,
    pub room_id: RoomId,
    pub player_name: PlayerName,
    pub bounds: RoomBounds,
    pub room: RoomView,
    pub game: GameView,
    pub my_vote: Option<bool>,
    pub pending: PendingInput,
    pub error: Option<String>,
}

impl SessionState {
    pub fn has_membership(&self) -> bool {
        !self.room_id.is_empty() && !self.player_name.is_empty()
    }

    pub fn is_narrator(&self) -> bool {
        self.player_name.is_narrator()
    }

    pub fn is_alive(&self) -> bool {
        self.game.is_alive(&self.player_name)
    }

    /// Replaces the synced views wholesale. Returns whether anything changed.
    pub fn apply_snapshot(&mut self, status: RoomStatus) -> bool {
        let RoomStatus {
            players,
            min_players,
            max_players,
            votes,
            started,
            phase,
            role,
            alive,
            last_result,
            winner,
            player_roles,
            error: _,
        } = status;

        let room = RoomView {
            players,
            min_players,
            max_players,
            votes,
            started,
        };
        let game = GameView {
            phase,
            role,
            alive,
            last_result,
            winner,
            player_roles,
        };

        if self.room == room && self.game == game {
            return false;
        }
        self.room = room;
        self.game = game;
        true
    }

    /// Start-vote replies are the one submission allowed to touch synced fields.
    pub fn apply_vote_tally(&mut self, reply: VoteStartResponse) {
        self.room.votes = reply.votes;
        self.room.started = reply.started;
    }

    /// Forgets everything learned about a previous room before a new membership begins.
    pub fn begin_membership(&mut self, room_id: RoomId, player_name: PlayerName) {
        self.room_id = room_id;
        self.player_name = player_name;
        self.room = RoomView::default();
        self.game = GameView::default();
        self.my_vote = None;
        self.pending = PendingInput::default();
    }

    pub fn take_night_target(&mut self) -> Option<PlayerName> {
        self.pending.night_target.take()
    }

    pub fn take_day_target(&mut self) -> Option<PlayerName> {
        self.pending.day_target.take()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
