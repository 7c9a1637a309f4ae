use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Phase, PlayerName, Role, RoomId};

/// The authority sends `null` for collections it has not populated yet.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unassigned roles arrive as `null` or `""`; unknown names are treated the same way.
fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .as_deref()
        .and_then(Role::parse))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub min_players: u8,
    pub max_players: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub room_id: RoomId,
    pub player_name: PlayerName,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub players: Vec<PlayerName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatusQuery {
    pub room_id: RoomId,
    pub player_name: PlayerName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigation {
    pub target: PlayerName,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
}

/// Outcome of the most recently resolved phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killed: Option<PlayerName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<PlayerName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investigated: Option<Investigation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voted_out: Option<PlayerName>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub detective_win: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRole {
    pub name: PlayerName,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
}

/// Canonical room/game snapshot, scoped to the requesting participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub players: Vec<PlayerName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_players: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u8>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub votes: BTreeMap<PlayerName, bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub started: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phase: Phase,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alive: Vec<PlayerName>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_result: LastResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub player_roles: Vec<PlayerRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteStartRequest {
    pub room_id: RoomId,
    pub player_name: PlayerName,
    pub vote: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStartResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub votes: BTreeMap<PlayerName, bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared payload of the night-action and day-vote submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedActionRequest {
    pub room_id: RoomId,
    pub player_name: PlayerName,
    pub target: PlayerName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloResponse {
    pub message: String,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
