use std::sync::Arc;

use shared::{
    domain::{PlayerName, RoomId},
    error::{ErrorCode, Rejection},
    protocol::{CreateRoomRequest, JoinRoomRequest, TargetedActionRequest, VoteStartRequest},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod error;
pub mod phase;
pub mod session;
pub mod sync;
pub mod transport;

pub use error::{ClientError, ClientResult};
pub use phase::{
    ActionPanel, DayPanel, GamePanel, LobbyPanel, NightAction, NightPanel, Panel, PhaseView,
    RoleCard, StartVote,
};
pub use session::{GameView, PendingInput, RoomBounds, RoomView, SessionState, Step};
pub use sync::{SyncSettings, DEFAULT_POLL_INTERVAL};
pub use transport::{GameAuthority, HttpAuthority};

use sync::{Membership, SyncGate, SyncTask};

const CREATE_ROOM_FAILED: &str = "Failed to create room";
const JOIN_ROOM_FAILED: &str = "Failed to join room";
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    StepChanged(Step),
    SnapshotApplied,
    VoteTallyUpdated,
    Error(String),
}

struct ClientInner {
    session: SessionState,
    gate: SyncGate,
}

/// Drives one participant's view of a game against the remote authority.
///
/// All view-state lives in a single [`SessionState`] behind one lock that is never held
/// across a request. Snapshots only arrive through [`GameClient::refresh`], which the
/// background driver calls while the step is `Lobby` or `Game`.
pub struct GameClient {
    authority: Arc<dyn GameAuthority>,
    settings: SyncSettings,
    inner: Mutex<ClientInner>,
    sync_task: Mutex<Option<SyncTask>>,
    events: broadcast::Sender<ClientEvent>,
}

impl GameClient {
    pub fn new(server_url: &str) -> ClientResult<Arc<Self>> {
        let authority = HttpAuthority::new(server_url)?;
        Ok(Self::new_with_authority(
            Arc::new(authority),
            SyncSettings::default(),
        ))
    }

    pub fn new_with_authority(
        authority: Arc<dyn GameAuthority>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            authority,
            settings,
            inner: Mutex::new(ClientInner {
                session: SessionState::default(),
                gate: SyncGate::default(),
            }),
            sync_task: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn session(&self) -> SessionState {
        self.inner.lock().await.session.clone()
    }

    pub async fn view(&self) -> PhaseView {
        phase::select(&self.inner.lock().await.session)
    }

    pub async fn is_syncing(&self) -> bool {
        self.sync_task.lock().await.is_some()
    }

    pub async fn ping(&self) -> ClientResult<String> {
        self.authority.hello().await
    }

    pub async fn open_menu(self: &Arc<Self>) {
        self.set_step(Step::Menu).await;
    }

    pub async fn open_create(self: &Arc<Self>) {
        self.set_step(Step::Create).await;
    }

    pub async fn open_join(self: &Arc<Self>) {
        self.set_step(Step::Join).await;
    }

    pub async fn enter_game(self: &Arc<Self>) -> ClientResult<()> {
        {
            let inner = self.inner.lock().await;
            if inner.session.step != Step::Lobby || !inner.session.room.started {
                return Err(ClientError::validation("the game has not started yet"));
            }
        }
        self.set_step(Step::Game).await;
        Ok(())
    }

    pub async fn create_room(self: &Arc<Self>, bounds: RoomBounds) -> ClientResult<RoomId> {
        {
            let mut inner = self.inner.lock().await;
            inner.session.error = None;
            inner.session.bounds = bounds;
        }
        if let Err(err) = bounds.validate() {
            self.surface_error(err.user_message(CREATE_ROOM_FAILED)).await;
            return Err(err);
        }

        let request = CreateRoomRequest {
            min_players: bounds.min_players,
            max_players: bounds.max_players,
        };
        let outcome = match self.authority.create_room(&request).await {
            Ok(reply) => match reply.room_id {
                Some(room_id) if !room_id.is_empty() => Ok(room_id),
                _ => Err(Rejection::new(ErrorCode::Internal, CREATE_ROOM_FAILED).into()),
            },
            Err(err) => Err(err),
        };

        match outcome {
            Ok(room_id) => {
                info!(room_id = %room_id, "room: created");
                self.inner.lock().await.session.room_id = room_id.clone();
                self.set_step(Step::Join).await;
                Ok(room_id)
            }
            Err(err) => {
                warn!(error = %err, "room: create failed");
                self.surface_error(err.user_message(CREATE_ROOM_FAILED))
                    .await;
                Err(err)
            }
        }
    }

    pub async fn join_room(
        self: &Arc<Self>,
        room_id: RoomId,
        player_name: PlayerName,
    ) -> ClientResult<()> {
        self.inner.lock().await.session.error = None;
        if room_id.is_empty() || player_name.is_empty() {
            let err = ClientError::validation("room id and name are required");
            self.surface_error(err.user_message(JOIN_ROOM_FAILED)).await;
            return Err(err);
        }

        // Leaving lobby/game stops the current driver before the new identity is written.
        self.set_step(Step::Join).await;
        self.inner
            .lock()
            .await
            .session
            .begin_membership(room_id.clone(), player_name.clone());

        let request = JoinRoomRequest {
            room_id: room_id.clone(),
            player_name: player_name.clone(),
        };
        let outcome = match self.authority.join_room(&request).await {
            Ok(reply) if reply.success => Ok(()),
            Ok(_) => Err(Rejection::new(ErrorCode::Validation, JOIN_ROOM_FAILED).into()),
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            warn!(room_id = %room_id, player = %player_name, error = %err, "room: join failed");
            self.surface_error(err.user_message(JOIN_ROOM_FAILED)).await;
            return Err(err);
        }

        info!(room_id = %room_id, player = %player_name, "room: joined");
        self.set_step(Step::Lobby).await;
        // Immediate snapshot so the lobby does not wait a full interval.
        if let Err(err) = self.refresh().await {
            debug!(error = %err, "sync: initial fetch after join failed");
        }
        Ok(())
    }

    /// Fetches one snapshot and applies it unless a newer request has already been applied
    /// or the driver was stopped meanwhile. Returns whether the session changed.
    pub async fn refresh(&self) -> ClientResult<bool> {
        let (ticket, membership) = {
            let mut inner = self.inner.lock().await;
            let session = &inner.session;
            if !session.step.is_synced() || !session.has_membership() {
                return Err(ClientError::validation("not in a room"));
            }
            let membership = Membership {
                room_id: session.room_id.clone(),
                player_name: session.player_name.clone(),
            };
            (inner.gate.issue(), membership)
        };

        let status = match self
            .authority
            .room_status(&membership.room_id, &membership.player_name)
            .await
        {
            Ok(status) => status,
            Err(err) => {
                if err.is_rejection() {
                    warn!(room_id = %membership.room_id, error = %err, "sync: snapshot rejected, keeping last known state");
                } else {
                    debug!(room_id = %membership.room_id, error = %err, "sync: snapshot fetch failed");
                }
                return Err(err);
            }
        };

        let changed = {
            let mut inner = self.inner.lock().await;
            if !inner.gate.admit(ticket) {
                debug!(?ticket, "sync: dropping superseded snapshot");
                return Ok(false);
            }
            inner.session.apply_snapshot(status)
        };
        if changed {
            debug!(?ticket, room_id = %membership.room_id, "sync: snapshot applied");
            let _ = self.events.send(ClientEvent::SnapshotApplied);
        }
        Ok(changed)
    }

    pub async fn vote_start(&self, vote: bool) -> ClientResult<()> {
        let request = {
            let mut inner = self.inner.lock().await;
            let session = &mut inner.session;
            if !session.step.is_synced() || !session.has_membership() {
                return Err(ClientError::validation("join a room before voting"));
            }
            if session.is_narrator() {
                return Err(ClientError::validation("the narrator does not vote"));
            }
            if session.room.started {
                return Err(ClientError::validation("the game has already started"));
            }
            session.my_vote = Some(vote);
            VoteStartRequest {
                room_id: session.room_id.clone(),
                player_name: session.player_name.clone(),
                vote,
            }
        };

        let reply = match self.authority.vote_start(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(room_id = %request.room_id, error = %err, "room: start vote failed");
                return Err(err);
            }
        };

        {
            let mut inner = self.inner.lock().await;
            let session = &mut inner.session;
            if session.room_id != request.room_id || session.player_name != request.player_name {
                return Ok(());
            }
            if reply.started && !session.room.started {
                info!(room_id = %request.room_id, "room: game started");
            }
            session.apply_vote_tally(reply);
        }
        let _ = self.events.send(ClientEvent::VoteTallyUpdated);
        Ok(())
    }

    pub async fn choose_night_target(&self, target: PlayerName) -> ClientResult<()> {
        let mut inner = self.inner.lock().await;
        let view = phase::select(&inner.session);
        match &view.panel {
            Panel::Game(GamePanel {
                action: ActionPanel::Night(night),
                ..
            }) if night.targets.contains(&target) => {
                inner.session.pending.night_target = Some(target);
                Ok(())
            }
            _ => Err(ClientError::validation(format!(
                "{target} cannot be chosen tonight"
            ))),
        }
    }

    pub async fn choose_day_target(&self, target: PlayerName) -> ClientResult<()> {
        let mut inner = self.inner.lock().await;
        let view = phase::select(&inner.session);
        match &view.panel {
            Panel::Game(GamePanel {
                action: ActionPanel::Day(day),
                ..
            }) if day.targets.contains(&target) => {
                inner.session.pending.day_target = Some(target);
                Ok(())
            }
            _ => Err(ClientError::validation(format!(
                "{target} cannot be voted out today"
            ))),
        }
    }

    /// Dispatches the pending night target. The pending field is cleared before the request
    /// goes out and the reply body is never read.
    pub async fn submit_night_action(&self) -> ClientResult<()> {
        let request = {
            let mut inner = self.inner.lock().await;
            take_targeted_request(&mut inner.session, SessionState::take_night_target)?
        };
        info!(room_id = %request.room_id, target = %request.target, "action: night action");
        if let Err(err) = self.authority.night_action(&request).await {
            warn!(room_id = %request.room_id, error = %err, "action: night action not delivered");
            return Err(err);
        }
        Ok(())
    }

    /// Same fire-and-forget contract as [`GameClient::submit_night_action`].
    pub async fn submit_day_vote(&self) -> ClientResult<()> {
        let request = {
            let mut inner = self.inner.lock().await;
            take_targeted_request(&mut inner.session, SessionState::take_day_target)?
        };
        info!(room_id = %request.room_id, target = %request.target, "action: day vote");
        if let Err(err) = self.authority.day_vote(&request).await {
            warn!(room_id = %request.room_id, error = %err, "action: day vote not delivered");
            return Err(err);
        }
        Ok(())
    }

    async fn surface_error(&self, message: String) {
        self.inner.lock().await.session.error = Some(message.clone());
        let _ = self.events.send(ClientEvent::Error(message));
    }

    async fn set_step(self: &Arc<Self>, step: Step) {
        let changed = {
            let mut inner = self.inner.lock().await;
            let changed = inner.session.step != step;
            inner.session.step = step;
            changed
        };
        if changed {
            debug!(?step, "session: step changed");
            let _ = self.events.send(ClientEvent::StepChanged(step));
        }
        self.reconcile_sync().await;
    }

    /// Keeps exactly one driver alive while the step is synced, and none otherwise.
    async fn reconcile_sync(self: &Arc<Self>) {
        let mut task = self.sync_task.lock().await;
        let mut inner = self.inner.lock().await;
        let session = &inner.session;
        let desired = (session.step.is_synced() && session.has_membership()).then(|| Membership {
            room_id: session.room_id.clone(),
            player_name: session.player_name.clone(),
        });

        if let (Some(membership), Some(current)) = (&desired, task.as_ref()) {
            if current.serves(membership) {
                return;
            }
        }
        if let Some(current) = task.take() {
            current.stop();
        }
        inner.gate.invalidate();
        drop(inner);

        if let Some(membership) = desired {
            *task = Some(SyncTask::spawn(
                Arc::downgrade(self),
                membership,
                self.settings.poll_interval,
            ));
        }
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        if let Some(task) = self.sync_task.get_mut().take() {
            task.stop();
        }
    }
}

fn take_targeted_request(
    session: &mut SessionState,
    take: fn(&mut SessionState) -> Option<PlayerName>,
) -> ClientResult<TargetedActionRequest> {
    if !session.has_membership() {
        return Err(ClientError::validation("join a room before acting"));
    }
    match take(session) {
        Some(target) if !target.is_empty() => Ok(TargetedActionRequest {
            room_id: session.room_id.clone(),
            player_name: session.player_name.clone(),
            target,
        }),
        _ => Err(ClientError::validation("choose a target first")),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
