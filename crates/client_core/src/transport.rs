use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{PlayerName, RoomId},
    error::{ErrorBody, ErrorCode, Rejection},
    protocol::{
        CreateRoomRequest, CreateRoomResponse, HelloResponse, JoinRoomRequest, JoinRoomResponse,
        RoomStatus, RoomStatusQuery, TargetedActionRequest, VoteStartRequest, VoteStartResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Requests the client can make of the authority.
///
/// Replies that carry an `error` field come back as [`ClientError::Rejected`]; a reply
/// returned as `Ok` never carries one.
#[async_trait]
pub trait GameAuthority: Send + Sync {
    async fn create_room(&self, request: &CreateRoomRequest) -> ClientResult<CreateRoomResponse>;
    async fn join_room(&self, request: &JoinRoomRequest) -> ClientResult<JoinRoomResponse>;
    async fn room_status(&self, room_id: &RoomId, player_name: &PlayerName)
        -> ClientResult<RoomStatus>;
    async fn vote_start(&self, request: &VoteStartRequest) -> ClientResult<VoteStartResponse>;
    /// Fire-and-forget: the reply body is not read.
    async fn night_action(&self, request: &TargetedActionRequest) -> ClientResult<()>;
    /// Fire-and-forget: the reply body is not read.
    async fn day_vote(&self, request: &TargetedActionRequest) -> ClientResult<()>;
    async fn hello(&self) -> ClientResult<String>;
}

trait AuthorityReply {
    fn error_message(&self) -> Option<&str>;
}

macro_rules! error_field_reply {
    ($($ty:ty),+ $(,)?) => {
        $(impl AuthorityReply for $ty {
            fn error_message(&self) -> Option<&str> {
                self.error.as_deref()
            }
        })+
    };
}

error_field_reply!(CreateRoomResponse, JoinRoomResponse, RoomStatus, VoteStartResponse);

impl AuthorityReply for HelloResponse {
    fn error_message(&self) -> Option<&str> {
        None
    }
}

pub struct HttpAuthority {
    http: Client,
    base_url: Url,
}

impl HttpAuthority {
    pub fn new(server_url: &str) -> ClientResult<Self> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> ClientResult<Self> {
        let mut base_url = Url::parse(server_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

/// Decodes a JSON reply whatever its status: the authority pairs 4xx statuses with `{error}` bodies.
async fn decode_reply<T>(response: Response) -> ClientResult<T>
where
    T: DeserializeOwned + AuthorityReply,
{
    let status = response.status().as_u16();
    let body = response.bytes().await?;
    let reply: T = match serde_json::from_slice(&body) {
        Ok(reply) => reply,
        Err(source) => {
            // Bare `{error}` bodies do not carry the fields the typed reply requires.
            if let Ok(ErrorBody { error }) = serde_json::from_slice::<ErrorBody>(&body) {
                return Err(Rejection::new(ErrorCode::from_status(status), error).into());
            }
            return Err(ClientError::Decode { status, source });
        }
    };
    if let Some(message) = reply.error_message() {
        return Err(Rejection::new(ErrorCode::from_status(status), message).into());
    }
    Ok(reply)
}

#[async_trait]
impl GameAuthority for HttpAuthority {
    async fn create_room(&self, request: &CreateRoomRequest) -> ClientResult<CreateRoomResponse> {
        let res = self
            .http
            .post(self.endpoint("api/create_room")?)
            .json(request)
            .send()
            .await?;
        decode_reply(res).await
    }

    async fn join_room(&self, request: &JoinRoomRequest) -> ClientResult<JoinRoomResponse> {
        let res = self
            .http
            .post(self.endpoint("api/join_room")?)
            .json(request)
            .send()
            .await?;
        decode_reply(res).await
    }

    async fn room_status(
        &self,
        room_id: &RoomId,
        player_name: &PlayerName,
    ) -> ClientResult<RoomStatus> {
        let res = self
            .http
            .get(self.endpoint("api/room_status")?)
            .query(&RoomStatusQuery {
                room_id: room_id.clone(),
                player_name: player_name.clone(),
            })
            .send()
            .await?;
        decode_reply(res).await
    }

    async fn vote_start(&self, request: &VoteStartRequest) -> ClientResult<VoteStartResponse> {
        let res = self
            .http
            .post(self.endpoint("api/vote_start")?)
            .json(request)
            .send()
            .await?;
        decode_reply(res).await
    }

    async fn night_action(&self, request: &TargetedActionRequest) -> ClientResult<()> {
        let res = self
            .http
            .post(self.endpoint("api/night_action")?)
            .json(request)
            .send()
            .await?;
        debug!(status = res.status().as_u16(), "action: night action dispatched");
        Ok(())
    }

    async fn day_vote(&self, request: &TargetedActionRequest) -> ClientResult<()> {
        let res = self
            .http
            .post(self.endpoint("api/day_vote")?)
            .json(request)
            .send()
            .await?;
        debug!(status = res.status().as_u16(), "action: day vote dispatched");
        Ok(())
    }

    async fn hello(&self) -> ClientResult<String> {
        let res = self.http.get(self.endpoint("api/hello")?).send().await?;
        let reply: HelloResponse = decode_reply(res).await?;
        Ok(reply.message)
    }
}
