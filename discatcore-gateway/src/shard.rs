//! The Gateway connection state machine: one WebSocket connection's full
//! lifecycle, from `connect` through the steady-state receive loop to a
//! protocol-directed or local close.
//!
//! Grounded on `original_source/discatcore/gateway/client.py`'s
//! `GatewayClient` (`connect`/`connection_loop`/`close`, the opcode
//! dispatch table, the `identify_payload`/`resume_payload` properties), with
//! the atomic session fields and stage tracking taken from
//! `twilight-gateway`'s `shard/processor/session.rs` and `shard/stage.rs`.

use crate::{
    config::Config,
    consumers,
    error::{CloseOutcome, Error, ErrorType, GatewayReconnect},
    heartbeat,
    inflater::Inflater,
    ratelimiter::CommandRatelimiter,
    session::Session,
    socket::{self, CommandReceiver, CommandSender, WsStream},
    stage::Stage,
};
use discatcore_dispatch::Dispatcher;
use discatcore_http::{route::routes, Body2, Client};
use discatcore_model::{
    event::Event,
    gateway::{
        payload::{Hello, Identify, RequestGuildMembers, RequestGuildMembersInfo, Resume, UpdatePresence, UpdateVoiceState},
        GatewayEvent, OpCode,
    },
    id::Id,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message;

/// Close code sent for a protocol-directed reconnect (`RECONNECT`,
/// `INVALID_SESSION`, or a zombied connection).
const CLOSE_RECONNECT: u16 = 1012;
/// Close code sent when the zombie-connection timeout elapses.
const CLOSE_ZOMBIE: u16 = 1008;
/// Close code sent for a clean, non-resuming local shutdown.
const CLOSE_NORMAL: u16 = 1000;

/// One Gateway connection's state machine. Cheap to share: every mutable
/// piece of state lives behind an `Arc`/lock, so commands can be issued
/// concurrently with the receive loop driving `connect`.
#[derive(Debug)]
pub struct Shard {
    config: Config,
    http: Arc<Client>,
    dispatcher: Dispatcher,
    session: Arc<Session>,
    ratelimiter: Arc<CommandRatelimiter>,
    sender: AsyncMutex<Option<CommandSender>>,
    /// Set by [`Shard::close`] just before it queues a close frame, so the
    /// receive loop knows whether to report `Terminated` or `Reconnect`
    /// once that frame actually goes out.
    pending_close: AsyncMutex<Option<bool>>,
}

impl Shard {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        let http = Arc::new(Client::with_api_version(config.token().to_owned(), Some(config.api_version())));
        let session = Arc::new(Session::new());

        consumers::register_all(&dispatcher, Arc::clone(&session));

        Self {
            config,
            http,
            dispatcher,
            session,
            ratelimiter: CommandRatelimiter::new(),
            sender: AsyncMutex::new(None),
            pending_close: AsyncMutex::new(None),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.session.stage()
    }

    /// Runs the connection lifecycle until it's told not to reconnect,
    /// re-entering `connect` with the captured resume url on every
    /// protocol-directed reconnect signal, per spec §4.3.1.
    pub async fn run(&self) -> Result<(), Error> {
        let mut url = self.config.gateway_url().map(str::to_owned);

        loop {
            match self.connect(url.take()).await? {
                CloseOutcome::Terminated => return Ok(()),
                CloseOutcome::Reconnect(GatewayReconnect { resume_url, can_resume }) => {
                    self.session.set_can_resume(can_resume);
                    url = resume_url.map(String::from);
                }
            }
        }
    }

    /// Runs a single connection end to end: handshake, steady-state receive
    /// loop, and whatever close eventually ends it.
    pub async fn connect(&self, url: Option<String>) -> Result<CloseOutcome, Error> {
        self.session.set_stage(Stage::Connecting);

        let url = match url.or_else(|| self.config.gateway_url().map(str::to_owned)) {
            Some(url) => url,
            None => self.fetch_gateway_url().await?,
        };
        let url = self.with_connect_query(&url)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(%url, "connecting to the gateway");

        let (stream, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|source| Error::new(ErrorType::Establishing, Some(Box::new(source))))?;

        self.session.set_stage(Stage::AwaitingHello);
        self.dispatcher.dispatch(Event::Connecting).await;

        let (mut sink, mut stream) = stream.split();
        let (sender, mut receiver) = socket::channel();
        let mut inflater = Inflater::new();

        let hello = match self.read_hello(&mut stream, &mut inflater).await? {
            Some(hello) => hello,
            None => {
                self.send_close(&mut sink, CLOSE_NORMAL).await;
                self.session.set_stage(Stage::Terminated);
                return Ok(CloseOutcome::Terminated);
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(interval_millis = hello.heartbeat_interval, "received hello");

        self.session.set_heartbeat_interval_millis(hello.heartbeat_interval);
        self.session.set_stage(Stage::Handshaking);
        *self.sender.lock().await = Some(sender.clone());

        let heartbeat_handle = heartbeat::spawn(Arc::clone(&self.session), sender.clone());

        if self.session.can_resume() {
            #[cfg(feature = "tracing")]
            tracing::debug!(session_id = ?self.session.session_id(), sequence = ?self.session.sequence(), "resuming session");
            self.dispatcher.dispatch(Event::Resuming).await;
            self.send_resume(&sender)?;
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!("identifying a new session");
            self.dispatcher.dispatch(Event::Identifying).await;
            self.send_identify(&sender)?;
        }

        self.session.set_stage(Stage::Running);
        self.session.record_heartbeat_ack();
        self.dispatcher.dispatch(Event::Connected).await;

        let outcome = self
            .receive_loop(&mut sink, &mut stream, &mut receiver, &mut inflater)
            .await;

        self.session.set_stage(Stage::Closing);

        heartbeat_handle.abort();
        let _ = heartbeat_handle.await;
        *self.sender.lock().await = None;

        let reconnect = !matches!(outcome, Ok(CloseOutcome::Terminated));
        self.session
            .set_stage(if reconnect { Stage::Reconnecting } else { Stage::Terminated });
        self.dispatcher.dispatch(Event::Disconnected { reconnect }).await;

        outcome
    }

    async fn receive_loop(
        &self,
        sink: &mut futures_util::stream::SplitSink<WsStream, Message>,
        stream: &mut futures_util::stream::SplitStream<WsStream>,
        receiver: &mut CommandReceiver,
        inflater: &mut Inflater,
    ) -> Result<CloseOutcome, Error> {
        loop {
            if self.session.is_zombied(self.config.heartbeat_timeout()) {
                #[cfg(feature = "tracing")]
                tracing::warn!(timeout = ?self.config.heartbeat_timeout(), "connection zombied, reconnecting");

                self.send_close(sink, CLOSE_ZOMBIE).await;
                return Ok(CloseOutcome::Reconnect(GatewayReconnect {
                    resume_url: self.session.resume_url(),
                    can_resume: true,
                }));
            }

            tokio::select! {
                queued = receiver.recv() => {
                    let Some(message) = queued else { continue };
                    let is_local_close = matches!(message, Message::Close(_));
                    let sent = sink.send(message).await;

                    if is_local_close {
                        let reconnect = self.pending_close.lock().await.take().unwrap_or(false);
                        return Ok(if reconnect {
                            CloseOutcome::Reconnect(GatewayReconnect {
                                resume_url: self.session.resume_url(),
                                can_resume: self.session.can_resume(),
                            })
                        } else {
                            CloseOutcome::Terminated
                        });
                    }

                    if sent.is_err() {
                        return Ok(CloseOutcome::Reconnect(GatewayReconnect {
                            resume_url: self.session.resume_url(),
                            can_resume: self.session.can_resume(),
                        }));
                    }
                }
                frame = stream.next() => {
                    let Some(frame) = frame else {
                        return Ok(CloseOutcome::Reconnect(GatewayReconnect {
                            resume_url: self.session.resume_url(),
                            can_resume: self.session.can_resume(),
                        }));
                    };

                    let message = frame.map_err(|source| Error::new(ErrorType::Establishing, Some(Box::new(source))))?;

                    if let Some(outcome) = self.handle_message(sink, message, inflater).await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// Handles one inbound WebSocket message, returning `Some(outcome)` once
    /// the connection should stop.
    async fn handle_message(
        &self,
        sink: &mut futures_util::stream::SplitSink<WsStream, Message>,
        message: Message,
        inflater: &mut Inflater,
    ) -> Result<Option<CloseOutcome>, Error> {
        let event = match message {
            Message::Text(text) => {
                Some(serde_json::from_str::<GatewayEvent>(&text).map_err(|source| Error::new(ErrorType::Deserializing, Some(Box::new(source))))?)
            }
            Message::Binary(bytes) => {
                inflater.extend(&bytes);
                let decompressed = inflater
                    .msg()
                    .map_err(|source| Error::new(ErrorType::Decompressing, Some(Box::new(source))))?;

                match decompressed {
                    Some(complete) => {
                        let event = serde_json::from_slice::<GatewayEvent>(complete)
                            .map_err(|source| Error::new(ErrorType::Deserializing, Some(Box::new(source))))?;
                        inflater.clear();
                        Some(event)
                    }
                    None => None,
                }
            }
            Message::Ping(payload) => {
                let _ = sink.send(Message::Pong(payload)).await;
                None
            }
            Message::Pong(_) | Message::Frame(_) => None,
            Message::Close(frame) => {
                // The peer initiated the close; reply in kind before tearing
                // the connection down, same as the zombie-timeout path.
                #[cfg(feature = "tracing")]
                tracing::warn!(?frame, "gateway closed the connection");
                #[cfg(not(feature = "tracing"))]
                let _ = &frame;

                self.send_close(sink, CLOSE_RECONNECT).await;
                return Ok(Some(CloseOutcome::Reconnect(GatewayReconnect {
                    resume_url: self.session.resume_url(),
                    can_resume: self.session.can_resume(),
                })));
            }
        };

        let Some(event) = event else {
            return Ok(None);
        };

        if let Some(sequence) = event.s {
            self.session.set_sequence(sequence);
        }

        self.handle_opcode(sink, event).await
    }

    async fn handle_opcode(
        &self,
        sink: &mut futures_util::stream::SplitSink<WsStream, Message>,
        event: GatewayEvent,
    ) -> Result<Option<CloseOutcome>, Error> {
        match event.op {
            OpCode::Dispatch => {
                let name = event.t.unwrap_or_default();
                let payload = event.d.unwrap_or(serde_json::Value::Null);

                #[cfg(feature = "tracing")]
                tracing::trace!(%name, %payload, "received dispatch");

                if consumers::KNOWN_DISPATCH_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
                    self.dispatcher.consume(&name, payload);
                } else {
                    self.dispatcher.dispatch(Event::Unknown(name, payload)).await;
                }

                Ok(None)
            }
            OpCode::Heartbeat => {
                #[cfg(feature = "tracing")]
                tracing::debug!("received heartbeat request, responding immediately");

                if let Ok(sender) = self.connected_sender().await {
                    socket::send_payload(&sender, &discatcore_model::gateway::payload::Heartbeat::new(self.session.sequence()))?;
                }
                Ok(None)
            }
            OpCode::Reconnect => {
                #[cfg(feature = "tracing")]
                tracing::warn!("gateway requested a reconnect");

                self.send_close(sink, CLOSE_RECONNECT).await;
                Ok(Some(CloseOutcome::Reconnect(GatewayReconnect {
                    resume_url: self.session.resume_url(),
                    can_resume: self.session.can_resume(),
                })))
            }
            OpCode::InvalidSession => {
                let can_resume = event.d.as_ref().and_then(serde_json::Value::as_bool).unwrap_or(false);

                #[cfg(feature = "tracing")]
                tracing::warn!(can_resume, "session invalidated");

                self.session.set_can_resume(can_resume);
                self.send_close(sink, CLOSE_RECONNECT).await;

                Ok(Some(CloseOutcome::Reconnect(GatewayReconnect {
                    resume_url: self.session.resume_url(),
                    can_resume,
                })))
            }
            OpCode::Hello => Ok(None),
            OpCode::HeartbeatAck => {
                #[cfg(feature = "tracing")]
                tracing::debug!("received heartbeat ack");

                self.session.record_heartbeat_ack();
                Ok(None)
            }
            OpCode::Identify | OpCode::PresenceUpdate | OpCode::VoiceStateUpdate | OpCode::Resume | OpCode::RequestGuildMembers => {
                // Outbound-only opcodes; Discord never sends these back.
                Ok(None)
            }
        }
    }

    async fn read_hello(
        &self,
        stream: &mut futures_util::stream::SplitStream<WsStream>,
        inflater: &mut Inflater,
    ) -> Result<Option<Hello>, Error> {
        loop {
            let Some(frame) = stream.next().await else {
                return Ok(None);
            };
            let message = frame.map_err(|source| Error::new(ErrorType::Establishing, Some(Box::new(source))))?;

            let raw = match message {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(bytes) => {
                    inflater.extend(&bytes);
                    match inflater
                        .msg()
                        .map_err(|source| Error::new(ErrorType::Decompressing, Some(Box::new(source))))?
                    {
                        Some(complete) => {
                            let owned = complete.to_vec();
                            inflater.clear();
                            owned
                        }
                        None => continue,
                    }
                }
                Message::Close(_) => return Ok(None),
                _ => continue,
            };

            let event = serde_json::from_slice::<GatewayEvent>(&raw)
                .map_err(|source| Error::new(ErrorType::Deserializing, Some(Box::new(source))))?;

            return match event.op {
                OpCode::Hello => {
                    let d = event.d.ok_or_else(|| Error::new(ErrorType::ExpectedHello, None))?;
                    let hello: Hello = serde_json::from_value(d).map_err(|source| Error::new(ErrorType::Deserializing, Some(Box::new(source))))?;
                    Ok(Some(hello))
                }
                _ => Err(Error::new(ErrorType::ExpectedHello, None)),
            };
        }
    }

    /// Appends the `v`/`encoding`/`compress` query parameters Discord
    /// requires on the connect URL: `v` pins the payload shape to this
    /// client's configured API version, `encoding=json` keeps `d` as JSON
    /// rather than ETF, and `compress=zlib-stream` is what tells Discord to
    /// send the zlib-stream-compressed binary frames [`Inflater`] decodes —
    /// without it every frame arrives as plain-text JSON instead.
    fn with_connect_query(&self, url: &str) -> Result<String, Error> {
        let mut url = url::Url::parse(url).map_err(|source| Error::new(ErrorType::Establishing, Some(Box::new(source))))?;

        url.query_pairs_mut()
            .append_pair("v", &self.config.api_version().to_string())
            .append_pair("encoding", "json")
            .append_pair("compress", "zlib-stream");

        Ok(url.into())
    }

    async fn fetch_gateway_url(&self) -> Result<String, Error> {
        let bytes = self
            .http
            .request(routes::get_gateway_bot(), Body2::default())
            .await
            .map_err(|source| Error::new(ErrorType::RetrievingGatewayUrl, Some(Box::new(source))))?;

        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|source| Error::new(ErrorType::Deserializing, Some(Box::new(source))))?;

        value
            .get("url")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::new(ErrorType::RetrievingGatewayUrl, None))
    }

    fn send_identify(&self, sender: &CommandSender) -> Result<(), Error> {
        socket::send_payload(sender, &Identify::new(self.config.token(), self.config.intents()))
    }

    fn send_resume(&self, sender: &CommandSender) -> Result<(), Error> {
        let session_id = self.session.session_id().unwrap_or_default();
        let sequence = self.session.sequence().unwrap_or(0);
        socket::send_payload(sender, &Resume::new(self.config.token(), &*session_id, sequence))
    }

    async fn send_close(&self, sink: &mut futures_util::stream::SplitSink<WsStream, Message>, code: u16) {
        let frame = tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(code),
            reason: std::borrow::Cow::Borrowed(""),
        };
        let _ = sink.send(Message::Close(Some(frame))).await;
    }

    /// Sends an opcode-3 presence update. Goes through the send-rate
    /// limiter like every non-heartbeat command.
    pub async fn update_presence(&self, status: impl Into<String>, afk: bool, since: Option<u64>) -> Result<(), Error> {
        self.ratelimiter.acquire().await;
        let sender = self.connected_sender().await?;
        socket::send_payload(&sender, &UpdatePresence::new(status, afk, since))
    }

    /// Sends an opcode-4 voice state update.
    pub async fn update_voice_state(&self, guild_id: Id, channel_id: Option<Id>, self_mute: bool, self_deaf: bool) -> Result<(), Error> {
        self.ratelimiter.acquire().await;
        let sender = self.connected_sender().await?;
        socket::send_payload(&sender, &UpdateVoiceState::new(guild_id, channel_id, self_mute, self_deaf))
    }

    /// Sends an opcode-8 guild member request.
    pub async fn request_guild_members(&self, info: RequestGuildMembersInfo) -> Result<(), Error> {
        self.ratelimiter.acquire().await;
        let sender = self.connected_sender().await?;
        socket::send_payload(&sender, &RequestGuildMembers::from(info))
    }

    /// Requests a local shutdown of the current connection. `reconnect`
    /// decides what [`run`](Self::run) does next: `true` re-enters
    /// `connect` (resuming if the session still allows it), `false` ends
    /// `run` once this connection's close frame has gone out.
    pub async fn close(&self, code: u16, reconnect: bool) -> Result<(), Error> {
        *self.pending_close.lock().await = Some(reconnect);

        let sender = self.connected_sender().await?;
        let frame = tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(code),
            reason: std::borrow::Cow::Borrowed(""),
        };

        sender
            .send(Message::Close(Some(frame)))
            .map_err(|source| Error::new(ErrorType::Sending, Some(Box::new(source))))
    }

    async fn connected_sender(&self) -> Result<CommandSender, Error> {
        self.sender
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::new(ErrorType::Sending, None))
    }
}

#[cfg(test)]
mod tests {
    use super::Shard;
    use crate::config::Config;
    use discatcore_dispatch::Dispatcher;
    use discatcore_model::Intents;
    use static_assertions::assert_impl_all;
    use std::fmt::Debug;

    assert_impl_all!(Shard: Send, Sync, Debug);

    #[test]
    fn new_starts_disconnected() {
        let shard = Shard::new(Config::new("token", Intents::empty()), Dispatcher::new());
        assert_eq!(shard.stage(), crate::stage::Stage::Disconnected);
    }

    #[test]
    fn connect_query_requests_json_encoding_and_zlib_stream_compression() {
        let shard = Shard::new(Config::new("token", Intents::empty()), Dispatcher::new());
        let url = shard.with_connect_query("wss://gateway.discord.gg").unwrap();

        assert!(url.contains("v=10"));
        assert!(url.contains("encoding=json"));
        assert!(url.contains("compress=zlib-stream"));
    }
}
