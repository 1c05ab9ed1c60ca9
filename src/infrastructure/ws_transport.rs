// WebSocket transport - Drives the connection manager over tokio-tungstenite
use crate::application::connection_manager::{
    ConnectionEvent, ConnectionManager, Effect, TimerToken,
};
use crate::application::dashboard_controller::ControllerInput;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct WsConnectionRunner {
    url: Url,
    manager: ConnectionManager,
    connect_timeout: Duration,
    controller: mpsc::Sender<ControllerInput>,
    socket: Option<WsStream>,
    heartbeat: Option<(TimerToken, Interval)>,
    reconnect: Option<(TimerToken, Pin<Box<Sleep>>)>,
}

impl WsConnectionRunner {
    pub fn new(
        url: Url,
        manager: ConnectionManager,
        connect_timeout: Duration,
        controller: mpsc::Sender<ControllerInput>,
    ) -> Self {
        Self {
            url,
            manager,
            connect_timeout,
            controller,
            socket: None,
            heartbeat: None,
            reconnect: None,
        }
    }

    /// Connect and keep reconnecting until `shutdown` fires or the
    /// controller goes away
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let mut pending_effects: VecDeque<Effect> =
            self.manager.handle(ConnectionEvent::Start).into();

        loop {
            while let Some(effect) = pending_effects.pop_front() {
                if let Some(event) = self.apply(effect, &mut shutdown).await {
                    pending_effects.extend(self.manager.handle(event));
                }
            }

            if self.manager.is_shut_down() {
                break;
            }

            let event = tokio::select! {
                _ = &mut shutdown => ConnectionEvent::Shutdown,
                token = next_tick(&mut self.heartbeat) => ConnectionEvent::HeartbeatTick(token),
                token = next_deadline(&mut self.reconnect) => ConnectionEvent::ReconnectElapsed(token),
                frame = next_frame(&mut self.socket) => match frame_event(frame) {
                    Some(event) => event,
                    None => continue,
                },
            };
            pending_effects.extend(self.manager.handle(event));
        }

        tracing::info!("Telemetry stream stopped");
    }

    /// Perform one effect, returning any event it produced
    async fn apply(
        &mut self,
        effect: Effect,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> Option<ConnectionEvent> {
        match effect {
            Effect::Open => Some(self.open(shutdown).await),
            Effect::Send(text) => {
                let socket = self.socket.as_mut()?;
                match socket.send(Message::Text(text)).await {
                    Ok(()) => None,
                    Err(e) => Some(ConnectionEvent::Errored(format!("send failed: {}", e))),
                }
            }
            Effect::StartHeartbeat { token, interval } => {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some((token, ticker));
                None
            }
            Effect::CancelHeartbeat(token) => {
                if self.heartbeat.as_ref().is_some_and(|(armed, _)| *armed == token) {
                    self.heartbeat = None;
                }
                None
            }
            Effect::ScheduleReconnect { token, delay } => {
                self.reconnect = Some((token, Box::pin(tokio::time::sleep(delay))));
                None
            }
            Effect::CancelReconnect(token) => {
                if self.reconnect.as_ref().is_some_and(|(armed, _)| *armed == token) {
                    self.reconnect = None;
                }
                None
            }
            Effect::CloseTransport => {
                if let Some(mut socket) = self.socket.take() {
                    match tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::debug!("Error closing telemetry stream: {}", e),
                        Err(_) => tracing::debug!("Timed out closing telemetry stream"),
                    }
                }
                None
            }
            Effect::Notify(event) => {
                if self
                    .controller
                    .send(ControllerInput::Source(event))
                    .await
                    .is_err()
                {
                    tracing::warn!("Dashboard controller is gone, stopping telemetry stream");
                    return Some(ConnectionEvent::Shutdown);
                }
                None
            }
        }
    }

    /// A connect attempt in flight is abandoned as soon as shutdown fires
    async fn open(&mut self, shutdown: &mut oneshot::Receiver<()>) -> ConnectionEvent {
        tracing::info!("Connecting to {}", self.url);
        let connect = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()));
        let outcome = tokio::select! {
            _ = shutdown => return ConnectionEvent::Shutdown,
            outcome = connect => outcome,
        };
        match outcome {
            Ok(Ok((socket, _response))) => {
                self.socket = Some(socket);
                ConnectionEvent::Opened
            }
            Ok(Err(e)) => ConnectionEvent::Errored(format!("connect failed: {}", e)),
            Err(_) => ConnectionEvent::Errored(format!(
                "connect timed out after {:?}",
                self.connect_timeout
            )),
        }
    }
}

async fn next_tick(slot: &mut Option<(TimerToken, Interval)>) -> TimerToken {
    match slot {
        Some((token, ticker)) => {
            ticker.tick().await;
            *token
        }
        None => pending().await,
    }
}

/// Resolves once per scheduled reconnect; the slot is emptied when it fires
async fn next_deadline(slot: &mut Option<(TimerToken, Pin<Box<Sleep>>)>) -> TimerToken {
    let Some((token, sleep)) = slot.as_mut() else {
        return pending().await;
    };
    sleep.as_mut().await;
    let token = *token;
    *slot = None;
    token
}

async fn next_frame(
    socket: &mut Option<WsStream>,
) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(socket) => socket.next().await,
        None => pending().await,
    }
}

fn frame_event(frame: Option<Result<Message, tungstenite::Error>>) -> Option<ConnectionEvent> {
    match frame {
        Some(Ok(Message::Text(text))) => Some(ConnectionEvent::Message(text)),
        Some(Ok(Message::Binary(data))) => Some(ConnectionEvent::Message(
            String::from_utf8_lossy(&data).into_owned(),
        )),
        Some(Ok(Message::Close(_))) | None => Some(ConnectionEvent::Closed),
        // Ping/pong are answered by tungstenite itself
        Some(Ok(_)) => None,
        Some(Err(e)) => Some(ConnectionEvent::Errored(e.to_string())),
    }
}
