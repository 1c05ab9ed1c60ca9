// Streaming connection manager - Reconnecting state machine for the telemetry stream
//
// The manager does no I/O. A transport driver feeds it `ConnectionEvent`s and
// carries out the `Effect`s it returns, which keeps every transition testable
// without a socket.
use crate::application::backoff::Backoff;
use crate::domain::telemetry::{heartbeat_frame, DecodeError, InboundMessage, TelemetryReading};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
}

/// Identifies one armed timer; events carrying an older token are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

#[derive(Debug)]
pub enum ConnectionEvent {
    Start,
    Opened,
    Message(String),
    Errored(String),
    Closed,
    HeartbeatTick(TimerToken),
    ReconnectElapsed(TimerToken),
    Shutdown,
}

/// What the controller hears about the stream
#[derive(Debug)]
pub enum SourceEvent {
    Connected,
    Disconnected { reconnecting: bool },
    Reset,
    Reading(TelemetryReading),
    DecodeError(DecodeError),
}

#[derive(Debug)]
pub enum Effect {
    Open,
    Send(String),
    StartHeartbeat { token: TimerToken, interval: Duration },
    CancelHeartbeat(TimerToken),
    ScheduleReconnect { token: TimerToken, delay: Duration },
    CancelReconnect(TimerToken),
    CloseTransport,
    Notify(SourceEvent),
}

#[derive(Debug)]
pub struct ConnectionManager {
    phase: Phase,
    reconnect_attempt: u32,
    heartbeat: Option<TimerToken>,
    reconnect: Option<TimerToken>,
    next_token: u64,
    shutdown: bool,
    last_reading_at: Option<DateTime<Utc>>,
    backoff: Backoff,
    heartbeat_interval: Duration,
}

impl ConnectionManager {
    pub fn new(backoff: Backoff, heartbeat_interval: Duration) -> Self {
        Self {
            phase: Phase::Disconnected,
            reconnect_attempt: 0,
            heartbeat: None,
            reconnect: None,
            next_token: 0,
            shutdown: false,
            last_reading_at: None,
            backoff,
            heartbeat_interval,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    /// Apply one event and return the effects the transport must perform, in order
    pub fn handle(&mut self, event: ConnectionEvent) -> Vec<Effect> {
        if self.shutdown {
            tracing::debug!("Ignoring {:?} after shutdown", event);
            return Vec::new();
        }

        match event {
            ConnectionEvent::Start => self.on_start(),
            ConnectionEvent::Opened => self.on_opened(),
            ConnectionEvent::Message(text) => self.on_message(&text),
            ConnectionEvent::Errored(reason) => {
                tracing::warn!("Telemetry stream error: {}", reason);
                self.on_lost()
            }
            ConnectionEvent::Closed => {
                tracing::info!("Telemetry stream closed");
                self.on_lost()
            }
            ConnectionEvent::HeartbeatTick(token) => self.on_heartbeat(token),
            ConnectionEvent::ReconnectElapsed(token) => self.on_reconnect_elapsed(token),
            ConnectionEvent::Shutdown => self.on_shutdown(),
        }
    }

    fn on_start(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Disconnected || self.reconnect.is_some() {
            return Vec::new();
        }
        self.phase = Phase::Connecting;
        vec![Effect::Open]
    }

    fn on_opened(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Connecting {
            tracing::debug!("Unexpected open while {:?}", self.phase);
            return Vec::new();
        }

        self.phase = Phase::Connected;
        self.reconnect_attempt = 0;
        let token = self.issue_token();
        self.heartbeat = Some(token);

        vec![
            Effect::StartHeartbeat {
                token,
                interval: self.heartbeat_interval,
            },
            Effect::Notify(SourceEvent::Connected),
        ]
    }

    fn on_message(&mut self, text: &str) -> Vec<Effect> {
        if self.phase != Phase::Connected {
            return Vec::new();
        }

        match InboundMessage::decode(text) {
            Ok(InboundMessage::Reset) => {
                self.last_reading_at = None;
                vec![Effect::Notify(SourceEvent::Reset)]
            }
            Ok(InboundMessage::Reading(reading)) => {
                // Replayed cache entries are never newer than the watermark
                if self.last_reading_at.is_some_and(|last| reading.timestamp <= last) {
                    tracing::debug!("Dropping stale reading at {}", reading.timestamp);
                    return Vec::new();
                }
                self.last_reading_at = Some(reading.timestamp);
                vec![Effect::Notify(SourceEvent::Reading(reading))]
            }
            Err(e) => {
                tracing::warn!("Failed to decode telemetry message: {}", e);
                vec![Effect::Notify(SourceEvent::DecodeError(e))]
            }
        }
    }

    fn on_lost(&mut self) -> Vec<Effect> {
        if self.phase == Phase::Disconnected {
            // A reconnect is already pending for this loss
            return Vec::new();
        }

        let mut effects = self.disarm();
        effects.push(Effect::CloseTransport);
        effects.push(Effect::Notify(SourceEvent::Disconnected { reconnecting: true }));

        let delay = self.backoff.delay(self.reconnect_attempt);
        self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
        let token = self.issue_token();
        self.reconnect = Some(token);
        tracing::info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            self.reconnect_attempt
        );
        effects.push(Effect::ScheduleReconnect { token, delay });

        effects
    }

    fn on_heartbeat(&mut self, token: TimerToken) -> Vec<Effect> {
        if self.phase != Phase::Connected || self.heartbeat != Some(token) {
            return Vec::new();
        }
        vec![Effect::Send(heartbeat_frame())]
    }

    fn on_reconnect_elapsed(&mut self, token: TimerToken) -> Vec<Effect> {
        if self.phase != Phase::Disconnected || self.reconnect != Some(token) {
            return Vec::new();
        }
        self.reconnect = None;
        self.phase = Phase::Connecting;
        vec![Effect::Open]
    }

    fn on_shutdown(&mut self) -> Vec<Effect> {
        self.shutdown = true;
        let was_live = self.phase != Phase::Disconnected;
        let mut effects = self.disarm();
        if let Some(token) = self.reconnect.take() {
            effects.push(Effect::CancelReconnect(token));
        }
        if was_live {
            effects.push(Effect::CloseTransport);
            effects.push(Effect::Notify(SourceEvent::Disconnected { reconnecting: false }));
        }
        effects
    }

    /// Leave the current connection: drop to Disconnected and cancel its heartbeat
    fn disarm(&mut self) -> Vec<Effect> {
        self.phase = Phase::Disconnected;
        self.heartbeat
            .take()
            .map(Effect::CancelHeartbeat)
            .into_iter()
            .collect()
    }

    fn issue_token(&mut self) -> TimerToken {
        self.next_token += 1;
        TimerToken(self.next_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READING: &str = r#"{"timestamp":1700000000,"milliamp_hours":10,"voltage":3.9,"temperature":22,"battery_chemistry":"lipo","usb_alert":false}"#;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Backoff::default(), DEFAULT_HEARTBEAT_INTERVAL)
    }

    fn connected() -> (ConnectionManager, TimerToken) {
        let mut manager = manager();
        manager.handle(ConnectionEvent::Start);
        let effects = manager.handle(ConnectionEvent::Opened);
        let token = effects
            .iter()
            .find_map(|e| match e {
                Effect::StartHeartbeat { token, .. } => Some(*token),
                _ => None,
            })
            .unwrap();
        (manager, token)
    }

    fn scheduled(effects: &[Effect]) -> Option<(TimerToken, Duration)> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleReconnect { token, delay } => Some((*token, *delay)),
            _ => None,
        })
    }

    #[test]
    fn test_start_and_open() {
        let mut manager = manager();
        assert_eq!(manager.phase(), Phase::Disconnected);

        let effects = manager.handle(ConnectionEvent::Start);
        assert!(matches!(effects.as_slice(), [Effect::Open]));
        assert_eq!(manager.phase(), Phase::Connecting);

        let effects = manager.handle(ConnectionEvent::Opened);
        assert_eq!(manager.phase(), Phase::Connected);
        assert!(matches!(
            effects.as_slice(),
            [
                Effect::StartHeartbeat { interval, .. },
                Effect::Notify(SourceEvent::Connected)
            ] if *interval == Duration::from_secs(30)
        ));
    }

    #[test]
    fn test_heartbeat_sends_ping_only_for_live_token() {
        let (mut manager, token) = connected();

        let effects = manager.handle(ConnectionEvent::HeartbeatTick(token));
        assert!(matches!(effects.as_slice(), [Effect::Send(frame)] if frame.contains("ping")));

        manager.handle(ConnectionEvent::Closed);
        assert!(manager.handle(ConnectionEvent::HeartbeatTick(token)).is_empty());
    }

    #[test]
    fn test_message_dispatch() {
        let (mut manager, _) = connected();

        let effects = manager.handle(ConnectionEvent::Message(READING.to_string()));
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(SourceEvent::Reading(r))] if r.battery_chemistry == "lipo"
        ));

        let effects = manager.handle(ConnectionEvent::Message(r#"{"type":"reset"}"#.to_string()));
        assert!(matches!(effects.as_slice(), [Effect::Notify(SourceEvent::Reset)]));
    }

    #[test]
    fn test_decode_error_keeps_connection_open() {
        let (mut manager, _) = connected();

        let effects = manager.handle(ConnectionEvent::Message("{broken".to_string()));
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(SourceEvent::DecodeError(_))]
        ));
        assert_eq!(manager.phase(), Phase::Connected);
    }

    #[test]
    fn test_out_of_order_reading_is_dropped_until_reset() {
        let (mut manager, _) = connected();
        let newer = READING.replace("1700000000", "1700000010");

        manager.handle(ConnectionEvent::Message(newer));
        assert!(manager.handle(ConnectionEvent::Message(READING.to_string())).is_empty());

        manager.handle(ConnectionEvent::Message(r#"{"type":"reset"}"#.to_string()));
        let effects = manager.handle(ConnectionEvent::Message(READING.to_string()));
        assert!(matches!(effects.as_slice(), [Effect::Notify(SourceEvent::Reading(_))]));
    }

    #[test]
    fn test_replayed_reading_after_reconnect_is_dropped() {
        let (mut manager, _) = connected();
        let first = manager.handle(ConnectionEvent::Message(READING.to_string()));
        assert!(matches!(first.as_slice(), [Effect::Notify(SourceEvent::Reading(_))]));

        let effects = manager.handle(ConnectionEvent::Closed);
        let (token, _) = scheduled(&effects).unwrap();
        manager.handle(ConnectionEvent::ReconnectElapsed(token));
        manager.handle(ConnectionEvent::Opened);

        // The server replays its cache, ending with the reading already accepted
        assert!(manager.handle(ConnectionEvent::Message(READING.to_string())).is_empty());

        let next = READING.replace("1700000000", "1700000001");
        let effects = manager.handle(ConnectionEvent::Message(next));
        assert!(matches!(effects.as_slice(), [Effect::Notify(SourceEvent::Reading(_))]));
    }

    #[test]
    fn test_loss_cancels_heartbeat_and_schedules_reconnect() {
        let (mut manager, heartbeat) = connected();

        let effects = manager.handle(ConnectionEvent::Errored("reset by peer".to_string()));
        assert_eq!(manager.phase(), Phase::Disconnected);
        assert!(matches!(effects[0], Effect::CancelHeartbeat(t) if t == heartbeat));
        assert!(effects.iter().any(|e| matches!(e, Effect::CloseTransport)));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Notify(SourceEvent::Disconnected { reconnecting: true })
        )));
        let (_, delay) = scheduled(&effects).unwrap();
        assert_eq!(delay, Duration::from_millis(1000));

        // The close that follows an error must not schedule a second reconnect
        assert!(manager.handle(ConnectionEvent::Closed).is_empty());
    }

    #[test]
    fn test_backoff_grows_until_successful_open() {
        let mut manager = manager();
        manager.handle(ConnectionEvent::Start);

        let mut delays = Vec::new();
        for _ in 0..5 {
            let effects = manager.handle(ConnectionEvent::Errored("refused".to_string()));
            let (token, delay) = scheduled(&effects).unwrap();
            delays.push(delay.as_millis());
            let effects = manager.handle(ConnectionEvent::ReconnectElapsed(token));
            assert!(matches!(effects.as_slice(), [Effect::Open]));
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
        assert_eq!(manager.reconnect_attempt(), 5);

        manager.handle(ConnectionEvent::Opened);
        assert_eq!(manager.reconnect_attempt(), 0);
    }

    #[test]
    fn test_stale_reconnect_token_is_ignored() {
        let (mut manager, _) = connected();
        let effects = manager.handle(ConnectionEvent::Closed);
        let (token, _) = scheduled(&effects).unwrap();

        assert!(manager
            .handle(ConnectionEvent::ReconnectElapsed(TimerToken(token.0 + 100)))
            .is_empty());
        assert_eq!(manager.phase(), Phase::Disconnected);

        assert!(matches!(
            manager.handle(ConnectionEvent::ReconnectElapsed(token)).as_slice(),
            [Effect::Open]
        ));
        // A fired timer cannot fire twice
        manager.handle(ConnectionEvent::Errored("refused".to_string()));
        assert!(manager.handle(ConnectionEvent::ReconnectElapsed(token)).is_empty());
    }

    #[test]
    fn test_messages_ignored_when_not_connected() {
        let mut manager = manager();
        manager.handle(ConnectionEvent::Start);
        assert!(manager.handle(ConnectionEvent::Message(READING.to_string())).is_empty());
    }

    #[test]
    fn test_shutdown_while_connected() {
        let (mut manager, heartbeat) = connected();

        let effects = manager.handle(ConnectionEvent::Shutdown);
        assert!(matches!(effects[0], Effect::CancelHeartbeat(t) if t == heartbeat));
        assert!(effects.iter().any(|e| matches!(e, Effect::CloseTransport)));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Notify(SourceEvent::Disconnected { reconnecting: false })
        )));
        assert!(scheduled(&effects).is_none());
        assert!(manager.is_shut_down());
        assert!(manager.handle(ConnectionEvent::Closed).is_empty());
        assert!(manager.handle(ConnectionEvent::Start).is_empty());
    }

    #[test]
    fn test_shutdown_while_connecting_closes_transport() {
        let mut manager = manager();
        manager.handle(ConnectionEvent::Start);

        let effects = manager.handle(ConnectionEvent::Shutdown);
        assert!(matches!(
            effects.as_slice(),
            [
                Effect::CloseTransport,
                Effect::Notify(SourceEvent::Disconnected { reconnecting: false })
            ]
        ));
        assert_eq!(manager.phase(), Phase::Disconnected);
        assert!(manager.handle(ConnectionEvent::Opened).is_empty());
    }

    #[test]
    fn test_shutdown_cancels_pending_reconnect() {
        let (mut manager, _) = connected();
        let effects = manager.handle(ConnectionEvent::Closed);
        let (token, _) = scheduled(&effects).unwrap();

        let effects = manager.handle(ConnectionEvent::Shutdown);
        assert!(matches!(effects.as_slice(), [Effect::CancelReconnect(t)] if *t == token));
        assert!(manager.handle(ConnectionEvent::ReconnectElapsed(token)).is_empty());
        assert_eq!(manager.phase(), Phase::Disconnected);
    }
}
