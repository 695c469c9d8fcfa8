pub mod mqtt;
pub mod serial;
pub mod template;

use crate::config::DispatcherConfig;
use crate::error::DeliveryError;
use crate::stats::Stats;
use crate::watchlist::AlertEvent;
use mqtt::MqttInterface;
use serial::SerialInterface;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

const EMERGENCY_SQUAWKS: [&str; 3] = ["7500", "7600", "7700"];

pub fn priority_for_squawk(squawk: Option<&str>) -> Priority {
    match squawk {
        Some(s) if EMERGENCY_SQUAWKS.contains(&s) => Priority::Critical,
        _ => Priority::Normal,
    }
}

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub id: u64,
    pub content: String,
    pub channel_name: String,
    pub priority: Priority,
    pub created_at: f64,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Disconnected,
    Connected,
    Degraded,
}

struct InterfaceHealth {
    state: InterfaceState,
    unhealthy_since: Option<f64>,
}

impl Default for InterfaceHealth {
    fn default() -> Self {
        InterfaceHealth {
            state: InterfaceState::Disconnected,
            unhealthy_since: None,
        }
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Exponential backoff with full jitter: `rand(0, min(cap, base * 2^attempt))`.
fn backoff_with_jitter(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(20));
    let capped = exp.min(cap_ms);
    let jittered = rand::random::<u64>() % capped.max(1);
    Duration::from_millis(jittered)
}

struct Throttle {
    last_alert: HashMap<String, f64>,
    hour_window_start: HashMap<String, f64>,
    hour_count: HashMap<String, u32>,
    min_interval_s: f64,
    max_alerts_per_hour: u32,
}

impl Throttle {
    fn new(min_interval_s: u64, max_alerts_per_hour: u32) -> Self {
        Throttle {
            last_alert: HashMap::new(),
            hour_window_start: HashMap::new(),
            hour_count: HashMap::new(),
            min_interval_s: min_interval_s as f64,
            max_alerts_per_hour,
        }
    }

    /// Returns whether the alert should be delivered. Critical alerts bypass
    /// the cooldown window but never the hard hourly cap.
    fn allow(&mut self, icao: &str, priority: Priority, now: f64) -> bool {
        let window_start = *self.hour_window_start.entry(icao.to_string()).or_insert(now);
        if now - window_start > 3600.0 {
            self.hour_window_start.insert(icao.to_string(), now);
            self.hour_count.insert(icao.to_string(), 0);
        }
        let count = *self.hour_count.get(icao).unwrap_or(&0);
        if count >= self.max_alerts_per_hour {
            return false;
        }
        let last = self.last_alert.get(icao).copied();
        let within_cooldown = last.is_some_and(|t| now - t < self.min_interval_s);
        if within_cooldown && priority != Priority::Critical {
            return false;
        }
        self.last_alert.insert(icao.to_string(), now);
        *self.hour_count.entry(icao.to_string()).or_insert(0) += 1;
        true
    }
}

pub struct Dispatcher {
    config: DispatcherConfig,
    serial: Option<SerialInterface>,
    mqtt: Option<MqttInterface>,
    serial_health: InterfaceHealth,
    mqtt_health: InterfaceHealth,
    throttle: Throttle,
    next_id: u64,
    queue: Vec<OutboundMessage>,
    stats: Arc<Stats>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        serial: Option<SerialInterface>,
        mqtt: Option<MqttInterface>,
        min_interval_s: u64,
        max_alerts_per_hour: u32,
        stats: Arc<Stats>,
    ) -> Self {
        Dispatcher {
            config,
            serial,
            mqtt,
            serial_health: InterfaceHealth::default(),
            mqtt_health: InterfaceHealth::default(),
            throttle: Throttle::new(min_interval_s, max_alerts_per_hour),
            next_id: 0,
            queue: Vec::new(),
            stats,
        }
    }

    pub async fn run(mut self, mut alerts: mpsc::Receiver<AlertEvent>) {
        if self.serial.is_some() {
            self.serial_health.state = InterfaceState::Connected;
        }
        if self.mqtt.is_some() {
            self.mqtt_health.state = InterfaceState::Connected;
        }
        let mut health_tick = tokio::time::interval(Duration::from_secs(
            self.config.health_check_interval_s.max(1),
        ));
        loop {
            tokio::select! {
                event = alerts.recv() => {
                    match event {
                        Some(event) => self.handle_alert(event),
                        None => break,
                    }
                }
                _ = health_tick.tick() => {
                    self.probe_health();
                }
            }
            self.drain_queue().await;
        }
    }

    fn handle_alert(&mut self, event: AlertEvent) {
        let icao = event.aircraft_snapshot.icao.clone();
        let priority = priority_for_squawk(
            event
                .aircraft_snapshot
                .squawk
                .as_ref()
                .map(|s| s.value.as_str()),
        );
        if !self.throttle.allow(&icao, priority, event.event_time) {
            debug!("suppressed alert for {icao} within cooldown");
            self.stats.record_alert_suppressed();
            return;
        }
        let content = template::render(
            &self.config.message_format,
            &event.aircraft_snapshot,
            &event.match_reason,
        );
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(OutboundMessage {
            id,
            content,
            channel_name: icao,
            priority,
            created_at: event.event_time,
            attempts: 0,
            max_attempts: self.config.max_attempts,
            next_attempt_at: event.event_time,
        });
    }

    async fn drain_queue(&mut self) {
        let ttl = self.config.message_ttl_s as f64;
        let current = now();
        let mut remaining = Vec::new();
        let pending = std::mem::take(&mut self.queue);
        for mut message in pending {
            if current - message.created_at > ttl {
                warn!("dropping expired outbound {} for {}", message.id, message.channel_name);
                continue;
            }
            if message.next_attempt_at > current {
                remaining.push(message);
                continue;
            }
            match self.try_deliver(&message).await {
                Ok(()) => {
                    self.stats.record_alert_sent();
                    info!("delivered outbound {} for {}", message.id, message.channel_name);
                }
                Err(DeliveryError::Permanent(reason)) => {
                    warn!("permanently failed outbound {}: {reason}", message.id);
                }
                Err(DeliveryError::Transient(reason)) => {
                    message.attempts += 1;
                    if message.attempts >= message.max_attempts {
                        warn!("outbound {} exhausted retries: {reason}", message.id);
                    } else {
                        let delay = backoff_with_jitter(message.attempts, 500, 30_000);
                        message.next_attempt_at = current + delay.as_secs_f64();
                        remaining.push(message);
                    }
                }
            }
        }
        self.queue = remaining;
    }

    async fn try_deliver(&mut self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        match self.config.routing.as_str() {
            "all" => {
                let serial_result = self.send_serial(message).await;
                let mqtt_result = self.send_mqtt(message).await;
                serial_result.or(mqtt_result)
            }
            "primary" => match self.send_serial(message).await {
                Ok(()) => Ok(()),
                Err(_) => self.send_mqtt(message).await,
            },
            _ => {
                let failover_timeout = self.config.failover_timeout_s as f64;
                let serial_down_too_long = matches!(self.serial_health.state, InterfaceState::Degraded)
                    && self
                        .serial_health
                        .unhealthy_since
                        .is_some_and(|since| now() - since > failover_timeout);
                if serial_down_too_long {
                    self.send_mqtt(message).await
                } else {
                    self.send_serial(message).await
                }
            }
        }
    }

    async fn send_serial(&mut self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let Some(serial) = &self.serial else {
            return Err(DeliveryError::Permanent("no serial interface configured".to_string()));
        };
        match serial
            .send(&message.content, self.config.max_message_length)
            .await
        {
            Ok(()) => {
                self.serial_health.state = InterfaceState::Connected;
                self.serial_health.unhealthy_since = None;
                Ok(())
            }
            Err(err) => {
                if self.serial_health.unhealthy_since.is_none() {
                    self.serial_health.unhealthy_since = Some(now());
                }
                self.serial_health.state = InterfaceState::Degraded;
                Err(err)
            }
        }
    }

    async fn send_mqtt(&mut self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let Some(mqtt) = &self.mqtt else {
            return Err(DeliveryError::Permanent("no mqtt interface configured".to_string()));
        };
        let qos = self
            .config
            .mqtt
            .as_ref()
            .map(|c| c.qos)
            .unwrap_or(0);
        match mqtt
            .send(message.content.as_bytes(), &message.channel_name, qos)
            .await
        {
            Ok(()) => {
                self.mqtt_health.state = InterfaceState::Connected;
                self.mqtt_health.unhealthy_since = None;
                Ok(())
            }
            Err(err) => {
                if self.mqtt_health.unhealthy_since.is_none() {
                    self.mqtt_health.unhealthy_since = Some(now());
                }
                self.mqtt_health.state = InterfaceState::Degraded;
                Err(err)
            }
        }
    }

    fn probe_health(&mut self) {
        if self.serial_health.state == InterfaceState::Degraded {
            debug!("serial interface health probe due");
        }
        if self.mqtt_health.state == InterfaceState::Degraded {
            debug!("mqtt interface health probe due");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_blocks_within_cooldown() {
        let mut throttle = Throttle::new(60, 10);
        assert!(throttle.allow("4840d6", Priority::Normal, 0.0));
        assert!(!throttle.allow("4840d6", Priority::Normal, 10.0));
        assert!(throttle.allow("4840d6", Priority::Normal, 70.0));
    }

    #[test]
    fn critical_bypasses_cooldown_but_not_hard_cap() {
        let mut throttle = Throttle::new(60, 2);
        assert!(throttle.allow("4840d6", Priority::Critical, 0.0));
        assert!(throttle.allow("4840d6", Priority::Critical, 1.0));
        assert!(!throttle.allow("4840d6", Priority::Critical, 2.0));
    }

    #[test]
    fn priority_for_emergency_squawk_is_critical() {
        assert_eq!(priority_for_squawk(Some("7700")), Priority::Critical);
        assert_eq!(priority_for_squawk(Some("1200")), Priority::Normal);
    }
}
