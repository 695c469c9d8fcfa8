//! Source Manager: one tokio task per configured source, reconnecting
//! with exponential backoff and full jitter, feeding a bounded channel that
//! drops the oldest frame on the source's own backlog when full rather than
//! blocking the rest of the pipeline.
use crate::config::{SourceConfig, SourceKind};
use crate::stats::{SourceStatus, Stats};
use crate::tracker::{JsonFields, SnapshotRecord};
use modes::decode::{SensorMetadata, TimedMessage, ICAO};
use modes::source::beast::{receiver as beast_receiver, BeastSource};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn backoff_with_jitter(attempt: u32, initial_ms: u64, max_ms: u64) -> Duration {
    let exp = initial_ms.saturating_mul(1u64 << attempt.min(16));
    let capped = exp.min(max_ms).max(1);
    Duration::from_millis(rand::random::<u64>() % capped)
}

/// Sends on a bounded channel, dropping the oldest buffered frame for this
/// source when full instead of blocking. `try_send` already fails fast on a
/// full channel; on failure we pop one item (best-effort) and retry once.
async fn send_dropping_oldest(
    tx: &mpsc::Sender<TimedMessage>,
    msg: TimedMessage,
    stats: &Stats,
    source: &str,
) {
    match tx.try_send(msg) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(msg)) => {
            stats.record_dropped(source);
            // The channel is full; fall back to a bounded wait so we do not
            // spin, while still preferring freshness over completeness.
            let _ = tx.send(msg).await;
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

pub async fn spawn(
    config: SourceConfig,
    tx: mpsc::Sender<TimedMessage>,
    snapshot_tx: mpsc::Sender<SnapshotRecord>,
    stats: Arc<Stats>,
) -> Result<(), crate::error::SourceError> {
    match config.kind {
        SourceKind::BeastTcp => Ok(run_beast_tcp(config, tx, stats).await),
        SourceKind::AvrTcp => Ok(run_avr_tcp(config, tx, stats).await),
        SourceKind::JsonPoll => Ok(run_json_poll(config, snapshot_tx, stats).await),
        SourceKind::RawFile => Ok(run_raw_file(config, tx, stats).await),
    }
}

async fn run_beast_tcp(config: SourceConfig, tx: mpsc::Sender<TimedMessage>, stats: Arc<Stats>) {
    let mut attempt = 0u32;
    loop {
        stats.set_source_status(
            &config.name,
            SourceStatus {
                connected: true,
                last_frame_at: None,
                frames_total: 0,
                dropped_total: 0,
            },
        );
        let address = config
            .address
            .trim_start_matches("tcp://")
            .to_string();
        let (inner_tx, mut inner_rx) = mpsc::channel(1024);
        let serial = attempt as u64;
        let name = Some(config.name.clone());
        let result = tokio::spawn(beast_receiver(
            BeastSource::Tcp(address),
            inner_tx,
            serial,
            name,
        ));
        let mut frames_total = 0u64;
        while let Some(msg) = inner_rx.recv().await {
            frames_total += 1;
            send_dropping_oldest(&tx, msg, &stats, &config.name).await;
        }
        let _ = result.await;
        stats.set_source_status(
            &config.name,
            SourceStatus {
                connected: false,
                last_frame_at: Some(now()),
                frames_total,
                dropped_total: 0,
            },
        );
        warn!("source {} disconnected, reconnecting", config.name);
        attempt += 1;
        sleep(backoff_with_jitter(
            attempt,
            config.reconnect_backoff_initial_ms,
            config.reconnect_backoff_max_ms,
        ))
        .await;
    }
}

/// ASCII `*HEX...;` framing, one message per line, over TCP.
async fn run_avr_tcp(config: SourceConfig, tx: mpsc::Sender<TimedMessage>, stats: Arc<Stats>) {
    let mut attempt = 0u32;
    let address = config.address.trim_start_matches("tcp://").to_string();
    loop {
        match TcpStream::connect(&address).await {
            Ok(stream) => {
                attempt = 0;
                stats.set_source_status(
                    &config.name,
                    SourceStatus {
                        connected: true,
                        last_frame_at: None,
                        frames_total: 0,
                        dropped_total: 0,
                    },
                );
                let mut lines = BufReader::new(stream).lines();
                let mut frames_total = 0u64;
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if let Some(msg) = parse_avr_line(&line, &config.name) {
                                frames_total += 1;
                                send_dropping_oldest(&tx, msg, &stats, &config.name).await;
                            }
                        }
                        _ => break,
                    }
                }
                stats.set_source_status(
                    &config.name,
                    SourceStatus {
                        connected: false,
                        last_frame_at: Some(now()),
                        frames_total,
                        dropped_total: 0,
                    },
                );
            }
            Err(err) => {
                warn!("avr_tcp {} connect failed: {err}", config.name);
            }
        }
        attempt += 1;
        sleep(backoff_with_jitter(
            attempt,
            config.reconnect_backoff_initial_ms,
            config.reconnect_backoff_max_ms,
        ))
        .await;
    }
}

fn parse_avr_line(line: &str, source_name: &str) -> Option<TimedMessage> {
    let line = line.trim();
    let hex = line.strip_prefix('*')?.strip_suffix(';')?;
    if hex.len() != 14 && hex.len() != 28 {
        return None;
    }
    let frame = hex::decode(hex).ok()?;
    Some(TimedMessage {
        timestamp: now(),
        frame,
        message: None,
        metadata: vec![SensorMetadata {
            system_timestamp: now(),
            gnss_timestamp: None,
            nanoseconds: None,
            rssi: None,
            serial: 0,
            name: Some(source_name.to_string()),
        }],
        decode_time: None,
    })
}

#[derive(serde::Deserialize)]
struct JsonSnapshot {
    #[allow(dead_code)]
    now: f64,
    aircraft: Vec<JsonAircraft>,
}

#[derive(serde::Deserialize)]
struct JsonAircraft {
    hex: String,
    flight: Option<String>,
    alt_baro: Option<f64>,
    gs: Option<f64>,
    track: Option<f64>,
    lat: Option<f64>,
    lon: Option<f64>,
    squawk: Option<String>,
    seen: Option<f64>,
}

/// Periodic JSON snapshot polling. Each element is mapped field-by-field
/// into a [`SnapshotRecord`] and sent down its own channel straight to the
/// tracker, bypassing frame validation entirely since these records never
/// carry a raw Mode-S frame for the validator to CRC-check.
async fn run_json_poll(
    config: SourceConfig,
    snapshot_tx: mpsc::Sender<SnapshotRecord>,
    stats: Arc<Stats>,
) {
    let client = reqwest::Client::new();
    let mut frames_total = 0u64;
    loop {
        match client.get(&config.address).send().await {
            Ok(response) => match response.json::<JsonSnapshot>().await {
                Ok(snapshot) => {
                    stats.set_source_status(
                        &config.name,
                        SourceStatus {
                            connected: true,
                            last_frame_at: Some(now()),
                            frames_total,
                            dropped_total: 0,
                        },
                    );
                    for aircraft in snapshot.aircraft {
                        if let Some(record) = synth_from_json(&aircraft, &config.name) {
                            frames_total += 1;
                            send_snapshot_dropping_oldest(&snapshot_tx, record, &stats, &config.name)
                                .await;
                        }
                    }
                }
                Err(err) => warn!("json_poll {} bad response: {err}", config.name),
            },
            Err(err) => {
                warn!("json_poll {} request failed: {err}", config.name);
                stats.set_source_status(
                    &config.name,
                    SourceStatus {
                        connected: false,
                        last_frame_at: None,
                        frames_total,
                        dropped_total: 0,
                    },
                );
            }
        }
        sleep(Duration::from_secs(config.read_idle_timeout_s.max(1))).await;
    }
}

async fn send_snapshot_dropping_oldest(
    tx: &mpsc::Sender<SnapshotRecord>,
    record: SnapshotRecord,
    stats: &Stats,
    source: &str,
) {
    match tx.try_send(record) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(record)) => {
            stats.record_dropped(source);
            let _ = tx.send(record).await;
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

/// Maps a JSON aircraft element field-by-field onto [`JsonFields`]. Unlike
/// [`parse_avr_line`] this never touches the frame validator or CPR decoder:
/// `lat`/`lon` here are already plain coordinates, not CPR-encoded.
fn synth_from_json(aircraft: &JsonAircraft, source_name: &str) -> Option<SnapshotRecord> {
    let icao = u32::from_str_radix(&aircraft.hex, 16).ok()?;
    let timestamp = aircraft.seen.unwrap_or_else(now);
    let callsign = aircraft
        .flight
        .as_ref()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    let fields = JsonFields {
        callsign,
        alt_baro_ft: aircraft.alt_baro.map(|alt| alt as i32),
        ground_speed_kt: aircraft.gs,
        track_deg: aircraft.track,
        lat: aircraft.lat,
        lon: aircraft.lon,
        squawk: aircraft.squawk.clone(),
    };
    Some(SnapshotRecord {
        icao: ICAO(icao),
        source_id: source_name.to_string(),
        timestamp,
        fields,
    })
}

/// Replays a file of AVR-framed lines, useful offline and in tests. Plays
/// back flat-out rather than at the recording's original pace.
async fn run_raw_file(config: SourceConfig, tx: mpsc::Sender<TimedMessage>, stats: Arc<Stats>) {
    let Ok(contents) = tokio::fs::read_to_string(&config.address).await else {
        warn!("raw_file {} could not read {}", config.name, config.address);
        return;
    };
    stats.set_source_status(
        &config.name,
        SourceStatus {
            connected: true,
            last_frame_at: None,
            frames_total: 0,
            dropped_total: 0,
        },
    );
    let mut frames_total = 0u64;
    for line in contents.lines() {
        if let Some(msg) = parse_avr_line(line, &config.name) {
            frames_total += 1;
            send_dropping_oldest(&tx, msg, &stats, &config.name).await;
        }
    }
    stats.set_source_status(
        &config.name,
        SourceStatus {
            connected: false,
            last_frame_at: Some(now()),
            frames_total,
            dropped_total: 0,
        },
    );
    info!("raw_file {} replay complete ({} frames)", config.name, frames_total);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_avr_long_frame() {
        let msg = parse_avr_line("*8D4840D6202CC371C32CE0576098;", "test").unwrap();
        assert_eq!(msg.frame.len(), 14);
        assert_eq!(msg.metadata[0].name.as_deref(), Some("test"));
    }

    #[test]
    fn rejects_malformed_avr_line() {
        assert!(parse_avr_line("not a frame", "test").is_none());
    }

    #[test]
    fn synth_from_json_maps_fields() {
        let aircraft = JsonAircraft {
            hex: "4840d6".to_string(),
            flight: Some("KLM1023 ".to_string()),
            alt_baro: Some(38000.0),
            gs: Some(420.0),
            track: Some(90.0),
            lat: Some(43.7),
            lon: Some(1.36),
            squawk: Some("1200".to_string()),
            seen: Some(12.0),
        };
        let record = synth_from_json(&aircraft, "json-1").expect("maps to a record");
        assert_eq!(record.source_id, "json-1");
        assert_eq!(record.fields.callsign.as_deref(), Some("KLM1023"));
        assert_eq!(record.fields.alt_baro_ft, Some(38000));
        assert_eq!(record.fields.ground_speed_kt, Some(420.0));
        assert_eq!(record.fields.lat, Some(43.7));
        assert_eq!(record.fields.squawk.as_deref(), Some("1200"));
    }
}
