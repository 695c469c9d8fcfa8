//! Frame Validator + Decoder: turns a raw [`TimedMessage`] whose
//! `message` field is still `None` into one carrying a decoded
//! [`modes::decode::Message`], or drops it with a counted reason. Pure
//! dispatch over `modes::decode::Message::from_bytes`; all of the actual
//! bit-level decoding lives in the `modes` crate.
use crate::stats::Stats;
use modes::decode::{Message, DF};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// ICAO addresses the Tracker already knows about. Surveillance replies
/// (DF 0/4/5/16/20/21) carry a CRC that is really `icao XOR A`; the only way
/// to tell a correctly-received frame from noise is to check whether the
/// recovered candidate matches an aircraft already established via an
/// extended squitter.
#[derive(Default, Clone)]
pub struct KnownIcaos(Arc<RwLock<HashSet<u32>>>);

impl KnownIcaos {
    pub fn new() -> Self {
        KnownIcaos::default()
    }

    pub fn insert(&self, icao: u32) {
        self.0.write().expect("known-icao lock poisoned").insert(icao);
    }

    pub fn contains(&self, icao: u32) -> bool {
        self.0.read().expect("known-icao lock poisoned").contains(&icao)
    }
}

pub async fn run(
    mut rx: mpsc::Receiver<modes::decode::TimedMessage>,
    tx: mpsc::Sender<modes::decode::TimedMessage>,
    stats: Arc<Stats>,
    known: KnownIcaos,
) {
    while let Some(mut msg) = rx.recv().await {
        stats.record_frame_in();
        if msg.frame.len() != 7 && msg.frame.len() != 14 {
            stats.crc_fail.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            continue;
        }
        match Message::from_bytes((&msg.frame, 0)) {
            Ok((_, decoded)) => {
                stats.crc_pass.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                if let DF::ExtendedSquitterADSB(adsb) = &decoded.df {
                    known.insert(adsb.icao24.0);
                } else if !known.contains(decoded.crc) {
                    stats
                        .dropped_unknown_icao
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    debug!("dropping surveillance reply for unknown icao {:06x}", decoded.crc);
                    continue;
                }
                msg.message = Some(decoded);
                msg.decode_time = Some(msg.timestamp);
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                stats.crc_fail.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!("dropping frame: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;
    use modes::decode::{SensorMetadata, TimedMessage};

    fn frame(bytes: &[u8], timestamp: f64) -> TimedMessage {
        TimedMessage {
            timestamp,
            frame: bytes.to_vec(),
            message: None,
            metadata: vec![SensorMetadata {
                system_timestamp: timestamp,
                gnss_timestamp: None,
                nanoseconds: None,
                rssi: None,
                serial: 0,
                name: None,
            }],
            decode_time: None,
        }
    }

    #[tokio::test]
    async fn valid_adsb_frame_passes_through() {
        let (tx_in, rx_in) = mpsc::channel(8);
        let (tx_out, mut rx_out) = mpsc::channel(8);
        let stats = Arc::new(Stats::new());
        let known = KnownIcaos::new();
        tokio::spawn(run(rx_in, tx_out, stats.clone(), known));
        tx_in
            .send(frame(&hex!("8D4840D6202CC371C32CE0576098"), 0.0))
            .await
            .unwrap();
        drop(tx_in);
        let out = rx_out.recv().await.expect("decoded frame");
        assert!(out.message.is_some());
        assert_eq!(stats.crc_pass.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn corrupted_crc_is_dropped() {
        let (tx_in, rx_in) = mpsc::channel(8);
        let (tx_out, mut rx_out) = mpsc::channel(8);
        let stats = Arc::new(Stats::new());
        let known = KnownIcaos::new();
        tokio::spawn(run(rx_in, tx_out, stats.clone(), known));
        tx_in
            .send(frame(&hex!("8D4840D6202CC371C32CE0576099"), 0.0))
            .await
            .unwrap();
        drop(tx_in);
        assert!(rx_out.recv().await.is_none());
        assert_eq!(stats.crc_fail.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
