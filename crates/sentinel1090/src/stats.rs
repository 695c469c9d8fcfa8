//! Process-wide counters, read by `/stats` and `/health` and dumped at
//! shutdown. Plain atomics rather than a metrics crate, since nothing
//! downstream needs export to an external metrics pipeline.
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct Stats {
    pub frames_in: AtomicU64,
    pub frames_out: AtomicU64,
    pub crc_pass: AtomicU64,
    pub crc_fail: AtomicU64,
    pub dropped_unknown_icao: AtomicU64,
    pub cpr_globals_computed: AtomicU64,
    pub cpr_locals_computed: AtomicU64,
    pub range_rejected: AtomicU64,
    pub alerts_sent: AtomicU64,
    pub alerts_suppressed: AtomicU64,
    pub alerts_expired: AtomicU64,
    dropped_frames: RwLock<HashMap<String, AtomicU64>>,
    source_status: RwLock<HashMap<String, SourceStatus>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceStatus {
    pub connected: bool,
    pub last_frame_at: Option<f64>,
    pub frames_total: u64,
    pub dropped_total: u64,
}

impl Default for SourceStatus {
    fn default() -> Self {
        SourceStatus {
            connected: false,
            last_frame_at: None,
            frames_total: 0,
            dropped_total: 0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub frames_in: u64,
    pub frames_out: u64,
    pub crc_pass: u64,
    pub crc_fail: u64,
    pub dropped_unknown_icao: u64,
    pub cpr_globals_computed: u64,
    pub cpr_locals_computed: u64,
    pub range_rejected: u64,
    pub alerts_sent: u64,
    pub alerts_suppressed: u64,
    pub alerts_expired: u64,
    pub dropped_frames: HashMap<String, u64>,
    pub sources: HashMap<String, SourceStatus>,
    pub sources_all_down: bool,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn record_frame_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_out(&self) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cpr_global(&self) {
        self.cpr_globals_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cpr_local(&self) {
        self.cpr_locals_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_range_rejected(&self) {
        self.range_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_sent(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, source: &str) {
        let map = self.dropped_frames.read().expect("stats lock poisoned");
        if let Some(counter) = map.get(source) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        drop(map);
        let mut map = self.dropped_frames.write().expect("stats lock poisoned");
        map.entry(source.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_source_status(&self, source: &str, status: SourceStatus) {
        let mut map = self.source_status.write().expect("stats lock poisoned");
        map.insert(source.to_string(), status);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let dropped_frames = self
            .dropped_frames
            .read()
            .expect("stats lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        let sources: HashMap<String, SourceStatus> = self
            .source_status
            .read()
            .expect("stats lock poisoned")
            .clone();
        let sources_all_down = !sources.is_empty() && sources.values().all(|s| !s.connected);
        StatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            crc_pass: self.crc_pass.load(Ordering::Relaxed),
            crc_fail: self.crc_fail.load(Ordering::Relaxed),
            dropped_unknown_icao: self.dropped_unknown_icao.load(Ordering::Relaxed),
            cpr_globals_computed: self.cpr_globals_computed.load(Ordering::Relaxed),
            cpr_locals_computed: self.cpr_locals_computed.load(Ordering::Relaxed),
            range_rejected: self.range_rejected.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            alerts_expired: self.alerts_expired.load(Ordering::Relaxed),
            dropped_frames,
            sources,
            sources_all_down,
        }
    }

    pub fn healthy(&self) -> bool {
        let sources = self.source_status.read().expect("stats lock poisoned");
        sources.is_empty() || sources.values().any(|s| s.connected)
    }
}
