//! Configuration surface: a single TOML file, overridable by a handful
//! of `clap` flags rather than a sprawling flag-per-field CLI.
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

fn default_reconnect_initial() -> u64 {
    500
}
fn default_reconnect_max() -> u64 {
    30_000
}
fn default_read_idle() -> u64 {
    15
}
fn default_global_cpr_window() -> u64 {
    10
}
fn default_surface_cpr_window() -> u64 {
    25
}
fn default_local_cpr_range_nm() -> f64 {
    180.0
}
fn default_position_timeout() -> u64 {
    60
}
fn default_aircraft_timeout() -> u64 {
    300
}
fn default_max_aircraft() -> usize {
    10_000
}
fn default_min_interval() -> u64 {
    300
}
fn default_max_alerts_per_hour() -> u32 {
    10
}
fn default_routing() -> String {
    "fallback".to_string()
}
fn default_failover_timeout() -> u64 {
    30
}
fn default_max_message_length() -> usize {
    200
}
fn default_max_attempts() -> u32 {
    3
}
fn default_message_ttl() -> u64 {
    300
}
fn default_health_check_interval() -> u64 {
    60
}
fn default_message_format() -> String {
    "{icao} {callsign} {lat_dms} {lon_dms} {alt_baro}ft {label}".to_string()
}
fn default_baud() -> u32 {
    115_200
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_qos() -> u8 {
    0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub address: String,
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_backoff_initial_ms: u64,
    #[serde(default = "default_reconnect_max")]
    pub reconnect_backoff_max_ms: u64,
    #[serde(default = "default_read_idle")]
    pub read_idle_timeout_s: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    BeastTcp,
    AvrTcp,
    JsonPoll,
    RawFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CprConfig {
    pub reference_lat: Option<f64>,
    pub reference_lon: Option<f64>,
    #[serde(default = "default_global_cpr_window")]
    pub global_cpr_window_s: u64,
    #[serde(default = "default_surface_cpr_window")]
    pub surface_cpr_window_s: u64,
    #[serde(default = "default_local_cpr_range_nm")]
    pub local_cpr_range_nm: f64,
    #[serde(default = "default_position_timeout")]
    pub position_timeout_s: u64,
}

impl Default for CprConfig {
    fn default() -> Self {
        CprConfig {
            reference_lat: None,
            reference_lon: None,
            global_cpr_window_s: default_global_cpr_window(),
            surface_cpr_window_s: default_surface_cpr_window(),
            local_cpr_range_nm: default_local_cpr_range_nm(),
            position_timeout_s: default_position_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfigToml {
    #[serde(default = "default_aircraft_timeout")]
    pub aircraft_timeout_s: u64,
    #[serde(default = "default_max_aircraft")]
    pub max_aircraft: usize,
}

impl Default for TrackerConfigToml {
    fn default() -> Self {
        TrackerConfigToml {
            aircraft_timeout_s: default_aircraft_timeout(),
            max_aircraft: default_max_aircraft(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_s: u64,
    #[serde(default = "default_max_alerts_per_hour")]
    pub max_alerts_per_hour: u32,
    #[serde(default, rename = "entry")]
    pub entries: Vec<crate::watchlist::WatchlistEntry>,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        WatchlistConfig {
            min_interval_s: default_min_interval(),
            max_alerts_per_hour: default_max_alerts_per_hour(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    pub channel_number: u8,
    pub psk: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub broker_url: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub topic_prefix: String,
    pub region: String,
    pub client_id: String,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default)]
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_routing")]
    pub routing: String,
    #[serde(default = "default_failover_timeout")]
    pub failover_timeout_s: u64,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_message_ttl")]
    pub message_ttl_s: u64,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_s: u64,
    #[serde(default = "default_message_format")]
    pub message_format: String,
    pub serial: Option<SerialConfig>,
    pub mqtt: Option<MqttConfig>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            routing: default_routing(),
            failover_timeout_s: default_failover_timeout(),
            max_message_length: default_max_message_length(),
            max_attempts: default_max_attempts(),
            message_ttl_s: default_message_ttl(),
            health_check_interval_s: default_health_check_interval(),
            message_format: default_message_format(),
            serial: None,
            mqtt: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub cpr: CprConfig,
    #[serde(default)]
    pub tracker: TrackerConfigToml,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| ConfigError(format!("parsing {}: {e}", path.display())))
    }
}
