#![doc = include_str!("../readme.md")]

mod config;
mod control;
mod dedup;
mod dispatch;
mod error;
mod shell;
mod source_manager;
mod stats;
mod tracker;
mod validate;
mod watchlist;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use config::Config;
use dispatch::Dispatcher;
use dispatch::mqtt::MqttInterface;
use dispatch::serial::SerialInterface;
use modes::decode::cpr::Position;
use modes::decode::TimedMessage;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use stats::Stats;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracker::{SnapshotRecord, Tracker, TrackerConfig, TrackerUpdate};
use validate::KnownIcaos;
use watchlist::{AlertEvent, Matcher};

#[derive(Debug, Parser)]
#[command(
    name = "sentinel1090",
    version,
    about = "ADS-B receiver, aircraft tracker and LoRa/MQTT watchlist alert dispatcher"
)]
struct Options {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "sentinel1090.toml")]
    config: PathBuf,

    /// Activate verbose (debug) logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Port for the read-only HTTP/JSON API (on 0.0.0.0); disabled if unset.
    #[arg(long, default_value = None)]
    serve_port: Option<u16>,

    /// Bind address for the line-oriented TCP control channel; disabled if unset.
    #[arg(long, default_value = None)]
    control_addr: Option<String>,

    /// Print shell completions for the given shell and exit.
    #[arg(long, value_enum, default_value = None)]
    completions: Option<shell::Shell>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::parse();

    if let Some(generator) = options.completions {
        let mut cmd = Options::command();
        let name = cmd.get_name().to_string();
        generate(generator, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let filter = if options.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = Config::from_file(&options.config)?;

    let stats = Arc::new(Stats::new());

    let reference = match (config.cpr.reference_lat, config.cpr.reference_lon) {
        (Some(latitude), Some(longitude)) => Some(Position { latitude, longitude }),
        _ => None,
    };
    let tracker_config = TrackerConfig {
        aircraft_timeout_s: config.tracker.aircraft_timeout_s as f64,
        max_aircraft: config.tracker.max_aircraft,
        reference,
    };
    let tracker = Arc::new(RwLock::new(Tracker::new(tracker_config, stats.clone())));
    tracker
        .write()
        .expect("tracker lock poisoned")
        .set_watchlist(config.watchlist.entries.clone());

    let serial_interface = match &config.dispatcher.serial {
        Some(serial_config) => match SerialInterface::new(
            serial_config.device.clone(),
            serial_config.baud,
            serial_config.channel_number,
            serial_config.psk.as_deref(),
        ) {
            Ok(interface) => Some(interface),
            Err(err) => {
                tracing::warn!("serial interface disabled: {err}");
                None
            }
        },
        None => None,
    };
    let mqtt_interface = match &config.dispatcher.mqtt {
        Some(mqtt_config) => {
            let (interface, mut eventloop) = MqttInterface::connect(mqtt_config);
            tokio::spawn(async move {
                loop {
                    match eventloop.poll().await {
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!("mqtt event loop error: {err}");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            });
            Some(interface)
        }
        None => None,
    };

    let dispatcher = Dispatcher::new(
        config.dispatcher.clone(),
        serial_interface,
        mqtt_interface,
        config.watchlist.min_interval_s,
        config.watchlist.max_alerts_per_hour,
        stats.clone(),
    );
    let (alert_tx, alert_rx) = mpsc::channel::<AlertEvent>(256);
    tokio::spawn(dispatcher.run(alert_rx));

    if let Some(port) = options.serve_port {
        let tracker_web = tracker.clone();
        let stats_web = stats.clone();
        tokio::spawn(async move {
            serve_http(port, tracker_web, stats_web).await;
        });
    }

    if let Some(addr) = options.control_addr.clone() {
        let tracker_control = tracker.clone();
        let stats_control = stats.clone();
        tokio::spawn(async move {
            if let Err(err) = control::serve(&addr, tracker_control, stats_control).await {
                tracing::error!("control channel failed: {err}");
            }
        });
    }

    let (raw_tx, raw_rx) = mpsc::channel::<TimedMessage>(1024);
    let (decoded_tx, decoded_rx) = mpsc::channel::<TimedMessage>(1024);
    let (dedup_tx, mut dedup_rx) = mpsc::channel::<TimedMessage>(1024);
    let (snapshot_tx, mut snapshot_rx) = mpsc::channel::<SnapshotRecord>(1024);

    let known_icaos = KnownIcaos::new();
    tokio::spawn(validate::run(raw_rx, decoded_tx, stats.clone(), known_icaos));
    tokio::spawn(dedup::deduplicate_messages(decoded_rx, dedup_tx, 50));

    for source in config.sources.clone() {
        let tx = raw_tx.clone();
        let snapshot_tx = snapshot_tx.clone();
        let stats = stats.clone();
        let name = source.name.clone();
        tokio::spawn(async move {
            if let Err(err) = source_manager::spawn(source, tx, snapshot_tx, stats).await {
                tracing::error!("source {name} exited: {err}");
            }
        });
    }
    drop(raw_tx);
    drop(snapshot_tx);

    let matcher_entries = config.watchlist.entries.clone();
    let matcher = Matcher::new(matcher_entries);

    let expire_tracker = tracker.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let now = wall_clock();
            let removed = expire_tracker
                .write()
                .expect("tracker lock poisoned")
                .expire(now);
            if removed > 0 {
                tracing::debug!("expired {removed} stale aircraft");
            }
        }
    });

    loop {
        tokio::select! {
            Some(msg) = dedup_rx.recv() => {
                stats.record_frame_out();
                let source_name = msg
                    .metadata
                    .first()
                    .and_then(|m| m.name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                let update = {
                    let mut tracker = tracker.write().expect("tracker lock poisoned");
                    tracker.ingest(&msg, &source_name)
                };
                if let Some(update) = update {
                    dispatch_if_matched(&tracker, &matcher, &alert_tx, &stats, update, msg.timestamp).await;
                }
            }
            Some(record) = snapshot_rx.recv() => {
                let timestamp = record.timestamp;
                let update = {
                    let mut tracker = tracker.write().expect("tracker lock poisoned");
                    tracker.ingest_snapshot(record)
                };
                if let Some(update) = update {
                    dispatch_if_matched(&tracker, &matcher, &alert_tx, &stats, update, timestamp).await;
                }
            }
            else => break,
        }
    }

    Ok(())
}

async fn dispatch_if_matched(
    tracker: &Arc<RwLock<Tracker>>,
    matcher: &Matcher,
    alert_tx: &mpsc::Sender<AlertEvent>,
    stats: &Stats,
    update: TrackerUpdate,
    event_time: f64,
) {
    if !update.position_resolved
        && !update
            .fields_changed
            .iter()
            .any(|f| matches!(f, tracker::FieldKind::Callsign))
    {
        return;
    }
    let aircraft = {
        let tracker = tracker.read().expect("tracker lock poisoned");
        tracker.get(&update.icao)
    };
    let Some(aircraft) = aircraft else { return };
    if let Some((match_kind, label)) = matcher.find(&aircraft) {
        let event = AlertEvent {
            aircraft_snapshot: aircraft,
            match_kind,
            match_reason: label,
            event_time,
        };
        if alert_tx.send(event).await.is_err() {
            stats.alerts_expired.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }
}

fn wall_clock() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

mod web;

async fn serve_http(port: u16, tracker: Arc<RwLock<Tracker>>, stats: Arc<Stats>) {
    use warp::Filter;
    use web::TrackQuery;

    let tracker_home = tracker.clone();
    let home = warp::path::end()
        .and(warp::any().map(move || tracker_home.clone()))
        .and_then(|tracker: Arc<RwLock<Tracker>>| async move { web::icao24(&tracker).await });

    let tracker_all = tracker.clone();
    let all = warp::path("all")
        .and(warp::any().map(move || tracker_all.clone()))
        .and_then(|tracker: Arc<RwLock<Tracker>>| async move { web::all(&tracker).await });

    let tracker_track = tracker.clone();
    let track = warp::path("track")
        .and(warp::any().map(move || tracker_track.clone()))
        .and(warp::query::<TrackQuery>())
        .and_then(|tracker: Arc<RwLock<Tracker>>, q: TrackQuery| async move {
            web::track(&tracker, q).await
        });

    let stats_route_data = stats.clone();
    let stats_route = warp::path("stats")
        .and(warp::any().map(move || stats_route_data.clone()))
        .and_then(|stats: Arc<Stats>| async move { web::stats(&stats).await });

    let health_route_data = stats.clone();
    let health_route = warp::path("health")
        .and(warp::any().map(move || health_route_data.clone()))
        .and_then(|stats: Arc<Stats>| async move { web::health(&stats).await });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["*"])
        .allow_methods(vec!["GET"]);

    let routes = warp::get()
        .and(home.or(all).or(track).or(stats_route).or(health_route))
        .recover(web::handle_rejection)
        .with(cors);

    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}
