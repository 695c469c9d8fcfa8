//! Line-oriented TCP control channel: one command per line, one reply
//! per line. Answers `LIST`/`STATS`/`WATCHLIST`/`HEALTH` from an ssh
//! session or netcat, no websocket framing required.
use crate::stats::Stats;
use crate::tracker::Tracker;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

pub async fn serve(
    addr: &str,
    tracker: Arc<RwLock<Tracker>>,
    stats: Arc<Stats>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("control channel listening on {addr}");
    loop {
        let (stream, peer) = listener.accept().await?;
        let tracker = tracker.clone();
        let stats = stats.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, tracker, stats).await {
                warn!("control connection {peer} ended: {err}");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    tracker: Arc<RwLock<Tracker>>,
    stats: Arc<Stats>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = match dispatch(&line, &tracker, &stats) {
            Command::Quit => {
                writer.write_all(b"bye\n").await?;
                break;
            }
            Command::Reply(text) => text,
        };
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    Ok(())
}

enum Command {
    Reply(String),
    Quit,
}

fn dispatch(line: &str, tracker: &Arc<RwLock<Tracker>>, stats: &Arc<Stats>) -> Command {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or("").to_uppercase();
    match verb.as_str() {
        "LIST" => {
            let tracker = tracker.read().expect("tracker lock poisoned");
            let icaos: Vec<String> = tracker.snapshot().into_iter().map(|a| a.icao).collect();
            Command::Reply(serde_json::to_string(&icaos).unwrap_or_default())
        }
        "STATS" => {
            let snapshot = stats.snapshot();
            Command::Reply(serde_json::to_string(&snapshot).unwrap_or_default())
        }
        "WATCHLIST" => {
            let tracker = tracker.read().expect("tracker lock poisoned");
            let flagged: Vec<String> = tracker
                .snapshot()
                .into_iter()
                .filter(|a| a.is_watchlist)
                .map(|a| a.icao)
                .collect();
            Command::Reply(serde_json::to_string(&flagged).unwrap_or_default())
        }
        "HEALTH" => Command::Reply(
            serde_json::json!({ "healthy": stats.healthy() }).to_string(),
        ),
        "QUIT" => Command::Quit,
        "" => Command::Reply(String::new()),
        other => Command::Reply(format!("unknown command: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerConfig;

    #[test]
    fn health_reports_true_with_no_sources() {
        let stats = Arc::new(Stats::new());
        let tracker = Arc::new(RwLock::new(Tracker::new(TrackerConfig::default(), stats.clone())));
        match dispatch("HEALTH", &tracker, &stats) {
            Command::Reply(body) => assert!(body.contains("true")),
            Command::Quit => panic!("unexpected quit"),
        }
    }

    #[test]
    fn quit_ends_session() {
        let stats = Arc::new(Stats::new());
        let tracker = Arc::new(RwLock::new(Tracker::new(TrackerConfig::default(), stats.clone())));
        assert!(matches!(dispatch("quit", &tracker, &stats), Command::Quit));
    }

    #[test]
    fn unknown_command_echoes_back() {
        let stats = Arc::new(Stats::new());
        let tracker = Arc::new(RwLock::new(Tracker::new(TrackerConfig::default(), stats.clone())));
        match dispatch("FROB", &tracker, &stats) {
            Command::Reply(body) => assert!(body.contains("FROB")),
            Command::Quit => panic!("unexpected quit"),
        }
    }
}
