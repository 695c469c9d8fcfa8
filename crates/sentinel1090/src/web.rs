use crate::stats::{Stats, StatsSnapshot};
use crate::tracker::{Aircraft, Tracker};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::reply::Reply;

#[derive(Serialize, Deserialize)]
pub struct TrackQuery {
    icao24: String,
}

/// An API error serializable to JSON.
#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

pub async fn icao24(
    tracker: &Arc<RwLock<Tracker>>,
) -> Result<warp::reply::Json, Infallible> {
    let tracker = tracker.read().expect("tracker lock poisoned");
    let keys: Vec<String> = tracker.snapshot().into_iter().map(|a| a.icao).collect();
    Ok::<_, Infallible>(warp::reply::json(&keys))
}

pub async fn all(
    tracker: &Arc<RwLock<Tracker>>,
) -> Result<warp::reply::Json, Infallible> {
    let tracker = tracker.read().expect("tracker lock poisoned");
    let all: Vec<Aircraft> = tracker.snapshot();
    Ok::<_, Infallible>(warp::reply::json(&all))
}

pub async fn track(
    tracker: &Arc<RwLock<Tracker>>,
    q: TrackQuery,
) -> Result<warp::reply::Json, Infallible> {
    let tracker = tracker.read().expect("tracker lock poisoned");
    Ok::<_, Infallible>(warp::reply::json(&tracker.get(&q.icao24)))
}

pub async fn stats(stats: &Arc<Stats>) -> Result<warp::reply::Json, Infallible> {
    let snapshot: StatsSnapshot = stats.snapshot();
    Ok::<_, Infallible>(warp::reply::json(&snapshot))
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
}

pub async fn health(stats: &Arc<Stats>) -> Result<impl Reply, Infallible> {
    let healthy = stats.healthy();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&HealthResponse { healthy }),
        status,
    ))
}

// Define a rejection handler
pub async fn handle_rejection(
    err: Rejection,
) -> Result<impl Reply, Infallible> {
    // https://github.com/seanmonstar/warp/blob/master/examples/rejections.rs

    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message =
            "Route not found, try one of / /all /track?icao24={icao24} /stats /health";
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Only GET queries are supported";
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid query";
    } else {
        tracing::error!("unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Unknown error";
    }

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message: message.into(),
    });

    Ok(warp::reply::with_status(json, code))
}
