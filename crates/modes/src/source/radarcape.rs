use crate::decode::TimeSource;
use crate::prelude::*;
use crate::source::beast::DataSource;
use futures_util::pin_mut;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;

/// Connect to a Radarcape-style Beast feed and forward decoded frames.
///
/// Radarcape receivers carry a GPS-disciplined timestamp that is trusted
/// outright when it is close to the system clock, and otherwise discarded
/// in favor of the local receive time (see [`TimeSource`]).
pub async fn receiver(
    address: String,
    tx: mpsc::Sender<TimedMessage>,
    serial: u64,
    name: Option<String>,
) {
    match TcpStream::connect(&address).await {
        Ok(stream) => {
            let msg_stream = beast::next_msg(DataSource::Tcp(stream)).await;
            pin_mut!(msg_stream); // needed for iteration
            'receive: loop {
                while let Some(msg) = msg_stream.next().await {
                    let msg = process_radarcape(&msg, serial, name.clone());
                    if tx.send(msg).await.is_err() {
                        break 'receive;
                    }
                }
            }
        }
        Err(err_tcp) => match UdpSocket::bind(&address).await {
            Ok(socket) => {
                let msg_stream =
                    beast::next_msg(DataSource::Udp(socket)).await;
                pin_mut!(msg_stream); // needed for iteration
                'receive: loop {
                    while let Some(msg) = msg_stream.next().await {
                        let msg =
                            process_radarcape(&msg, serial, name.clone());
                        if tx.send(msg).await.is_err() {
                            break 'receive;
                        }
                    }
                }
            }
            Err(err_udp) => {
                tracing::error!(
                    "failed to connect to {address} in TCP ({err_tcp}) and UDP ({err_udp})"
                );
            }
        },
    }
}

fn now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("SystemTime before unix epoch")
        .as_micros()
}

fn today() -> u128 {
    86_400 * (now() / 86_400_000_000)
}

fn process_radarcape(
    msg: &[u8],
    serial: u64,
    name: Option<String>,
) -> TimedMessage {
    // Copy the bytes from the slice into the array starting from index 2
    let mut array = [0u8; 8];
    array[2..8].copy_from_slice(&msg[2..8]);

    let ts = u64::from_be_bytes(array);
    let seconds = ts >> 30;
    let nanos = ts & 0x00003FFFFFFF;
    let offset = seconds as f64 + nanos as f64 * 1e-9;

    let now_s = now() as f64 * 1e-6;
    let gnss_timestamp = today() as f64 + offset;

    let timesource = match (now_s - gnss_timestamp).abs() {
        value if value < 5. => TimeSource::Radarcape,
        _ => TimeSource::System,
    };
    // In some cases the timestamp is just the one of dump1090, so forget it.
    let (timestamp, gnss_timestamp) = match timesource {
        TimeSource::Radarcape => (gnss_timestamp, Some(gnss_timestamp)),
        _ => (now_s, None),
    };

    let metadata = SensorMetadata {
        system_timestamp: now_s,
        gnss_timestamp,
        nanoseconds: Some(ts),
        rssi: None,
        serial,
        name,
    };

    TimedMessage {
        timestamp,
        frame: msg[9..].to_vec(),
        message: None,
        metadata: vec![metadata],
        decode_time: None,
    }
}
