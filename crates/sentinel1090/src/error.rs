//! Error taxonomy: every variant here is observed only through a counter
//! and a log line. Nothing but [`SourceFatal`] and a configuration load
//! failure is allowed to propagate past a component boundary.
use std::fmt;

/// Why a raw frame never made it to a decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRejectKind {
    Length,
    Charset,
    Crc,
    UnknownIcao,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReject(pub FrameRejectKind);

impl fmt::Display for FrameReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.0 {
            FrameRejectKind::Length => "length",
            FrameRejectKind::Charset => "charset",
            FrameRejectKind::Crc => "crc",
            FrameRejectKind::UnknownIcao => "unknown_icao",
        };
        write!(f, "frame rejected: {reason}")
    }
}

impl std::error::Error for FrameReject {}

/// A field that decoded to a value outside its legal range.
#[derive(Debug, Clone)]
pub struct RangeError {
    pub field: &'static str,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value out of range for field {}", self.field)
    }
}

impl std::error::Error for RangeError {}

/// A feeder connection failure. `Transient` triggers a reconnect with
/// backoff; `Fatal` means the source's own configuration is unusable and it
/// is disabled for the life of the process.
#[derive(Debug)]
pub enum SourceError {
    Transient(String),
    Fatal(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transient(msg) => {
                write!(f, "source transient error: {msg}")
            }
            SourceError::Fatal(msg) => write!(f, "source misconfigured: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// An outbound delivery failure. `Transient` is retried with backoff up to
/// `max_attempts`; `Permanent` drops the message outright.
#[derive(Debug)]
pub enum DeliveryError {
    Transient(String),
    Permanent(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Transient(msg) => {
                write!(f, "delivery transient error: {msg}")
            }
            DeliveryError::Permanent(msg) => {
                write!(f, "delivery permanently failed: {msg}")
            }
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Failure to load or parse the configuration file. The only other error
/// class, alongside [`SourceError::Fatal`], allowed to abort startup.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}
