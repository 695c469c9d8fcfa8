//! Watchlist matching against live [`Aircraft`](crate::tracker::Aircraft)
//! records. Evaluation is O(entries); watchlists in practice stay well
//! under a thousand entries so no index is built.
use crate::tracker::Aircraft;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchlistEntry {
    IcaoExact { value: String, label: String },
    IcaoPrefix { value: String, label: String },
    CallsignExact { value: String, label: String },
    CallsignRegex { value: String, label: String },
}

impl WatchlistEntry {
    pub fn label(&self) -> &str {
        match self {
            WatchlistEntry::IcaoExact { label, .. }
            | WatchlistEntry::IcaoPrefix { label, .. }
            | WatchlistEntry::CallsignExact { label, .. }
            | WatchlistEntry::CallsignRegex { label, .. } => label,
        }
    }
}

enum CompiledEntry {
    IcaoExact { value: String, label: String },
    IcaoPrefix { value: String, label: String },
    CallsignExact { value: String, label: String },
    CallsignRegex { regex: Regex, label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    IcaoExact,
    IcaoPrefix,
    CallsignExact,
    CallsignRegex,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub aircraft_snapshot: Aircraft,
    pub match_kind: MatchKind,
    pub match_reason: String,
    pub event_time: f64,
}

/// Immutable once built; the Tracker swaps the whole matcher atomically on
/// `set_watchlist` rather than mutating entries in place.
pub struct Matcher {
    entries: Vec<CompiledEntry>,
}

impl Matcher {
    pub fn new(entries: Vec<WatchlistEntry>) -> Self {
        let compiled = entries
            .into_iter()
            .filter_map(|entry| match entry {
                WatchlistEntry::IcaoExact { value, label } => {
                    Some(CompiledEntry::IcaoExact {
                        value: value.to_lowercase(),
                        label,
                    })
                }
                WatchlistEntry::IcaoPrefix { value, label } => {
                    Some(CompiledEntry::IcaoPrefix {
                        value: value.to_lowercase(),
                        label,
                    })
                }
                WatchlistEntry::CallsignExact { value, label } => {
                    Some(CompiledEntry::CallsignExact {
                        value: value.trim().to_string(),
                        label,
                    })
                }
                WatchlistEntry::CallsignRegex { value, label } => {
                    match Regex::new(&value) {
                        Ok(regex) => Some(CompiledEntry::CallsignRegex { regex, label }),
                        Err(err) => {
                            tracing::warn!("invalid watchlist regex {value:?}: {err}");
                            None
                        }
                    }
                }
            })
            .collect();
        Matcher { entries: compiled }
    }

    pub fn matches(&self, aircraft: &Aircraft) -> bool {
        self.find(aircraft).is_some()
    }

    pub fn find(&self, aircraft: &Aircraft) -> Option<(MatchKind, String)> {
        let callsign = aircraft.callsign.as_ref().map(|c| c.value.trim().to_string());
        for entry in &self.entries {
            match entry {
                CompiledEntry::IcaoExact { value, label } => {
                    if &aircraft.icao == value {
                        return Some((MatchKind::IcaoExact, label.clone()));
                    }
                }
                CompiledEntry::IcaoPrefix { value, label } => {
                    if aircraft.icao.starts_with(value.as_str()) {
                        return Some((MatchKind::IcaoPrefix, label.clone()));
                    }
                }
                CompiledEntry::CallsignExact { value, label } => {
                    if callsign.as_deref() == Some(value.as_str()) {
                        return Some((MatchKind::CallsignExact, label.clone()));
                    }
                }
                CompiledEntry::CallsignRegex { regex, label } => {
                    if let Some(cs) = &callsign {
                        if regex.is_match(cs) {
                            return Some((MatchKind::CallsignRegex, label.clone()));
                        }
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aircraft(icao: &str, callsign: Option<&str>) -> Aircraft {
        let mut a = Aircraft::default();
        a.icao = icao.to_string();
        if let Some(cs) = callsign {
            a.callsign = Some(crate::tracker::Timestamped {
                value: cs.to_string(),
                source_time: 0.0,
            });
        }
        a
    }

    #[test]
    fn icao_exact_matches_case_insensitively() {
        let matcher = Matcher::new(vec![WatchlistEntry::IcaoExact {
            value: "4840D6".to_string(),
            label: "target".to_string(),
        }]);
        assert!(matcher.matches(&aircraft("4840d6", None)));
        assert!(!matcher.matches(&aircraft("4840d7", None)));
    }

    #[test]
    fn callsign_regex_matches() {
        let matcher = Matcher::new(vec![WatchlistEntry::CallsignRegex {
            value: "^KLM.*".to_string(),
            label: "klm".to_string(),
        }]);
        assert!(matcher.matches(&aircraft("abcdef", Some("KLM1023"))));
        assert!(!matcher.matches(&aircraft("abcdef", Some("AFR1023"))));
    }

    #[test]
    fn icao_prefix_matches() {
        let matcher = Matcher::new(vec![WatchlistEntry::IcaoPrefix {
            value: "484".to_string(),
            label: "block".to_string(),
        }]);
        assert!(matcher.matches(&aircraft("4840d6", None)));
        assert!(!matcher.matches(&aircraft("390000", None)));
    }
}
