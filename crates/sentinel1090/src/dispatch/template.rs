//! Hand-rolled `{token}` substitution, deliberately not a dynamic
//! expression evaluator: the set of tokens is fixed and every formatter is a
//! pure function of an [`Aircraft`] snapshot and a match label.
use crate::tracker::Aircraft;

fn dms(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();
    let degrees = value.trunc();
    let minutes_full = (value - degrees) * 60.0;
    let minutes = minutes_full.trunc();
    let seconds = (minutes_full - minutes) * 60.0;
    format!("{sign}{degrees:.0}°{minutes:.0}'{seconds:.1}\"")
}

fn compact(lat: f64, lon: f64) -> String {
    format!("{lat:.5},{lon:.5}")
}

/// Maidenhead grid locator, 6-character precision.
fn maidenhead(lat: f64, lon: f64) -> String {
    let lon = lon + 180.0;
    let lat = lat + 90.0;
    let field = [
        (b'A' + (lon / 20.0) as u8) as char,
        (b'A' + (lat / 10.0) as u8) as char,
    ];
    let lon_rem = lon % 20.0;
    let lat_rem = lat % 10.0;
    let square = [
        (b'0' + (lon_rem / 2.0) as u8) as char,
        (b'0' + lat_rem as u8) as char,
    ];
    let lon_rem2 = (lon_rem % 2.0) * 12.0;
    let lat_rem2 = (lat_rem % 1.0) * 24.0;
    let subsquare = [
        (b'a' + lon_rem2 as u8) as char,
        (b'a' + lat_rem2 as u8) as char,
    ];
    format!(
        "{}{}{}{}{}{}",
        field[0], field[1], square[0], square[1], subsquare[0], subsquare[1]
    )
}

/// UTM easting/northing, WGS-84, computed with the standard transverse
/// Mercator series (no external geodesy crate pulled in for a single
/// formatter).
fn utm(lat: f64, lon: f64) -> String {
    const A: f64 = 6_378_137.0;
    const F: f64 = 1.0 / 298.257_223_563;
    let k0 = 0.9996_f64;
    let e2 = F * (2.0 - F);
    let ep2 = e2 / (1.0 - e2);

    let zone = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    let lon0 = ((zone - 1) as f64 * 6.0 - 180.0 + 3.0).to_radians();
    let lat_r = lat.to_radians();
    let lon_r = lon.to_radians();

    let n = A / (1.0 - e2 * lat_r.sin().powi(2)).sqrt();
    let t = lat_r.tan().powi(2);
    let c = ep2 * lat_r.cos().powi(2);
    let a = (lon_r - lon0) * lat_r.cos();

    let m = A
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0) * lat_r
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2.powi(3) / 1024.0)
                * (2.0 * lat_r).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2.powi(3) / 1024.0) * (4.0 * lat_r).sin()
            - (35.0 * e2.powi(3) / 3072.0) * (6.0 * lat_r).sin());

    let easting = k0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + 500_000.0;
    let mut northing = k0
        * (m
            + n * lat_r.tan()
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    let hemisphere = if lat < 0.0 {
        northing += 10_000_000.0;
        "S"
    } else {
        "N"
    };
    format!("{zone}{hemisphere} {easting:.0}E {northing:.0}N")
}

/// Substitute every `{token}` occurring in `format` with the corresponding
/// field of `aircraft`, or an empty string if the field is unset. Unknown
/// tokens pass through verbatim so a typo in the config fails loudly in the
/// rendered alert rather than panicking.
pub fn render(format: &str, aircraft: &Aircraft, label: &str) -> String {
    let lat = aircraft.lat;
    let lon = aircraft.lon;
    let mut out = String::with_capacity(format.len());
    let bytes = format.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = format[i..].find('}') {
                let token = &format[i + 1..i + end];
                out.push_str(&resolve(token, aircraft, label, lat, lon));
                i += end + 1;
                continue;
            }
        }
        let ch = format[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn resolve(
    token: &str,
    aircraft: &Aircraft,
    label: &str,
    lat: Option<f64>,
    lon: Option<f64>,
) -> String {
    match token {
        "icao" => aircraft.icao.clone(),
        "callsign" => aircraft
            .callsign
            .as_ref()
            .map(|c| c.value.clone())
            .unwrap_or_default(),
        "label" => label.to_string(),
        "lat" | "lat_decimal" => lat.map(|v| format!("{v:.5}")).unwrap_or_default(),
        "lon" | "lon_decimal" => lon.map(|v| format!("{v:.5}")).unwrap_or_default(),
        "lat_dms" => lat.map(dms).unwrap_or_default(),
        "lon_dms" => lon.map(dms).unwrap_or_default(),
        "position_compact" => match (lat, lon) {
            (Some(lat), Some(lon)) => compact(lat, lon),
            _ => String::new(),
        },
        "maidenhead" => match (lat, lon) {
            (Some(lat), Some(lon)) => maidenhead(lat, lon),
            _ => String::new(),
        },
        "utm" => match (lat, lon) {
            (Some(lat), Some(lon)) => utm(lat, lon),
            _ => String::new(),
        },
        "alt_baro" => aircraft
            .alt_baro_ft
            .as_ref()
            .map(|v| v.value.to_string())
            .unwrap_or_default(),
        "alt_gnss" => aircraft
            .alt_gnss_ft
            .as_ref()
            .map(|v| v.value.to_string())
            .unwrap_or_default(),
        "ground_speed" => aircraft
            .ground_speed_kt
            .as_ref()
            .map(|v| format!("{:.0}", v.value))
            .unwrap_or_default(),
        "track" => aircraft
            .track_deg
            .as_ref()
            .map(|v| format!("{:.1}", v.value))
            .unwrap_or_default(),
        "squawk" => aircraft
            .squawk
            .as_ref()
            .map(|v| v.value.clone())
            .unwrap_or_default(),
        "vertical_rate" => aircraft
            .vertical_rate_fpm
            .as_ref()
            .map(|v| v.value.to_string())
            .unwrap_or_default(),
        "last_seen" => format!("{:.0}", aircraft.last_seen),
        other => format!("{{{other}}}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Timestamped;

    fn sample() -> Aircraft {
        let mut a = Aircraft::default();
        a.icao = "4840d6".to_string();
        a.callsign = Some(Timestamped {
            value: "KLM1023".to_string(),
            source_time: 0.0,
        });
        a.lat = Some(52.25720);
        a.lon = Some(3.91937);
        a.alt_baro_ft = Some(Timestamped {
            value: 38000,
            source_time: 0.0,
        });
        a
    }

    #[test]
    fn renders_known_tokens() {
        let aircraft = sample();
        let rendered = render("{icao} {callsign} {alt_baro}ft {label}", &aircraft, "target");
        assert_eq!(rendered, "4840d6 KLM1023 38000ft target");
    }

    #[test]
    fn unknown_token_passes_through() {
        let aircraft = sample();
        let rendered = render("{not_a_token}", &aircraft, "label");
        assert_eq!(rendered, "{not_a_token}");
    }

    #[test]
    fn dms_formats_with_degree_symbol() {
        let aircraft = sample();
        let rendered = render("{lat_dms}", &aircraft, "label");
        assert!(rendered.contains('°'));
    }
}
