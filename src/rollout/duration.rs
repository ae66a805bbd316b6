//! Human-readable durations such as `5m`, `1h30m` or `1.5s`.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use super::errors::RolloutError;

static SEGMENT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn segment_pattern() -> &'static Regex {
    SEGMENT_PATTERN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?|\.\d+)([a-zA-Zµ]+)").expect("duration pattern is valid")
    })
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "µs" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" => 60.0 * 1_000_000_000.0,
        "h" => 3_600.0 * 1_000_000_000.0,
        _ => return None,
    };
    Some(nanos)
}

/// Parse a string of concatenated `<number><unit>` segments into a total
/// duration.
///
/// Segments are summed, so `1h30m` is ninety minutes. A string with no
/// recognizable segment parses to zero; an unknown unit is an error.
/// Text between segments is ignored: `1h30` is one hour and `-5m` is five
/// minutes.
pub fn parse_duration(input: &str) -> Result<Duration, RolloutError> {
    let mut total_nanos = 0.0_f64;

    for captures in segment_pattern().captures_iter(input) {
        let value: f64 = captures[1]
            .parse()
            .map_err(|_| RolloutError::config(format!("invalid number in duration '{input}'")))?;
        let unit = &captures[2];
        let scale = unit_nanos(unit).ok_or_else(|| RolloutError::UnknownDurationUnit {
            input: input.to_string(),
            unit: unit.to_string(),
        })?;
        total_nanos += value * scale;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Parse every entry of a wait schedule, failing on the first bad entry.
pub fn parse_schedule<S: AsRef<str>>(entries: &[S]) -> Result<Vec<Duration>, RolloutError> {
    entries
        .iter()
        .map(|entry| parse_duration(entry.as_ref()))
        .collect()
}

/// Serde adapter storing a wait schedule as whole milliseconds.
///
/// Sub-millisecond remainders round up, so a reloaded wait is never shorter
/// than the configured one.
pub mod millis_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        let millis: Vec<u64> = durations
            .iter()
            .map(|d| d.as_nanos().div_ceil(1_000_000) as u64)
            .collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Duration>, D::Error> {
        let millis = Vec::<u64>::deserialize(deserializer)?;
        Ok(millis.into_iter().map(Duration::from_millis).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_to_milliseconds() {
        assert_eq!(parse_duration("5m").unwrap().as_millis(), 300_000);
    }

    #[test]
    fn parses_fractional_seconds() {
        assert_eq!(parse_duration("1.5s").unwrap().as_millis(), 1_500);
    }

    #[test]
    fn sums_concatenated_segments() {
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            Duration::from_secs(90 * 60)
        );
        assert_eq!(
            parse_duration("2s500ms").unwrap(),
            Duration::from_millis(2_500)
        );
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("40ns").unwrap(), Duration::from_nanos(40));
    }

    #[test]
    fn unknown_unit_is_a_config_error() {
        let err = parse_duration("10m5x").unwrap_err();
        assert!(err.is_config());
        assert!(matches!(
            err,
            RolloutError::UnknownDurationUnit { ref unit, .. } if unit == "x"
        ));

        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn no_segments_is_zero() {
        assert_eq!(parse_duration("").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("soon").unwrap(), Duration::ZERO);
    }

    #[test]
    fn text_between_segments_is_ignored() {
        assert_eq!(parse_duration("1h30").unwrap(), Duration::from_secs(3_600));
        assert_eq!(parse_duration("-5m").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn stored_schedule_rounds_up_to_milliseconds() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Schedule(#[serde(with = "millis_vec")] Vec<Duration>);

        let json = serde_json::to_string(&Schedule(vec![
            parse_duration("250us").unwrap(),
            parse_duration("1.5s").unwrap(),
        ]))
        .unwrap();
        assert_eq!(json, "[1,1500]");

        let Schedule(reloaded) = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, vec![Duration::from_millis(1), Duration::from_millis(1_500)]);
    }

    #[test]
    fn schedule_stops_at_first_bad_entry() {
        let schedule = parse_schedule(&["5m", "10m", "15m"]).unwrap();
        assert_eq!(
            schedule,
            vec![
                Duration::from_secs(300),
                Duration::from_secs(600),
                Duration::from_secs(900)
            ]
        );

        assert!(parse_schedule(&["5m", "1w"]).is_err());
    }
}
