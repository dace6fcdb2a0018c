//! # Duration Resolver
//!
//! Turns published track durations into a release's total playback time,
//! estimating from the physical format when no track carries a usable
//! duration.
//!
//! Parsing never fails: anything that is not `s`, `m:ss` or `h:mm:ss` counts
//! as zero seconds and is logged.

use core_library::models::{Format, Track};
use once_cell::sync::Lazy;
use provider_discogs::types::ReleaseDetails;
use regex::Regex;
use tracing::{debug, warn};

/// Used when no vinyl format gives anything to estimate from
pub const DEFAULT_ESTIMATE_SECS: i64 = 2400;

/// Per side, for vinyl whose size and speed match no known combination
const FALLBACK_SIDE_SECS: i64 = 1200;

static SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)$").expect("valid pattern"));
static MINUTES_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d{2})$").expect("valid pattern"));
static HOURS_MINUTES_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):(\d{2}):(\d{2})$").expect("valid pattern"));

static DIAMETER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^(7|10|12)\s*(?:"|''|”|-?\s*inch(?:es)?)$"#).expect("valid pattern")
});
static SPEED_33: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^33(?:\s*(?:⅓|1/3))?\s*rpm$").expect("valid pattern")
});
static SPEED_45: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^45\s*rpm$").expect("valid pattern"));

/// A resolved playback time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationResolution {
    pub seconds: i64,
    /// True when derived from format metadata instead of track durations
    pub estimated: bool,
}

/// Parse a published duration into seconds
///
/// ```
/// use core_sync::duration::parse_duration;
///
/// assert_eq!(parse_duration("125"), 125);
/// assert_eq!(parse_duration("3:45"), 225);
/// assert_eq!(parse_duration("1:02:03"), 3723);
/// assert_eq!(parse_duration("3m45s"), 0);
/// ```
pub fn parse_duration(text: &str) -> i64 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }

    let parsed = if let Some(caps) = HOURS_MINUTES_SECONDS.captures(text) {
        fields(&caps, &[3600, 60, 1])
    } else if let Some(caps) = MINUTES_SECONDS.captures(text) {
        fields(&caps, &[60, 1])
    } else if let Some(caps) = SECONDS.captures(text) {
        fields(&caps, &[1])
    } else {
        None
    };

    parsed.unwrap_or_else(|| {
        warn!(duration = text, "Unparseable track duration");
        0
    })
}

fn fields(caps: &regex::Captures<'_>, weights: &[i64]) -> Option<i64> {
    weights
        .iter()
        .enumerate()
        .try_fold(0i64, |total, (i, weight)| {
            let value: i64 = caps.get(i + 1)?.as_str().parse().ok()?;
            total.checked_add(value.checked_mul(*weight)?)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speed {
    ThirtyThree,
    FortyFive,
    Other,
}

/// Estimate total playback time from vinyl format metadata
///
/// Each vinyl format contributes `qty × 2 sides × seconds per side`, where
/// seconds per side depend on diameter, speed and whether it is a single.
/// Returns [`DEFAULT_ESTIMATE_SECS`] when nothing contributes.
pub fn estimate_by_format(formats: &[Format]) -> i64 {
    let total = formats
        .iter()
        .filter(|format| format.name.trim().eq_ignore_ascii_case("vinyl"))
        .map(format_seconds)
        .fold(0i64, i64::saturating_add);

    if total == 0 {
        DEFAULT_ESTIMATE_SECS
    } else {
        total
    }
}

fn format_seconds(format: &Format) -> i64 {
    let side = side_seconds(&format.descriptions);
    let qty = if format.qty <= 0 { 1 } else { format.qty };

    qty.checked_mul(2)
        .and_then(|sides| sides.checked_mul(side))
        .unwrap_or_else(|| {
            warn!(qty = format.qty, "Implausible format quantity, counting 1");
            2 * side
        })
}

fn side_seconds(descriptions: &[String]) -> i64 {
    let mut diameter: Option<u32> = None;
    let mut speed: Option<Speed> = None;
    let mut long_play = false;
    let mut single = false;

    for description in descriptions.iter().map(|d| d.trim()) {
        if let Some(caps) = DIAMETER.captures(description) {
            diameter = caps.get(1).and_then(|m| m.as_str().parse().ok());
        } else if SPEED_33.is_match(description) {
            speed = Some(Speed::ThirtyThree);
        } else if SPEED_45.is_match(description) {
            speed = Some(Speed::FortyFive);
        } else if description.to_lowercase().ends_with("rpm") {
            speed = Some(Speed::Other);
        } else if description.eq_ignore_ascii_case("lp") || description.eq_ignore_ascii_case("album") {
            long_play = true;
        } else if description.eq_ignore_ascii_case("single") {
            single = true;
        }
    }

    let diameter = diameter.or(if long_play { Some(12) } else { None });
    let speed = speed.unwrap_or(if diameter == Some(7) {
        Speed::FortyFive
    } else {
        Speed::ThirtyThree
    });

    match (diameter, speed) {
        (Some(7), Speed::FortyFive) if single => 180,
        (Some(7), Speed::FortyFive) => 300,
        (Some(7), Speed::ThirtyThree) => 480,
        (Some(10), Speed::FortyFive) => 540,
        (Some(10), Speed::ThirtyThree) => 900,
        (Some(12), Speed::FortyFive) => 720,
        (Some(12), Speed::ThirtyThree) => 1320,
        _ => FALLBACK_SIDE_SECS,
    }
}

/// Sum track durations, falling back to a format estimate when the sum is 0
pub fn resolve_item_duration(
    release_id: i64,
    tracks: &[Track],
    formats: &[Format],
) -> DurationResolution {
    let exact = tracks
        .iter()
        .map(|track| parse_duration(&track.duration_text))
        .filter(|seconds| *seconds > 0)
        .fold(0i64, |total, seconds| {
            total.checked_add(seconds).unwrap_or_else(|| {
                warn!(release_id, seconds, "Track duration overflows the total, skipping it");
                total
            })
        });

    if exact > 0 {
        debug!(release_id, seconds = exact, "Resolved exact duration");
        return DurationResolution {
            seconds: exact,
            estimated: false,
        };
    }

    let seconds = estimate_by_format(formats);
    debug!(release_id, seconds, "Estimated duration from formats");
    DurationResolution {
        seconds,
        estimated: true,
    }
}

/// Playable tracks of a release detail resource
///
/// Headings and index entries are dropped.
pub fn tracks_from_details(release_id: i64, details: &ReleaseDetails) -> Vec<Track> {
    details
        .tracklist
        .iter()
        .filter(|entry| entry.is_track())
        .map(|entry| Track {
            release_id,
            position: entry.position.clone(),
            title: entry.title.clone(),
            duration_text: entry.duration.clone(),
            duration_seconds: parse_duration(&entry.duration),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vinyl(qty: i64, descriptions: &[&str]) -> Format {
        Format::new("Vinyl", qty).with_descriptions(descriptions.iter().copied())
    }

    fn track(duration: &str) -> Track {
        Track {
            release_id: 1,
            position: "A1".to_string(),
            title: "Song".to_string(),
            duration_text: duration.to_string(),
            duration_seconds: 0,
        }
    }

    #[test]
    fn test_parse_duration_shapes() {
        assert_eq!(parse_duration("125"), 125);
        assert_eq!(parse_duration("3:45"), 225);
        assert_eq!(parse_duration("12:05"), 725);
        assert_eq!(parse_duration("1:02:03"), 3723);
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("3:4"), 0);
        assert_eq!(parse_duration("3:45:1"), 0);
        assert_eq!(parse_duration("-3:45"), 0);
        assert_eq!(parse_duration("3'45\""), 0);
        assert_eq!(parse_duration("99999999999999999999"), 0);
    }

    #[test]
    fn test_estimate_table() {
        assert_eq!(estimate_by_format(&[vinyl(1, &["7\"", "Single", "45 RPM"])]), 360);
        assert_eq!(estimate_by_format(&[vinyl(1, &["7\"", "EP"])]), 600);
        assert_eq!(estimate_by_format(&[vinyl(1, &["7\"", "33 ⅓ RPM"])]), 960);
        assert_eq!(estimate_by_format(&[vinyl(1, &["10\"", "45 RPM"])]), 1080);
        assert_eq!(estimate_by_format(&[vinyl(1, &["10\"", "Album"])]), 1800);
        assert_eq!(estimate_by_format(&[vinyl(1, &["12\"", "45 RPM", "Maxi-Single"])]), 1440);
        assert_eq!(estimate_by_format(&[vinyl(1, &["LP", "Album"])]), 2640);
        assert_eq!(estimate_by_format(&[vinyl(1, &["12\"", "78 RPM"])]), 2400);
        assert_eq!(estimate_by_format(&[vinyl(1, &["Compilation"])]), 2400);
    }

    #[test]
    fn test_estimate_double_lp() {
        assert_eq!(estimate_by_format(&[vinyl(2, &["12\"", "LP"])]), 5280);
    }

    #[test]
    fn test_estimate_zero_quantity_counts_once() {
        assert_eq!(estimate_by_format(&[vinyl(0, &["12\"", "LP"])]), 2640);
    }

    #[test]
    fn test_estimate_huge_quantity_counts_once() {
        assert_eq!(
            estimate_by_format(&[vinyl(5_000_000_000_000_000_000, &["LP"])]),
            2640
        );
        assert_eq!(
            estimate_by_format(&[vinyl(i64::MAX, &["12\"", "LP"]), vinyl(i64::MAX / 4, &["LP"])]),
            2640 + 2640
        );
    }

    #[test]
    fn test_estimate_sums_vinyl_only() {
        let formats = vec![
            vinyl(1, &["LP"]),
            Format::new("CD", 1).with_descriptions(["Album"]),
            Format::new("vinyl", 1).with_descriptions(["7\"", "Single"]),
        ];
        assert_eq!(estimate_by_format(&formats), 2640 + 360);
    }

    #[test]
    fn test_estimate_without_vinyl_uses_default() {
        let formats = vec![Format::new("CD", 1), Format::new("Cassette", 2)];
        assert_eq!(estimate_by_format(&formats), DEFAULT_ESTIMATE_SECS);
        assert_eq!(estimate_by_format(&[]), DEFAULT_ESTIMATE_SECS);
    }

    #[test]
    fn test_resolve_exact_sum() {
        let tracks = vec![track("3:00"), track("bogus"), track("2:30")];
        let resolution = resolve_item_duration(1, &tracks, &[vinyl(1, &["LP"])]);
        assert_eq!(
            resolution,
            DurationResolution {
                seconds: 330,
                estimated: false
            }
        );
    }

    #[test]
    fn test_resolve_skips_track_that_overflows_total() {
        let tracks = vec![track("9223372036854775807"), track("1"), track("0:30")];
        let resolution = resolve_item_duration(1, &tracks, &[]);
        assert_eq!(
            resolution,
            DurationResolution {
                seconds: i64::MAX,
                estimated: false
            }
        );

        let tracks = vec![track("1"), track("9223372036854775807")];
        assert_eq!(resolve_item_duration(1, &tracks, &[]).seconds, 1);
    }

    #[test]
    fn test_resolve_falls_back_to_estimate() {
        let tracks = vec![track(""), track("n/a")];
        let resolution = resolve_item_duration(1, &tracks, &[Format::new("CD", 1)]);
        assert_eq!(
            resolution,
            DurationResolution {
                seconds: 2400,
                estimated: true
            }
        );
        assert_eq!(resolve_item_duration(1, &tracks, &[Format::new("CD", 1)]), resolution);
    }

    #[test]
    fn test_tracks_from_details_drops_headings() {
        let details: ReleaseDetails = serde_json::from_str(
            r#"{"id": 1, "tracklist": [
                {"type_": "heading", "position": "", "title": "Side A", "duration": ""},
                {"type_": "track", "position": "A1", "title": "One", "duration": "4:00"},
                {"type_": "index", "position": "A2", "title": "Suite", "duration": "10:00"},
                {"type_": "track", "position": "A3", "title": "Two", "duration": ""}
            ]}"#,
        )
        .unwrap();

        let tracks = tracks_from_details(7, &details);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].release_id, 7);
        assert_eq!(tracks[0].duration_seconds, 240);
        assert_eq!(tracks[1].duration_seconds, 0);
    }
}
