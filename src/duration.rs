//! ISO-8601 duration parsing for the `contentDetails.duration` field the
//! YouTube API returns (`PT1H2M3S`, `PT45S`, ...).

/// Converts a `PT#H#M#S` expression into whole seconds.
///
/// Every part is optional and a missing part counts as zero. Parsing starts at
/// the first `PT` marker and stops at the first token that does not fit the
/// hours, minutes, seconds order; whatever was read up to that point is kept.
/// Anything without a `PT` marker yields `0`, which keeps it below every
/// positive length threshold.
pub fn parse_duration_secs(value: &str) -> u64 {
    let Some(start) = value.find("PT") else {
        return 0;
    };
    let mut rest = &value[start + 2..];
    let mut total: u64 = 0;
    // 0 = expecting hours, 1 = minutes, 2 = seconds, 3 = done.
    let mut stage = 0;

    while stage < 3 {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            break;
        }
        let Ok(amount) = rest[..digits].parse::<u64>() else {
            break;
        };
        let (unit_stage, multiplier) = match rest[digits..].chars().next() {
            Some('H') => (0, 3600),
            Some('M') => (1, 60),
            Some('S') => (2, 1),
            _ => break,
        };
        if unit_stage < stage {
            break;
        }
        total = total.saturating_add(amount.saturating_mul(multiplier));
        stage = unit_stage + 1;
        rest = &rest[digits + 1..];
    }

    total
}

/// Renders seconds the way the player overlay shows them (`1:02:03`, `4:05`).
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
