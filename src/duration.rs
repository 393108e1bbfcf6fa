//! Human duration strings such as `30m`, `2h` or `1w`.

use chrono::Duration;

/// Parse `<amount><unit>` where unit is one of s/m/h/d/w (case-insensitive).
/// Whitespace between amount and unit is allowed.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = input.split_at(split);
    if amount.is_empty() {
        return None;
    }

    let amount: i64 = amount.parse().ok()?;
    let multiplier: i64 = match unit.trim_start().to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return None,
    };

    let seconds = amount.checked_mul(multiplier)?;
    // chrono panics past i64::MAX milliseconds
    if seconds > i64::MAX / 1000 {
        return None;
    }
    Some(Duration::seconds(seconds))
}

/// Render as `1d 2h 3m 4s`, omitting zero parts. Non-positive spans render as `0s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    if total <= 0 {
        return "0s".to_string();
    }

    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}
