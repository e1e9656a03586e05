use chrono::{DateTime, Utc};

/// Short "how long ago" label for a tweet or comment timestamp
pub fn relative_time(timestamp: DateTime<Utc>) -> String {
    relative_time_from(timestamp, Utc::now())
}

pub fn relative_time_from(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - timestamp).num_minutes();
    if minutes < 1 {
        // Also covers clock skew (timestamps slightly in the future)
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else if minutes < 1440 * 7 {
        format!("{}d", minutes / 1440)
    } else {
        timestamp.format("%b %-d, %Y").to_string()
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
