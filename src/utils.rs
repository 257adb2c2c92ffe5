/// ULPs of rounding error tolerated before bumping to the next cent.
const CENT_ULPS: f64 = 64.0;

/// Round an amount up to the next whole cent.
///
/// Sums like `0.1 + 0.2` land a few ULPs above a whole cent; those stay on
/// that cent instead of being billed one cent higher. Anything further above
/// a cent than accumulated rounding error is billed as the next cent.
pub fn round_up_to_cent(amount: f64) -> f64 {
    let cents = amount * 100.0;
    let nearest = cents.round();
    let tolerance = CENT_ULPS * f64::EPSILON * nearest.abs().max(1.0);
    if (cents - nearest).abs() <= tolerance {
        nearest / 100.0
    } else {
        cents.ceil() / 100.0
    }
}

pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub fn format_hours(hours: f64) -> String {
    format_duration((hours * 3600.0).round().max(0.0) as u64)
}
