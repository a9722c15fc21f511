/// Helper utilities for turning command and procfs output into numbers

use regex::Regex;
use std::sync::OnceLock;

/// TCP state code for ESTABLISHED in /proc/net/tcp{,6}
const TCP_ESTABLISHED: &str = "01";

/// Parse a plain count such as the output of `wc -l`
pub fn parse_count(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

/// Parse a temperature reading such as `temp=45.2'C`
///
/// Everything except digits and the decimal point is dropped, then the value
/// is truncated toward zero.
pub fn parse_temperature(raw: &str) -> Option<u32> {
    static NON_NUMERIC_RE: OnceLock<Regex> = OnceLock::new();

    let non_numeric = NON_NUMERIC_RE.get_or_init(|| {
        Regex::new(r"[^0-9.]").unwrap()
    });

    let digits = non_numeric.replace_all(raw, "");
    let celsius = digits.parse::<f64>().ok()?;
    if !celsius.is_finite() {
        return None;
    }

    Some(celsius.trunc().max(0.0) as u32)
}

/// Parse a filesystem usage percentage such as ` 37%`
pub fn parse_usage(raw: &str) -> Option<u32> {
    raw.trim().trim_end_matches('%').trim().parse::<u32>().ok()
}

/// Count ESTABLISHED sockets bound locally to `port` in a /proc/net/tcp table
pub fn count_established(table: &str, port: u16) -> usize {
    table
        .lines()
        .skip(1) // header
        .filter(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return false;
            }

            let local_port = fields[1]
                .rsplit_once(':')
                .and_then(|(_, hex)| u16::from_str_radix(hex, 16).ok());

            local_port == Some(port) && fields[3] == TCP_ESTABLISHED
        })
        .count()
}

/// Percentage of a filesystem in use, computed the way `df` reports `pcent`
///
/// `used` is `blocks - bfree`; reserved blocks count neither as used nor as
/// available, and the result is rounded up.
pub fn df_usage_percent(blocks: u64, bfree: u64, bavail: u64) -> Option<u32> {
    let used = blocks.saturating_sub(bfree) as u128;
    let total = used + bavail as u128;
    if total == 0 {
        return None;
    }

    Some(((used * 100 + total - 1) / total) as u32)
}
