//! Friendly-message lookup for raw failure text
//!
//! Raw error strings from probers and the OS are terse and inconsistent
//! across platforms. This table maps well-known fragments to short
//! human-readable messages for display; unmapped text is shown raw.

/// Substring patterns and their friendly renderings, checked in order.
///
/// First match wins, so more specific fragments must precede generic ones.
const FRIENDLY_PATTERNS: &[(&str, &str)] = &[
    ("ECONNREFUSED", "Connection refused by server"),
    ("ENETUNREACH", "Network unreachable"),
    ("EHOSTUNREACH", "Host unreachable"),
    ("ECONNRESET", "Connection reset by server"),
    ("connection reset", "Connection reset by server"),
    ("ETIMEDOUT", "Connection timed out"),
    ("timed out", "Connection timed out"),
    ("certificate", "TLS certificate verification failed"),
    ("handshake", "TLS handshake failed"),
    ("dns error", "DNS lookup failed"),
    ("failed to lookup", "DNS lookup failed"),
    ("no route to host", "Host unreachable"),
    ("broken pipe", "Connection closed by server"),
];

/// Look up a friendly message for raw failure detail.
///
/// Returns `None` when no pattern matches; callers then render the raw
/// detail unchanged.
pub fn friendly_message(raw: &str) -> Option<&'static str> {
    let lowered = raw.to_lowercase();
    FRIENDLY_PATTERNS.iter().find_map(|(pattern, message)| {
        // errno names are uppercase in raw text, table lookup is
        // case-insensitive either way
        if raw.contains(pattern) || lowered.contains(&pattern.to_lowercase()) {
            Some(*message)
        } else {
            None
        }
    })
}
