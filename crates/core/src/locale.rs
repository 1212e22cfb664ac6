//! Locale fallback negotiation for the shell layer.
//!
//! The shell ships a fixed set of translations and has to map whatever
//! locale the host OS reports onto one of them. Rules: exact match wins,
//! otherwise the primary language subtag (`zh-CN` -> `zh`), otherwise
//! the default.

/// Pick the best available locale for a requested one.
pub fn best_match<'a>(requested: &str, available: &[&'a str], default: &'a str) -> &'a str {
    if let Some(exact) = available.iter().find(|code| **code == requested) {
        return exact;
    }

    let primary = requested
        .split(['-', '_'])
        .next()
        .unwrap_or(requested);
    if let Some(prefix) = available.iter().find(|code| **code == primary) {
        return prefix;
    }

    default
}
