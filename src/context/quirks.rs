//! Quirk extraction from the inbound request.
//!
//! Quirks are ad-hoc signal values supplied out-of-band. They come from two
//! sources, merged with a fixed precedence:
//!
//! 1. remotely fetched profile traits (lowest precedence), keys normalized
//!    by stripping underscores, values stringified;
//! 2. `x-quirk-*` request headers (highest precedence), the suffix after the
//!    prefix naming the signal.
//!
//! The session cookie additionally carries two opaque round-trip tokens
//! (`ufvd=` and `ufvdqk=` segments) encoding prior visitor state. They are
//! extracted here and passed to the decision engine unopened.
//!
//! Pure string processing throughout; nothing here can fail.

use std::collections::HashMap;

use axum::http::HeaderMap;
use serde_json::Value;

/// Header prefix contributing a quirk; the suffix is the signal name.
pub const QUIRK_HEADER_PREFIX: &str = "x-quirk-";
/// Cookie segment prefix of the visitor session token.
pub const SESSION_COOKIE_PREFIX: &str = "ufvd=";
/// Cookie segment prefix of the accumulated quirk token.
pub const QUIRK_COOKIE_PREFIX: &str = "ufvdqk=";

/// Signal name → string value.
pub type Quirks = HashMap<String, String>;

/// Opaque prior-visitor tokens round-tripped through the session cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    /// Prior transition/session state, engine-defined format.
    pub session: Option<String>,
    /// Prior accumulated quirk state, engine-defined format.
    pub quirk: Option<String>,
}

/// Extract quirks from `x-quirk-*` request headers.
///
/// The first value of each matching header wins; everything else is ignored.
pub fn quirks_from_headers(headers: &HeaderMap) -> Quirks {
    let mut quirks = Quirks::new();
    for (name, value) in headers {
        let name = name.as_str();
        if let Some(signal) = name.strip_prefix(QUIRK_HEADER_PREFIX) {
            if let Ok(value) = value.to_str() {
                quirks
                    .entry(signal.to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }
    quirks
}

/// Convert a profile trait mapping into quirks.
///
/// Keys are normalized by stripping underscores; values are stringified.
pub fn quirks_from_traits(traits: &HashMap<String, Value>) -> Quirks {
    traits
        .iter()
        .map(|(key, value)| {
            let normalized = key.replace('_', "");
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (normalized, value)
        })
        .collect()
}

/// Merge quirk maps; later maps overwrite earlier keys.
pub fn merge_quirks(layers: impl IntoIterator<Item = Quirks>) -> Quirks {
    let mut merged = Quirks::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

/// Extract session/quirk tokens from a `Cookie` header value.
///
/// The cookie string is split on `;`, each segment trimmed; absence of
/// either token is not an error — the state is simply empty.
pub fn session_tokens_from_cookie(cookie: &str) -> SessionTokens {
    let mut tokens = SessionTokens::default();
    for segment in cookie.split(';') {
        let segment = segment.trim();
        if let Some(rest) = segment.strip_prefix(QUIRK_COOKIE_PREFIX) {
            tokens.quirk.get_or_insert_with(|| rest.to_string());
        } else if let Some(rest) = segment.strip_prefix(SESSION_COOKIE_PREFIX) {
            tokens.session.get_or_insert_with(|| rest.to_string());
        }
    }
    tokens
}
