// Cache key construction
// Author: kelexine (https://github.com/kelexine)

use sha2::{Digest, Sha256};

/// Raw keys longer than this (in bytes) are replaced by their SHA-256 digest.
pub const MAX_RAW_KEY_LEN: usize = 512;

/// Build the cache key for one model call.
///
/// Fields are written in a fixed order, each as `name:<byte len>:<value>`,
/// so the encoding is injective: a separator inside a value can never be
/// mistaken for a field boundary. Raw keys over [`MAX_RAW_KEY_LEN`] bytes
/// collapse to a 64-char hex digest. Raw keys always begin with `m:`, which
/// a hex digest never does.
pub fn make_key(
    model_id: &str,
    prompt: &str,
    tools_signature: &str,
    mode: &str,
    version_tag: &str,
) -> String {
    let fields = [
        ("m", model_id),
        ("mode", mode),
        ("ver", version_tag),
        ("tools", tools_signature),
        ("p", prompt),
    ];

    let mut raw = String::with_capacity(
        fields.iter().map(|(n, v)| n.len() + v.len() + 8).sum(),
    );
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            raw.push('|');
        }
        raw.push_str(name);
        raw.push(':');
        raw.push_str(&value.len().to_string());
        raw.push(':');
        raw.push_str(value);
    }

    if raw.len() > MAX_RAW_KEY_LEN {
        return hex::encode(Sha256::digest(raw.as_bytes()));
    }
    raw
}
