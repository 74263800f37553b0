//! Deterministic error fingerprinting.
//!
//! The fingerprint keys duplicate suppression: identical errors must hash
//! identically across captures (and across builds, hence the line-number
//! normalization), while different messages or call sites must diverge.

use serde_json::Value;

use crate::config::{FINGERPRINT_MESSAGE_LENGTH, FINGERPRINT_STACK_FRAMES};
use crate::report::{parse_frames, CapturedError};

/// Builds the 32-character fingerprint for a captured error.
///
/// Folds together a normalized stack signature (the first few meaningful
/// frames with line/column numbers blanked), the truncated message, the
/// type name, and any caller-supplied data, then renders four 32-bit
/// rolling hashes as fixed-width hex.
pub fn create_fingerprint(error: &CapturedError, additional_data: Option<&Value>) -> String {
    let signature = error
        .stack
        .as_deref()
        .map(stack_signature)
        .unwrap_or_default();

    let message: String = error
        .message
        .chars()
        .take(FINGERPRINT_MESSAGE_LENGTH)
        .collect();

    let extra = additional_data
        .map(|v| v.to_string())
        .unwrap_or_default();

    let combined = format!("{}|{}|{}|{}", signature, message, error.type_name, extra);

    format!(
        "{:08x}{:08x}{:08x}{:08x}",
        rolling_hash(&signature),
        rolling_hash(&message),
        rolling_hash(&error.type_name),
        rolling_hash(&combined)
    )
}

/// Normalized signature of the first meaningful stack frames.
fn stack_signature(stack: &str) -> String {
    parse_frames(stack)
        .iter()
        .filter(|f| f.is_meaningful())
        .take(FINGERPRINT_STACK_FRAMES)
        .map(|f| f.normalized())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 32-bit rolling hash (djb2 variant); wrapping arithmetic keeps it
/// deterministic across platforms.
fn rolling_hash(input: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in input.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u32::from(byte));
    }
    hash
}
