//! Budget-overflow detection.
//!
//! One provider rejection is recovered automatically: a requested
//! generation budget that exceeds the model's remaining context. The
//! detector parses the provider's free-text rejection and computes a
//! safe replacement budget; the client retries at most once.

use std::sync::OnceLock;

use regex::Regex;

/// Safety margin subtracted from the remaining context window.
const BUDGET_MARGIN: u64 = 256;

/// Matches rejections shaped like:
/// `'max_tokens' is too large: 8000. ... maximum context length is
/// 32768 tokens and your request has 25060 input tokens ...`
///
/// Deliberately tailored to this one phrasing; rejections worded
/// differently surface as ordinary provider errors.
fn overflow_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?is)too large:\s*(\d+).*?maximum context length is\s*(\d+)\s*tokens.*?(\d+)\s*input tokens",
        )
        .expect("overflow pattern is valid")
    })
}

/// Parse a provider rejection message and compute the clamped budget.
///
/// Returns `None` when the message does not match or any captured
/// number fails to parse. With `remaining = context - input`: a
/// non-positive remainder clamps to zero (the retry guard then refuses
/// it), otherwise the margin is subtracted and the result floored at
/// one token.
pub(crate) fn clamped_budget(message: &str) -> Option<u32> {
    let caps = overflow_pattern().captures(message)?;
    let _asked: u64 = caps[1].parse().ok()?;
    let context: u64 = caps[2].parse().ok()?;
    let input: u64 = caps[3].parse().ok()?;

    if context == 0 {
        return None;
    }
    if input >= context {
        return Some(0);
    }

    let clamp = (context - input).saturating_sub(BUDGET_MARGIN).max(1);
    Some(u32::try_from(clamp).unwrap_or(u32::MAX))
}

/// Whether a failed attempt should be re-issued with `clamp`.
///
/// All conditions must hold: no retry has happened yet, a clamp was
/// computed and is positive, the current working budget is a known
/// positive value, and the clamp is strictly smaller than it. The
/// strict decrease is the infinite-loop guard.
pub(crate) fn should_retry(clamp: Option<u32>, budget: Option<u32>, retries: u32) -> bool {
    let (Some(clamp), Some(budget)) = (clamp, budget) else {
        return false;
    };
    retries == 0 && clamp > 0 && budget > 0 && clamp < budget
}
