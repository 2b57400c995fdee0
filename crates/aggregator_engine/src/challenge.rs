//! Recognizes anti-bot interstitials and rate-limit answers.

/// Statuses that the remote uses for bot checks and throttling.
pub const CHALLENGE_STATUSES: &[u16] = &[403, 429, 503];

/// Lowercase fragments found in challenge pages.
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "/cdn-cgi/challenge-platform/",
    "cf_chl_opt",
    "cf-turnstile",
    "<title>just a moment...</title>",
    "attention required! | cloudflare",
    "checking your browser before accessing",
    "verify you are human",
    "ddos-guard",
];

pub fn is_challenge_status(status: u16) -> bool {
    CHALLENGE_STATUSES.contains(&status)
}

pub fn has_challenge_marker(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    CHALLENGE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// A response is a challenge when its status is one of the bot-check
/// statuses or its body carries a known marker, even on a 200.
pub fn is_challenge(status: u16, body: Option<&str>) -> bool {
    is_challenge_status(status) || body.is_some_and(has_challenge_marker)
}
