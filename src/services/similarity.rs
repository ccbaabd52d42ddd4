//! User-Agent similarity scoring for click-to-install matching.
//!
//! Clicks arrive from the in-app browser, checkins from the installed app,
//! so the two User-Agent strings are never equal. Scoring is additive over
//! three independent signals; the sum is compared against the configured
//! minimum by the attribution matcher.

/// Both sides report the same Apple device family (iphone, or ipad).
const DEVICE_FAMILY_WEIGHT: f64 = 0.5;
/// Both sides report the same iOS major version.
const OS_MAJOR_WEIGHT: f64 = 0.3;
/// Shared trait: both mobile, or both Safari.
const SHARED_TRAIT_WEIGHT: f64 = 0.2;

pub fn user_agent_similarity(ua1: &str, ua2: &str) -> f64 {
    let a = ua1.to_lowercase();
    let b = ua2.to_lowercase();

    let mut score = 0.0;

    if a.contains("iphone") && b.contains("iphone") {
        score += DEVICE_FAMILY_WEIGHT;
    } else if a.contains("ipad") && b.contains("ipad") {
        score += DEVICE_FAMILY_WEIGHT;
    }

    if let (Some(major_a), Some(major_b)) = (os_major(&a), os_major(&b)) {
        if major_a == major_b {
            score += OS_MAJOR_WEIGHT;
        }
    }

    if (a.contains("mobile") && b.contains("mobile"))
        || (a.contains("safari") && b.contains("safari"))
    {
        score += SHARED_TRAIT_WEIGHT;
    }

    score
}

/// Extracts the iOS major version from a lowercased User-Agent.
///
/// Looks for the `os <major>[._]<minor>` token that Apple UAs carry, e.g.
/// `OS 17_5` in "iPhone OS 17_5 like Mac OS X". Returns None when the token
/// is absent or malformed.
fn os_major(ua: &str) -> Option<u32> {
    for (idx, _) in ua.match_indices("os ") {
        let rest = &ua[idx + 3..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        let after = &rest[digits.len()..];
        let mut chars = after.chars();
        match (chars.next(), chars.next()) {
            (Some('.') | Some('_'), Some(c)) if c.is_ascii_digit() => {
                return digits.parse().ok();
            }
            _ => continue,
        }
    }
    None
}
