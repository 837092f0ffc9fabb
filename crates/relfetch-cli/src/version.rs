//! Loose version parsing for command-line input.

use relfetch_core::VersionSelector;
use semver::{Version, VersionReq};

/// Pull the first `major[.minor[.patch]]` out of `input`, filling missing
/// parts with zero: `1.2` -> `1.2.0`, `v3` -> `3.0.0`, `deno 1.40.5-rc` ->
/// `1.40.5`.
pub fn coerce(input: &str) -> Option<Version> {
    let start = input.find(|c: char| c.is_ascii_digit())?;
    let mut parts = [0u64; 3];
    let mut rest = &input[start..];

    for (i, part) in parts.iter_mut().enumerate() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            if i == 0 {
                return None;
            }
            break;
        }
        *part = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        match rest.strip_prefix('.') {
            Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
            _ => break,
        }
    }

    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// Turn the optional VERSION argument into a release selector.
///
/// No input or `latest` selects the latest release. Anything else must
/// coerce to a version and selects the tag `v<version>`.
pub fn selector_for(input: Option<&str>) -> Option<VersionSelector> {
    match input.map(str::trim) {
        None | Some("") => Some(VersionSelector::Latest),
        Some(s) if s.eq_ignore_ascii_case("latest") => Some(VersionSelector::Latest),
        Some(s) => coerce(s).map(|v| VersionSelector::tag(format!("v{}", v))),
    }
}

/// Pin an operator-less version so it means that version only, not a caret
/// range: `1.2.0` matches just 1.2.0, `1.2` matches 1.2.x and `1` matches
/// 1.x. A leading `v` is dropped. Other input is returned unchanged.
fn pin_bare_version(input: &str) -> String {
    let bare = input.strip_prefix('v').unwrap_or(input);
    let core = bare.split(['-', '+']).next().unwrap_or_default();
    let parts: Vec<&str> = core.split('.').collect();
    let numeric = parts.len() <= 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));

    if numeric {
        format!("={}", bare)
    } else {
        input.to_string()
    }
}

/// Parse a range for `--list-releases`, falling back to `*` when the input
/// is missing or not a valid range.
pub fn range_for(input: Option<&str>) -> VersionReq {
    input
        .map(|s| pin_bare_version(s.trim()))
        .and_then(|s| VersionReq::parse(&s).ok())
        .unwrap_or(VersionReq::STAR)
}
