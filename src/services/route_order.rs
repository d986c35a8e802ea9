//! Deterministic route ordering.
//!
//! Routes group into priority buckets parsed from the public line code:
//! numeric codes bucket by hundreds range, night lines (trailing "M")
//! sort after all numeric buckets, zonal lines (leading "Z") after
//! those, and anything unparseable sorts absolute last. Within a bucket
//! the order is a natural, numeric-aware string comparison. Listing and
//! search views rely on this order being stable.

use std::cmp::Ordering;

use crate::providers::gtfs::Route;

/// Suffix marking night-service lines (e.g. "900M").
const NIGHT_SUFFIX: char = 'M';
/// Prefix marking zonal-service lines (e.g. "Z4").
const ZONAL_PREFIX: char = 'Z';

fn priority(short_name: &str) -> u8 {
    if short_name.ends_with(NIGHT_SUFFIX) {
        return 10;
    }
    if short_name.starts_with(ZONAL_PREFIX) {
        return 11;
    }
    match short_name.parse::<u32>() {
        Ok(n) if n < 200 => 0,
        Ok(n) if n < 300 => 1,
        Ok(n) if n < 400 => 2,
        Ok(n) if n < 500 => 3,
        Ok(n) if n < 600 => 4,
        Ok(n) if n < 700 => 5,
        Ok(n) if n < 800 => 6,
        Ok(n) if n < 900 => 7,
        Ok(n) if n < 1000 => 8,
        Ok(_) => 9,
        Err(_) => 12,
    }
}

/// Natural string comparison: digit runs compare as numbers, everything
/// else case-insensitively.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut a_chars);
                    let nb = take_number(&mut b_chars);
                    match na.cmp(&nb) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                let la = ca.to_ascii_lowercase();
                let lb = cb.to_ascii_lowercase();
                match la.cmp(&lb) {
                    Ordering::Equal => {
                        a_chars.next();
                        b_chars.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = chars.peek() {
        let Some(digit) = c.to_digit(10) else { break };
        value = value.saturating_mul(10).saturating_add(digit as u64);
        chars.next();
    }
    value
}

/// Total order over routes: bucket priority first, then natural
/// comparison of the short name.
pub fn compare_routes(a: &Route, b: &Route) -> Ordering {
    priority(&a.short_name)
        .cmp(&priority(&b.short_name))
        .then_with(|| natural_cmp(&a.short_name, &b.short_name))
}

/// Stable in-place sort by [`compare_routes`].
pub fn sort_routes(routes: &mut [Route]) {
    routes.sort_by(compare_routes);
}
