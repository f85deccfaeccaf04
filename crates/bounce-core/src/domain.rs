//! Domain canonicalization and stable hashing.
//!
//! Every domain that enters the system -- from a message payload, a stored
//! record, or an alarm name -- goes through [`normalize_domain`] first so
//! rule conditions and storage keys always agree on the same bare hostname.

/// Canonicalize an arbitrary domain-ish string into a bare hostname.
///
/// Trims whitespace, lowercases, strips a leading `http://` or `https://`
/// scheme, strips a leading `www.` label, and truncates at the first `/`.
/// Stripping runs to a fixpoint, so the function is idempotent for every
/// input: `normalize_domain(&normalize_domain(x)) == normalize_domain(x)`.
pub fn normalize_domain(value: &str) -> String {
    let mut current = value.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_once(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let rest = lowered
        .strip_prefix("http://")
        .or_else(|| lowered.strip_prefix("https://"))
        .unwrap_or(&lowered);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    rest.split('/').next().unwrap_or("").to_string()
}

/// Stable 32-bit signed hash over UTF-16 code units.
///
/// Polynomial accumulation (`h = h * 31 + unit`) with wrapping 32-bit signed
/// arithmetic. The exact function the allow-rule allocator relies on: a
/// domain's slot is computed the same way when the rule is installed and when
/// it is later freed, with no reverse index in between.
pub fn stable_hash(value: &str) -> i32 {
    let mut hash: i32 = 0;
    for unit in value.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    hash
}
