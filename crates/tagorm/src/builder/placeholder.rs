//! `?` to `$n` placeholder rewriting.

/// Anonymous placeholder accepted in caller-authored fragments.
pub const ANONYMOUS: char = '?';

/// Rewrite every `?` in `fragment`, left to right, to `$start`, `$start+1`, ...
///
/// For example, with `start = 3`: `a = ? AND b = ?` becomes `a = $3 AND b = $4`.
/// Every occurrence is rewritten, including ones inside string literals.
pub fn renumber(fragment: &str, start: usize) -> String {
    let mut result = String::with_capacity(fragment.len() + 4);
    let mut next = start;
    for ch in fragment.chars() {
        if ch == ANONYMOUS {
            result.push('$');
            result.push_str(&next.to_string());
            next += 1;
        } else {
            result.push(ch);
        }
    }
    result
}

/// Number of anonymous placeholders in `fragment`.
pub fn count(fragment: &str) -> usize {
    fragment.matches(ANONYMOUS).count()
}
