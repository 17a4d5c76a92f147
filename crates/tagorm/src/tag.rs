//! Field tag parsing.
//!
//! A tag value has the form `name[,option1,option2,...]`. The name selects the
//! column a field persists to; the options are an unordered set that callers
//! consult with [`TagOptions::contains`].

use std::collections::BTreeSet;

/// Tag name that excludes a field from persistence.
pub const EXCLUDED: &str = "-";

/// Punctuation allowed in a tag name besides letters and digits.
const TAG_PUNCTUATION: &str = "!#$%&()*+-./:<=>?@[]^_{|}~ ";

/// The option set that follows the name in a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagOptions(BTreeSet<String>);

impl TagOptions {
    /// Whether `option` was listed in the tag.
    pub fn contains(&self, option: &str) -> bool {
        !option.is_empty() && self.0.contains(option)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Split a raw tag into its name and option set.
///
/// ```ignore
/// let (name, opts) = parse_tag("game_id,pk");
/// assert_eq!(name, "game_id");
/// assert!(opts.contains("pk"));
/// ```
pub fn parse_tag(raw: &str) -> (&str, TagOptions) {
    let mut segments = raw.split(',');
    let name = segments.next().unwrap_or_default();
    let options = segments
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (name, TagOptions(options))
}

/// Whether `name` is usable as a column name.
///
/// Backslash and quote characters are reserved; any other character must be a
/// letter, a digit, or one of the allowed punctuation marks.
pub fn is_valid_tag(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.chars()
        .all(|c| TAG_PUNCTUATION.contains(c) || c.is_alphabetic() || c.is_numeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_options() {
        let (name, opts) = parse_tag("field,foobar,foo");
        assert_eq!(name, "field");
        for (opt, want) in [("foobar", true), ("foo", true), ("bar", false)] {
            assert_eq!(opts.contains(opt), want, "contains({opt:?})");
        }
    }

    #[test]
    fn name_only_has_no_options() {
        let (name, opts) = parse_tag("game_code");
        assert_eq!(name, "game_code");
        assert!(opts.is_empty());
        assert!(!opts.contains(""));
    }

    #[test]
    fn leading_comma_leaves_empty_name() {
        let (name, opts) = parse_tag(",omitempty");
        assert_eq!(name, "");
        assert!(opts.contains("omitempty"));
    }

    #[test]
    fn validates_tag_names() {
        assert!(is_valid_tag("game_id"));
        assert!(is_valid_tag("ABC-123 x.y"));
        assert!(is_valid_tag("série"));
        assert!(is_valid_tag(EXCLUDED));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag("bad\"quote"));
        assert!(!is_valid_tag("back\\slash"));
        assert!(!is_valid_tag("it's"));
    }
}
