//! Shared text helpers.

use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&[a-zA-Z]+;|&#\d+;").expect("valid entity regex"));

/// Remove HTML tags, replacing each with a space so adjacent block
/// elements do not merge their words.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    ENTITY_RE.replace_all(&without_tags, " ").into_owned()
}

/// Count words in chapter content (HTML tags do not count)
pub fn count_words(html: &str) -> usize {
    strip_html(html).split_whitespace().count()
}

/// Filter out errors from iterator results, logging them at debug level.
pub fn log_filter_error<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words_ignores_markup() {
        assert_eq!(count_words("<p>Hello world</p>"), 2);
        assert_eq!(count_words("<h1>Title</h1><p>One two&nbsp;three</p>"), 4);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_strip_html_separates_blocks() {
        let text = strip_html("<p>end</p><p>start</p>");
        assert_eq!(text.split_whitespace().collect::<Vec<_>>(), vec!["end", "start"]);
    }
}
