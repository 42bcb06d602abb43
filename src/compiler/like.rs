//! Translation of filter LIKE patterns to SQL LIKE patterns

use crate::filter::LikeOptions;

/// Escape character used in emitted SQL patterns
pub const SQL_ESCAPE: char = '\\';

/// A pattern in SQL LIKE syntax
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlPattern {
    pub text: String,
    /// True if the pattern contains escapes and needs an `ESCAPE` clause
    pub escaped: bool,
}

/// Rewrites `pattern` from the filter's wildcard characters into `%`/`_`.
///
/// Characters that are special in SQL but literal in the filter pattern are
/// escaped with `\`. Case folding is left to the dialect, which must fold
/// pattern and column alike.
pub fn translate(pattern: &str, options: &LikeOptions) -> SqlPattern {
    let mut text = String::with_capacity(pattern.len() + 4);
    let mut escaped = false;
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        if c == options.escape_char {
            // a trailing escape character stands for itself
            let literal = chars.next().unwrap_or(c);
            push_literal(&mut text, literal, &mut escaped);
        } else if c == options.wild_card {
            text.push('%');
        } else if c == options.single_char {
            text.push('_');
        } else {
            push_literal(&mut text, c, &mut escaped);
        }
    }

    SqlPattern { text, escaped }
}

fn push_literal(text: &mut String, c: char, escaped: &mut bool) {
    if c == '%' || c == '_' || c == SQL_ESCAPE {
        text.push(SQL_ESCAPE);
        *escaped = true;
    }
    text.push(c);
}
