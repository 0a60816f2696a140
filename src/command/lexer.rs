use regex::Regex;
use std::sync::OnceLock;

// One token: runs of unquoted text and quoted strings with no whitespace between.
#[allow(clippy::unwrap_used)]
fn token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r#"^(?:[^\s'"]+|"[^"]*"|'[^']*')+"#).unwrap()
    })
}

#[allow(clippy::unwrap_used)]
fn piece() -> &'static Regex {
    static PIECE: OnceLock<Regex> = OnceLock::new();
    PIECE.get_or_init(|| {
        Regex::new(r#"[^\s'"]+|"([^"]*)"|'([^']*)'"#).unwrap()
    })
}

/// Splits a command line into shell-like tokens.
///
/// Single and double quoted substrings belong to the surrounding token and
/// lose their quotes. An unbalanced quote makes the whole line unparseable,
/// which yields no tokens at all.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut rest = line.trim_start();

    while !rest.is_empty() {
        let Some(matched) = token().find(rest) else {
            return vec![];
        };

        let text = piece()
            .captures_iter(matched.as_str())
            .map(|c| {
                c.get(1)
                    .or_else(|| c.get(2))
                    .or_else(|| c.get(0))
                    .map_or("", |m| m.as_str())
                    .to_owned()
            })
            .collect::<String>();

        tokens.push(text);
        rest = rest[matched.end()..].trim_start();
    }

    tokens
}
