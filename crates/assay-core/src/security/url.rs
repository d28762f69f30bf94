//! URL normalizer
//!
//! Pure function from a raw link destination to a normalized string and an
//! `allowed` flag. Collectors drop anything that is not allowed; an unsafe
//! URL never reaches aggregated output.

use serde::Serialize;
use url::Url;

/// Schemes that execute code, embed content or reach local resources
pub const DANGEROUS_SCHEMES: &[&str] = &[
    "javascript",
    "vbscript",
    "livescript",
    "data",
    "file",
    "blob",
    "filesystem",
    "jar",
    "view-source",
    "about",
    "chrome",
    "ms-its",
    "mhtml",
];

/// Schemes a link may use
pub const PERMITTED_SCHEMES: &[&str] = &["http", "https", "mailto", "ftp", "tel"];

/// Outcome of [`normalize_url`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedUrl {
    pub url: Option<String>,
    pub allowed: bool,
}

impl NormalizedUrl {
    fn rejected() -> Self {
        Self {
            url: None,
            allowed: false,
        }
    }

    fn allowed(url: String) -> Self {
        Self {
            url: Some(url),
            allowed: true,
        }
    }

    fn disallowed(url: String) -> Self {
        Self {
            url: Some(url),
            allowed: false,
        }
    }

    /// The normalized URL, only if it may be stored
    pub fn into_allowed(self) -> Option<String> {
        if self.allowed {
            self.url
        } else {
            None
        }
    }
}

/// Normalize and classify a link destination.
///
/// Scheme-less references (`page.md`, `/docs`, `#anchor`, `?q=1`) resolve
/// against the document's own origin and are allowed.
pub fn normalize_url(raw: &str) -> NormalizedUrl {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NormalizedUrl::rejected();
    }
    if trimmed.chars().any(is_hostile_char) {
        return NormalizedUrl::rejected();
    }
    if is_protocol_relative(trimmed) {
        return NormalizedUrl::rejected();
    }

    let Some((scheme, rest)) = split_scheme(trimmed) else {
        return normalize_relative(trimmed);
    };

    let scheme = scheme.to_ascii_lowercase();
    if DANGEROUS_SCHEMES.contains(&scheme.as_str()) {
        return NormalizedUrl::rejected();
    }
    if !PERMITTED_SCHEMES.contains(&scheme.as_str()) {
        let lowered = format!("{scheme}:{rest}");
        return NormalizedUrl::disallowed(normalize_percent_encoding(&lowered));
    }

    // Lowercases scheme and host and converts internationalized hosts to
    // their ASCII (punycode) form.
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.scheme() == scheme => {
            NormalizedUrl::allowed(normalize_percent_encoding(parsed.as_str()))
        }
        _ => NormalizedUrl::rejected(),
    }
}

/// Control characters plus invisible formatting characters used to disguise
/// schemes and hosts
fn is_hostile_char(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2069}' | '\u{FEFF}'
        )
}

/// `//host`, and the backslash spellings browsers treat the same way
fn is_protocol_relative(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('/' | '\\'), Some('/' | '\\'))
    )
}

/// RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"
fn split_scheme(s: &str) -> Option<(&str, &str)> {
    let colon = s.find(':')?;
    let scheme = &s[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some((scheme, &s[colon + 1..]))
}

/// A relative reference may not carry `:` in its first segment, and must not
/// gain a scheme once its escapes are decoded (`%6Aavascript:`).
fn normalize_relative(reference: &str) -> NormalizedUrl {
    let first_segment = reference.split(['/', '?', '#']).next().unwrap_or_default();
    if first_segment.contains(':') {
        return NormalizedUrl::rejected();
    }
    let normalized = normalize_percent_encoding(reference);
    if split_scheme(&normalized).is_some() || is_protocol_relative(&normalized) {
        return NormalizedUrl::rejected();
    }
    NormalizedUrl::allowed(normalized)
}

/// RFC 3986 reserved characters
fn is_delimiter(c: char) -> bool {
    matches!(
        c,
        ':' | '/' | '?' | '#' | '[' | ']' | '@' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+'
            | ',' | ';' | '='
    )
}

/// Re-encode each component between literal delimiters.
///
/// Escaped unreserved characters are decoded, every other escape comes out
/// uppercase, stray `%` signs become `%25` and non-ASCII text is escaped as
/// UTF-8. Delimiters written literally in the input stay literal, and
/// escaped ones stay escaped.
pub fn normalize_percent_encoding(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut start = 0;
    for (at, delimiter) in input.match_indices(is_delimiter) {
        push_component(&mut out, &input[start..at]);
        out.push_str(delimiter);
        start = at + delimiter.len();
    }
    push_component(&mut out, &input[start..]);
    out
}

fn push_component(out: &mut String, component: &str) {
    if component.is_empty() {
        return;
    }
    let decoded = urlencoding::decode_binary(component.as_bytes());
    out.push_str(&urlencoding::encode_binary(&decoded));
}
