//! Repairs PEM blocks whose line breaks were flattened into spaces
//! (what a single-line credential field does to a pasted key).

use std::borrow::Cow;

use regex::{Captures, Regex};

lazy_static! {
    // One PEM block: header, body, footer. The label is uppercase letters and spaces.
    static ref PEM_BLOCK_RE: Regex =
        Regex::new(r"(?s)(-----BEGIN [A-Z ]+-----)(.*?)(-----END [A-Z ]+-----)").unwrap();

    static ref SPACES_RE: Regex = Regex::new(r" +").unwrap();
}

/// Rewrite every PEM block in `text` so that runs of spaces inside its body
/// become single newlines. Header and footer lines are kept as they are and
/// text outside of any block is untouched.
///
/// The output body never contains spaces, so applying this twice is the same
/// as applying it once.
pub fn normalize(text: &str) -> Cow<'_, str> {
    PEM_BLOCK_RE.replace_all(text, |caps: &Captures| {
        format!(
            "{}{}{}",
            &caps[1],
            SPACES_RE.replace_all(&caps[2], "\n"),
            &caps[3]
        )
    })
}

/// `normalize` for optional credential fields.
pub fn normalize_opt(text: Option<&str>) -> Option<String> {
    text.map(|t| normalize(t).into_owned())
}
