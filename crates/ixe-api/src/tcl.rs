//! Word quoting for rendered command lines.
//!
//! Arguments such as file paths may contain whitespace or characters with
//! special meaning to the command interpreter. [`tclquote`] turns any such
//! argument into a single brace-quoted word.

use once_cell::sync::Lazy;
use regex::Regex;

/// Words made only of these characters are passed through unquoted.
static BAREWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:/@+,=-]+$").expect("Invalid regex pattern"));

/// Characters that must be escaped inside a braced word.
static BRACE_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{}\\])").expect("Invalid regex pattern"));

/// Quotes a word for use in a command line.
///
/// # Example
///
/// ```
/// use ixe_api::tclquote;
///
/// assert_eq!(tclquote("force"), "force");
/// assert_eq!(tclquote("C:/cfg/my port.prt"), "{C:/cfg/my port.prt}");
/// assert_eq!(tclquote(""), "{}");
/// ```
pub fn tclquote(s: &str) -> String {
    if BAREWORD_RE.is_match(s) {
        s.to_string()
    } else {
        let escaped = BRACE_ESCAPE_RE.replace_all(s, r"\$1");
        format!("{{{}}}", escaped)
    }
}
