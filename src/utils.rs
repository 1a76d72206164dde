use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + Send + Sync + 'static>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: regex::Regex = regex::Regex::new($pattern).unwrap();
    }
  };
}

pub(crate) use regex_static;

/// True for tokens wrapped in matching double or single quotes, like `"n.01"` or `'now'`.
///
/// ```
/// use drsfix::utils::between_quotes;
///
/// assert!(between_quotes("\"n.01\""));
/// assert!(between_quotes("'speaker'"));
/// assert!(!between_quotes("x1"));
/// assert!(!between_quotes("\""));
/// ```
pub fn between_quotes(token: &str) -> bool {
  token.len() >= 2
    && ((token.starts_with('"') && token.ends_with('"'))
      || (token.starts_with('\'') && token.ends_with('\'')))
}

/// True if every character is an uppercase letter (`NOT`, `EQU`).
pub fn all_upper(token: &str) -> bool {
  !token.is_empty() && token.chars().all(char::is_uppercase)
}

/// True if every character is a lowercase letter (`work`, `male`).
pub fn all_lower(token: &str) -> bool {
  !token.is_empty() && token.chars().all(char::is_lowercase)
}

/// Roles start with an uppercase letter, contain at least one lowercase letter
/// after it, and are otherwise made of letters and dashes (`Agent`, `Co-Agent`).
pub fn is_role(token: &str) -> bool {
  regex_static!(ROLE, r"^\p{Lu}[\p{L}\-]*$");
  let mut chars = token.chars();
  match chars.next() {
    Some(_) => ROLE.is_match(token) && chars.any(char::is_lowercase),
    None => false,
  }
}

/// Removes an inline comment: everything from the first `%` token onwards.
pub fn strip_comment<S: AsRef<str>>(tokens: &[S]) -> &[S] {
  match tokens.iter().position(|t| t.as_ref() == "%") {
    Some(idx) => &tokens[..idx],
    None => tokens,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_token_shapes() {
    assert!(is_role("Agent"));
    assert!(is_role("Co-Agent"));
    assert!(!is_role("AGENT"));
    assert!(!is_role("agent"));
    assert!(!is_role("A"));

    assert!(all_upper("NOT"));
    assert!(!all_upper("Not"));
    assert!(all_lower("work"));
    assert!(!all_lower("semi-final"));
  }

  #[test]
  fn test_strip_comment() {
    let tokens = ["b1", "REF", "x1", "%", "the", "man"];
    assert_eq!(strip_comment(&tokens), &["b1", "REF", "x1"]);
    assert_eq!(strip_comment(&tokens[..3]), &["b1", "REF", "x1"]);
  }
}
