//! Extraction of one JSON value from free-form completion text.
//!
//! Completions often wrap their JSON in prose or code fences, so the parser
//! looks for the first *balanced* construct of the wanted kind rather than
//! parsing the text as a whole. Brackets inside string literals are ignored.

use checker_core::{Error, Result};
use serde_json::Value;

/// The kind of top-level JSON construct to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  Object,
  Array,
}

impl Kind {
  fn opener(self) -> u8 {
    match self {
      Self::Object => b'{',
      Self::Array => b'[',
    }
  }

  fn name(self) -> &'static str {
    match self {
      Self::Object => "object",
      Self::Array => "array",
    }
  }
}

/// Return the first balanced JSON value of `kind` found in `text`.
///
/// A candidate whose brackets balance but which is not valid JSON is skipped
/// and the search resumes at the next opener.
pub fn extract(text: &str, kind: Kind) -> Result<Value> {
  let bytes = text.as_bytes();
  let opener = kind.opener();

  for start in 0..bytes.len() {
    if bytes[start] != opener {
      continue;
    }
    let Some(end) = balanced_end(bytes, start) else {
      continue;
    };
    if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
      return Ok(value);
    }
  }

  Err(Error::Parse(format!(
    "no balanced JSON {} in completion",
    kind.name()
  )))
}

/// Index of the bracket that closes the one at `start`, or `None` if the
/// brackets never balance or close in the wrong order.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
  let mut stack: Vec<u8> = Vec::new();
  let mut in_string = false;
  let mut escaped = false;

  for (i, &b) in bytes.iter().enumerate().skip(start) {
    if in_string {
      match b {
        _ if escaped => escaped = false,
        b'\\' => escaped = true,
        b'"' => in_string = false,
        _ => {}
      }
      continue;
    }

    match b {
      b'"' => in_string = true,
      b'{' => stack.push(b'}'),
      b'[' => stack.push(b']'),
      b'}' | b']' => {
        if stack.pop() != Some(b) {
          return None;
        }
        if stack.is_empty() {
          return Some(i);
        }
      }
      _ => {}
    }
  }
  None
}
