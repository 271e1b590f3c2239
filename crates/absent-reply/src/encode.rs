//! Header value encoding: RFC 2047 encoded words and RFC 5322 quoting.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Raw bytes of input per encoded word. Base64 of 45 bytes is 60 characters,
/// which keeps each `=?UTF-8?B?...?=` word under the 75-character limit.
const WORD_INPUT_BYTES: usize = 45;

/// Collapse any line breaks or other control characters to single spaces so
/// a value cannot inject header lines.
pub fn sanitize(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  let mut in_gap = false;
  for c in value.chars() {
    if c.is_control() {
      if !in_gap {
        out.push(' ');
      }
      in_gap = true;
    } else {
      out.push(c);
      in_gap = false;
    }
  }
  out.trim().to_owned()
}

/// Encode `text` as a sequence of RFC 2047 `B` encoded words when it contains
/// anything outside printable ASCII; return it unchanged otherwise.
pub fn encode_word(text: &str) -> String {
  if text.is_ascii() {
    return text.to_owned();
  }

  let mut words = Vec::new();
  let mut chunk = String::new();
  for c in text.chars() {
    if chunk.len() + c.len_utf8() > WORD_INPUT_BYTES {
      words.push(b_word(&chunk));
      chunk.clear();
    }
    chunk.push(c);
  }
  if !chunk.is_empty() {
    words.push(b_word(&chunk));
  }
  words.join(" ")
}

fn b_word(chunk: &str) -> String { format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk)) }

/// Render a display name for a `From` header: a quoted string for ASCII
/// names, encoded words otherwise.
pub fn display_name(name: &str) -> String {
  if !name.is_ascii() {
    return encode_word(name);
  }

  let mut quoted = String::with_capacity(name.len() + 2);
  quoted.push('"');
  for c in name.chars() {
    if c == '"' || c == '\\' {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('"');
  quoted
}
