//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Normalize a SQL string for the offline fallback comparison:
/// lowercase, collapse runs of whitespace, strip a trailing semicolon.
/// Only used when no oracle is configured; the oracle itself judges
/// semantics, not spelling.
pub fn normalize_sql(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut last_was_space = true;
  for ch in s.trim().chars() {
    if ch.is_whitespace() {
      if !last_was_space {
        out.push(' ');
        last_was_space = true;
      }
    } else {
      out.extend(ch.to_lowercase());
      last_was_space = false;
    }
  }
  let trimmed = out.trim_end().trim_end_matches(';').trim_end();
  trimmed.to_string()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    let mut end = max;
    while !s.is_char_boundary(end) {
      end -= 1;
    }
    format!("{}… ({} bytes total)", &s[..end], s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_occurrences() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn normalize_sql_ignores_case_spacing_and_semicolon() {
    let a = normalize_sql("SELECT  *\nFROM employees;");
    let b = normalize_sql("select * from employees");
    assert_eq!(a, b);
  }
}
