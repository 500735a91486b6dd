//! Word expansion for FROM expressions.
//!
//! Expands `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`,
//! `${VAR:+alternate}`, and `${VAR+alternate}` against an environment,
//! tracking which names resolved and which did not. Unresolved references
//! expand to the empty string, matching build-time behavior.

use std::collections::{BTreeMap, BTreeSet};

/// A flat name→value environment.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

/// The outcome of expanding one word.
#[derive(Debug, Clone, Default)]
pub struct ExpandResult {
    pub result: String,
    /// Names that resolved against the environment.
    pub matched: BTreeSet<String>,
    /// Names that were referenced but not present.
    pub unmatched: BTreeSet<String>,
}

/// Expands variable references in `word` against `env`. `escape` is the
/// Dockerfile escape character; an escaped `$` is literal.
pub fn expand_word(word: &str, env: &Env, escape: char) -> ExpandResult {
    let mut out = ExpandResult::default();
    let chars: Vec<char> = word.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == escape && i + 1 < chars.len() && chars[i + 1] == '$' {
            out.result.push('$');
            i += 2;
            continue;
        }
        if c != '$' {
            out.result.push(c);
            i += 1;
            continue;
        }

        // `$` at end of word is literal.
        if i + 1 >= chars.len() {
            out.result.push('$');
            break;
        }

        if chars[i + 1] == '{' {
            let close = match chars[i + 2..].iter().position(|&c| c == '}') {
                Some(p) => i + 2 + p,
                None => {
                    // Unterminated brace: emit literally.
                    out.result.push('$');
                    i += 1;
                    continue;
                }
            };
            let inner: String = chars[i + 2..close].iter().collect();
            expand_braced(&inner, env, &mut out);
            i = close + 1;
        } else if is_name_start(chars[i + 1]) {
            let mut end = i + 1;
            while end < chars.len() && is_name_char(chars[end]) {
                end += 1;
            }
            let name: String = chars[i + 1..end].iter().collect();
            match env.get(&name) {
                Some(v) => {
                    out.result.push_str(v);
                    out.matched.insert(name);
                }
                None => {
                    out.unmatched.insert(name);
                }
            }
            i = end;
        } else {
            out.result.push('$');
            i += 1;
        }
    }

    out
}

/// Handles the `${…}` forms, including `:-`, `-`, `:+`, `+` operators.
fn expand_braced(inner: &str, env: &Env, out: &mut ExpandResult) {
    let (name, op, operand) = split_braced(inner);

    if name.is_empty() || !name.chars().all(is_name_char) {
        // Not a plain parameter expansion; emit verbatim.
        out.result.push_str("${");
        out.result.push_str(inner);
        out.result.push('}');
        return;
    }

    let value = env.get(name);
    match op {
        None => match value {
            Some(v) => {
                out.result.push_str(v);
                out.matched.insert(name.to_string());
            }
            None => {
                out.unmatched.insert(name.to_string());
            }
        },
        Some(":-") => match value {
            Some(v) if !v.is_empty() => {
                out.result.push_str(v);
                out.matched.insert(name.to_string());
            }
            _ => {
                if value.is_some() {
                    out.matched.insert(name.to_string());
                } else {
                    out.unmatched.insert(name.to_string());
                }
                out.result.push_str(operand);
            }
        },
        Some("-") => match value {
            Some(v) => {
                out.result.push_str(v);
                out.matched.insert(name.to_string());
            }
            None => {
                out.unmatched.insert(name.to_string());
                out.result.push_str(operand);
            }
        },
        Some(":+") => match value {
            Some(v) if !v.is_empty() => {
                out.result.push_str(operand);
                out.matched.insert(name.to_string());
            }
            _ => {
                if value.is_some() {
                    out.matched.insert(name.to_string());
                } else {
                    out.unmatched.insert(name.to_string());
                }
            }
        },
        Some("+") => match value {
            Some(_) => {
                out.result.push_str(operand);
                out.matched.insert(name.to_string());
            }
            None => {
                out.unmatched.insert(name.to_string());
            }
        },
        _ => {
            out.result.push_str("${");
            out.result.push_str(inner);
            out.result.push('}');
        }
    }
}

fn split_braced(inner: &str) -> (&str, Option<&'static str>, &str) {
    for op in [":-", ":+"] {
        if let Some(pos) = inner.find(op) {
            return (&inner[..pos], Some(op), &inner[pos + 2..]);
        }
    }
    for (op, ch) in [("-", '-'), ("+", '+')] {
        if let Some(pos) = inner.find(ch) {
            return (&inner[..pos], Some(op), &inner[pos + 1..]);
        }
    }
    (inner, None, "")
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
