//! Ant-style patterns compiled to regular expressions
//!
//! Supported syntax, with `sep` being `/` for paths and `.` for hosts:
//! - `?` one character within a segment
//! - `*` zero or more characters within a segment
//! - `**` zero or more whole segments
//! - `{name}` one non-empty segment, `{name:regex}` a segment matching `regex`

use regex::Regex;
use waypoint_core::{GatewayError, Result};

#[derive(Debug, Clone)]
pub struct AntPattern {
    source: String,
    regex: Regex,
}

impl AntPattern {
    /// Compile `pattern` using `separator` between segments
    pub fn compile(pattern: &str, separator: char, case_insensitive: bool) -> Result<Self> {
        let sep = regex::escape(&separator.to_string());
        let segment = format!("[^{}]", sep);
        let mut out = String::from(if case_insensitive { "(?i)^" } else { "^" });
        let chars: Vec<char> = pattern.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let at_segment_start = i == 0 || chars[i - 1] == separator;
            let double_star = c == '*' && chars.get(i + 1) == Some(&'*');
            let segment_end = |at: usize| at >= chars.len() || chars[at] == separator;

            if double_star && at_segment_start && segment_end(i + 2) {
                if i > 0 && i + 2 >= chars.len() {
                    // trailing "sep**": the separator was already emitted
                    out.truncate(out.len() - sep.len());
                    out.push_str(&format!("(?:{}.*)?", sep));
                    i += 2;
                } else if i + 2 < chars.len() {
                    // "**sep": any number of leading segments
                    out.push_str(&format!("(?:.*{})?", sep));
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }

            match c {
                '*' => out.push_str(&format!("{}*", segment)),
                '?' => out.push_str(&segment),
                '{' => {
                    let close = chars[i..]
                        .iter()
                        .position(|&ch| ch == '}')
                        .map(|offset| i + offset)
                        .ok_or_else(|| {
                            GatewayError::Internal(format!("unclosed '{{' in pattern '{}'", pattern))
                        })?;
                    let body: String = chars[i + 1..close].iter().collect();
                    match body.split_once(':') {
                        Some((_, constraint)) => out.push_str(&format!("(?:{})", constraint)),
                        None => out.push_str(&format!("{}+", segment)),
                    }
                    i = close + 1;
                    continue;
                }
                other => out.push_str(&regex::escape(&other.to_string())),
            }
            i += 1;
        }
        out.push('$');

        let regex = Regex::new(&out).map_err(|e| {
            GatewayError::Internal(format!("invalid pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}
