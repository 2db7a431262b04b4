//! Status code specs: `502`, `BAD_GATEWAY`, `5xx` or `SERVER_ERROR`

use http::StatusCode;
use std::str::FromStr;

/// One configured status or status class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMatcher {
    Exact(StatusCode),
    /// Hundreds digit of the class, e.g. `5` for `5xx`
    Series(u16),
}

impl StatusMatcher {
    pub fn matches(&self, status: StatusCode) -> bool {
        match self {
            StatusMatcher::Exact(expected) => *expected == status,
            StatusMatcher::Series(series) => status.as_u16() / 100 == *series,
        }
    }
}

const SERIES_NAMES: [(&str, u16); 5] = [
    ("INFORMATIONAL", 1),
    ("SUCCESSFUL", 2),
    ("REDIRECTION", 3),
    ("CLIENT_ERROR", 4),
    ("SERVER_ERROR", 5),
];

/// Series name of a status, as used in metrics outcome tags
pub fn series_name(status: StatusCode) -> &'static str {
    let series = status.as_u16() / 100;
    SERIES_NAMES
        .iter()
        .find(|(_, digit)| *digit == series)
        .map_or("UNKNOWN", |(name, _)| name)
}

/// `BAD_GATEWAY` style name of a status code
fn reason_constant(status: StatusCode) -> Option<String> {
    status.canonical_reason().map(|reason| {
        reason
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    })
}

/// Resolve a single status from a number or constant name
pub fn parse_status(text: &str) -> Result<StatusCode, String> {
    let text = text.trim();
    if let Ok(code) = text.parse::<u16>() {
        return StatusCode::from_u16(code).map_err(|_| format!("invalid status code '{}'", text));
    }
    let wanted = text.to_ascii_uppercase();
    (100..=599)
        .filter_map(|code| StatusCode::from_u16(code).ok())
        .find(|status| reason_constant(*status).as_deref() == Some(wanted.as_str()))
        .ok_or_else(|| format!("unknown status '{}'", text))
}

impl FromStr for StatusMatcher {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some(digit) = lower.strip_suffix("xx")
            && let Ok(series @ 1..=5) = digit.parse::<u16>()
        {
            return Ok(StatusMatcher::Series(series));
        }
        if let Some((_, series)) = SERIES_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        {
            return Ok(StatusMatcher::Series(*series));
        }
        parse_status(trimmed).map(StatusMatcher::Exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_codes_and_names() {
        assert_eq!(
            "502".parse::<StatusMatcher>().unwrap(),
            StatusMatcher::Exact(StatusCode::BAD_GATEWAY)
        );
        assert_eq!(
            "BAD_GATEWAY".parse::<StatusMatcher>().unwrap(),
            StatusMatcher::Exact(StatusCode::BAD_GATEWAY)
        );
        assert_eq!(
            "service_unavailable".parse::<StatusMatcher>().unwrap(),
            StatusMatcher::Exact(StatusCode::SERVICE_UNAVAILABLE)
        );
        assert_eq!(parse_status("I_M_A_TEAPOT").unwrap(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn test_parse_series() {
        let five = "5xx".parse::<StatusMatcher>().unwrap();
        assert_eq!(five, StatusMatcher::Series(5));
        assert!(five.matches(StatusCode::BAD_GATEWAY));
        assert!(!five.matches(StatusCode::NOT_FOUND));

        assert_eq!(
            "SERVER_ERROR".parse::<StatusMatcher>().unwrap(),
            StatusMatcher::Series(5)
        );
        assert_eq!("4XX".parse::<StatusMatcher>().unwrap(), StatusMatcher::Series(4));
    }

    #[test]
    fn test_invalid_specs() {
        assert!("9xx".parse::<StatusMatcher>().is_err());
        assert!("NOT_A_STATUS".parse::<StatusMatcher>().is_err());
        assert!("1000".parse::<StatusMatcher>().is_err());
    }

    #[test]
    fn test_series_name() {
        assert_eq!(series_name(StatusCode::OK), "SUCCESSFUL");
        assert_eq!(series_name(StatusCode::BAD_GATEWAY), "SERVER_ERROR");
    }
}
