use chrono::Duration;
use std::fmt;
use std::str::FromStr;

/// A length of time given on the command line or in the config file:
/// `45m`, `2h`, `1d`, or a bare number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl FromStr for Span {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(m) = s.strip_suffix('m') {
            m.parse::<u32>()
                .map(Span::Minutes)
                .map_err(|_| format!("Invalid minutes: {s}"))
        } else if let Some(h) = s.strip_suffix('h') {
            h.parse::<u32>()
                .map(Span::Hours)
                .map_err(|_| format!("Invalid hours: {s}"))
        } else if let Some(d) = s.strip_suffix('d') {
            d.parse::<u32>()
                .map(Span::Days)
                .map_err(|_| format!("Invalid days: {s}"))
        } else {
            s.parse::<u32>().map(Span::Minutes).map_err(|_| {
                format!("Unknown duration: {s}. Use e.g. 45m, 2h, 1d")
            })
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Span::Minutes(m) => write!(f, "{m}m"),
            Span::Hours(h) => write!(f, "{h}h"),
            Span::Days(d) => write!(f, "{d}d"),
        }
    }
}

impl Span {
    pub fn to_duration(self) -> Duration {
        match self {
            Span::Minutes(m) => Duration::minutes(i64::from(m)),
            Span::Hours(h) => Duration::hours(i64::from(h)),
            Span::Days(d) => Duration::days(i64::from(d)),
        }
    }
}
