use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{ReportError, Result};

fn year_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4}(0[1-9]|1[0-2])$").expect("invalid year-month regex"))
}

pub fn validate_year_month(token: &str) -> bool {
    year_month_re().is_match(token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn parse(token: &str) -> Result<Self> {
        if !validate_year_month(token) {
            return Err(ReportError::InvalidPeriod(token.to_string()));
        }
        let year = token[..4]
            .parse::<i32>()
            .map_err(|_| ReportError::InvalidPeriod(token.to_string()))?;
        let month = token[4..]
            .parse::<u32>()
            .map_err(|_| ReportError::InvalidPeriod(token.to_string()))?;
        Ok(Period { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn as_int(&self) -> i64 {
        i64::from(self.year) * 100 + i64::from(self.month)
    }

    pub fn previous(&self) -> Period {
        if self.month == 1 {
            Period {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Period {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Period {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Last two digits of the year, as used in sheet names like `24年度実績`.
    pub fn short_year(&self) -> String {
        format!("{:02}", self.year.rem_euclid(100))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Period::parse(s)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_month_of_sampled_years() {
        for year in [0, 1, 999, 1999, 2024, 9999] {
            for month in 1..=12 {
                let token = format!("{year:04}{month:02}");
                assert!(validate_year_month(&token), "{token} should be valid");
            }
        }
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in [
            "", "2024", "20245", "2024050", "202400", "202413", "202499", "2024-5", "abcd05",
            "2024ab", " 202405", "２０２４05",
        ] {
            assert!(!validate_year_month(token), "{token:?} should be invalid");
            assert!(Period::parse(token).is_err(), "{token:?} should not parse");
        }
        assert!(Period::parse(" 202405\n").is_err());
    }

    #[test]
    fn previous_rolls_over_year() {
        let p = Period::parse("202401").unwrap();
        assert_eq!(p.previous().to_string(), "202312");
        assert_eq!(p.previous().as_int(), 202312);

        let p = Period::parse("202405").unwrap();
        assert_eq!(p.previous().to_string(), "202404");
    }

    #[test]
    fn previous_undoes_next_for_all_months() {
        for year in [1, 2023, 2024, 9999] {
            for month in 1..=12 {
                let p = Period::parse(&format!("{year:04}{month:02}")).unwrap();
                assert_eq!(p.next().previous(), p);
                assert_eq!(p.previous().next(), p);
            }
        }
    }

    #[test]
    fn decomposes_year_and_month() {
        let p: Period = "202405".parse().unwrap();
        assert_eq!(p.year(), 2024);
        assert_eq!(p.month(), 5);
        assert_eq!(p.as_int() % 100, 5);
        assert_eq!(p.short_year(), "24");
        assert_eq!(Period::parse("200509").unwrap().short_year(), "05");
    }

    #[test]
    fn serializes_as_token() {
        let p = Period::parse("202312").unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"202312\"");
    }
}
