use chrono::{Local, NaiveDate};

use crate::error::{AudiochunkError, Result};

const BUCKET_FORMAT: &str = "%y%m%d";

/// The calendar day a batch belongs to. Input and output folders are bucketed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunDate(NaiveDate);

impl RunDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in local time.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Folder name for this day, e.g. `240315`.
    pub fn bucket(&self) -> String {
        self.0.format(BUCKET_FORMAT).to_string()
    }
}

impl From<NaiveDate> for RunDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl std::fmt::Display for RunDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bucket())
    }
}

impl std::str::FromStr for RunDate {
    type Err = AudiochunkError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = if s.len() == 6 && s.chars().all(|c| c.is_ascii_digit()) {
            NaiveDate::parse_from_str(s, BUCKET_FORMAT)
        } else {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
        };
        parsed
            .map(RunDate)
            .map_err(|_| AudiochunkError::InvalidRunDate(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_format() {
        let date = RunDate::new(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(date.bucket(), "240305");
        assert_eq!(date.to_string(), "240305");
    }

    #[test]
    fn test_parse_both_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!("240315".parse::<RunDate>().unwrap().date(), expected);
        assert_eq!("2024-03-15".parse::<RunDate>().unwrap().date(), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("241345".parse::<RunDate>().is_err());
        assert!("yesterday".parse::<RunDate>().is_err());
        assert!(matches!(
            "".parse::<RunDate>(),
            Err(AudiochunkError::InvalidRunDate(_))
        ));
    }
}
