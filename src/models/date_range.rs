use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::middleware::AppError;
use crate::validation::InputValidator;

/// `?from=YYYY-MM-DD&to=YYYY-MM-DD` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Dashboard window used when the client does not pick one
    pub fn default_bounds() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default(),
        )
    }

    /// Both bounds, only when both were given
    pub fn bounds(&self) -> Result<Option<(NaiveDate, NaiveDate)>, AppError> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => {
                InputValidator::date_range(from, to)?;
                Ok(Some((from, to)))
            }
            _ => Ok(None),
        }
    }

    /// Given bounds, each falling back to the default window
    pub fn bounds_or_default(&self) -> Result<(NaiveDate, NaiveDate), AppError> {
        let (default_from, default_to) = Self::default_bounds();
        let from = self.from.unwrap_or(default_from);
        let to = self.to.unwrap_or(default_to);
        InputValidator::date_range(from, to)?;
        Ok((from, to))
    }
}
