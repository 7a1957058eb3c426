//! Observed case counts and the calendar index they are keyed by.

use chrono::{Days, NaiveDate};

use crate::error::{Result, SirFitError};

/// Date formats accepted for case-data column headers and configured start dates: the
/// `month/day/two-digit-year` headers of the case-count table and ISO 8601.
const DATE_FORMATS: [&str; 3] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

/// Parses a date in any of the accepted formats.
///
/// # Errors
/// Returns `SirFitError::DateParse` if no format matches.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .ok_or_else(|| SirFitError::DateParse(format!("`{text}`")))
}

/// A run of consecutive calendar days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateIndex {
    dates: Vec<NaiveDate>,
}

impl DateIndex {
    /// `len` consecutive days starting at `start`.
    pub fn daily(start: NaiveDate, len: usize) -> Self {
        let dates = start.iter_days().take(len).collect();
        Self { dates }
    }

    /// Wraps an explicit list of dates, which must be consecutive days.
    ///
    /// # Errors
    /// Returns an error if two neighbouring dates are not exactly one day apart.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self> {
        if let Some(pair) = dates
            .windows(2)
            .find(|pair| pair[0].checked_add_days(Days::new(1)) != Some(pair[1]))
        {
            return Err(SirFitError::SirFitError(format!(
                "date index is not daily: {} is followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { dates })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Returns a copy extended one calendar day at a time past the last date until it holds
    /// `new_len` entries. An index that is already long enough is returned unchanged.
    ///
    /// # Errors
    /// Returns an error if the index is empty (there is no last date to extend from) or the
    /// calendar overflows.
    pub fn extended_to(&self, new_len: usize) -> Result<DateIndex> {
        let mut dates = self.dates.clone();
        let mut current = self
            .last()
            .ok_or_else(|| SirFitError::SirFitError("cannot extend an empty date index".into()))?;
        while dates.len() < new_len {
            current = current
                .checked_add_days(Days::new(1))
                .ok_or_else(|| {
                    SirFitError::SirFitError(format!("calendar overflow extending past {current}"))
                })?;
            dates.push(current);
        }
        Ok(DateIndex { dates })
    }
}

/// Case counts for one region, one value per day of the index.
///
/// A value of `None` means there is no observation for that day; such days are left out when
/// scoring a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedSeries {
    index: DateIndex,
    values: Vec<Option<f64>>,
}

impl ObservedSeries {
    /// # Errors
    /// Returns an error if the index and values differ in length or a value is negative.
    pub fn new(index: DateIndex, values: Vec<Option<f64>>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(SirFitError::SirFitError(format!(
                "date index has {} entries but {} values were given",
                index.len(),
                values.len()
            )));
        }
        if let Some((date, value)) = index
            .dates()
            .iter()
            .zip(&values)
            .find_map(|(date, value)| value.filter(|v| *v < 0.0).map(|v| (date, v)))
        {
            return Err(SirFitError::SirFitError(format!(
                "negative case count {value} on {date}"
            )));
        }
        Ok(Self { index, values })
    }

    /// A fully observed series starting at `start`.
    pub fn from_counts(start: NaiveDate, counts: &[f64]) -> Result<Self> {
        Self::new(
            DateIndex::daily(start, counts.len()),
            counts.iter().copied().map(Some).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &DateIndex {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Number of days with a usable (finite) observation.
    pub fn observed_count(&self) -> usize {
        self.values
            .iter()
            .filter(|v| v.is_some_and(f64::is_finite))
            .count()
    }

    /// Fails unless at least `required` days carry a usable observation.
    ///
    /// # Errors
    /// Returns `SirFitError::InsufficientData`.
    pub fn require_observations(&self, required: usize) -> Result<()> {
        let found = self.observed_count();
        if found < required {
            return Err(SirFitError::InsufficientData { required, found });
        }
        Ok(())
    }
}
