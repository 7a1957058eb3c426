//! Loading observed case counts from a wide case-count table.
//!
//! The table has one row per region and one column per day, in the layout of the public
//! COVID-19 time series:
//!
//! ```text
//! Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,...
//! Washington,US,47.4,-121.5,0,0,...
//! ```
//!
//! Columns whose header is not a date are treated as metadata. A region is matched against the
//! `Province/State` column first and `Country/Region` second. Empty or non-numeric cells become
//! missing observations.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{Result, SirFitError};
use crate::log::{debug, trace};
use crate::series::{parse_date, DateIndex, ObservedSeries};

const PROVINCE_COLUMN: &str = "Province/State";
const COUNTRY_COLUMN: &str = "Country/Region";

/// Loads the series for `region` from a CSV file, keeping days on or after `start`.
///
/// # Errors
/// Fails if the file cannot be read, the region is absent, or no day remains after `start`.
pub fn load_confirmed(path: &Path, region: &str, start: Option<NaiveDate>) -> Result<ObservedSeries> {
    debug!("loading confirmed cases for {region} from {}", path.display());
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    select_region(reader, region, start)
}

/// Like [`load_confirmed`], reading CSV text from any reader.
///
/// # Errors
/// See [`load_confirmed`].
pub fn read_confirmed<R: Read>(
    input: R,
    region: &str,
    start: Option<NaiveDate>,
) -> Result<ObservedSeries> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    select_region(reader, region, start)
}

fn select_region<R: Read>(
    mut reader: csv::Reader<R>,
    region: &str,
    start: Option<NaiveDate>,
) -> Result<ObservedSeries> {
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let province = column(PROVINCE_COLUMN);
    let country = column(COUNTRY_COLUMN);
    if province.is_none() && country.is_none() {
        return Err(SirFitError::SirFitError(format!(
            "case table needs a `{PROVINCE_COLUMN}` or `{COUNTRY_COLUMN}` column"
        )));
    }

    let date_columns: Vec<(usize, NaiveDate)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| parse_date(h).ok().map(|date| (i, date)))
        .filter(|(_, date)| start.is_none_or(|start| *date >= start))
        .collect();
    trace!("{} date columns selected", date_columns.len());

    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    let find_in = |index: Option<usize>| {
        index.and_then(|i| {
            records
                .iter()
                .find(|record| record.get(i).is_some_and(|cell| cell == region))
        })
    };
    let record = find_in(province)
        .or_else(|| find_in(country))
        .ok_or_else(|| SirFitError::RegionNotFound(region.to_string()))?;

    if date_columns.is_empty() {
        return Err(SirFitError::InsufficientData {
            required: 1,
            found: 0,
        });
    }

    let index = DateIndex::new(date_columns.iter().map(|(_, date)| *date).collect())?;
    let values = date_columns
        .iter()
        .map(|(i, _)| {
            record
                .get(*i)
                .and_then(|cell| cell.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        })
        .collect();
    ObservedSeries::new(index, values)
}
