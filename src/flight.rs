//! Flight record model.
//!
//! One CSV line of 19 comma-separated fields maps to one [`FlightRecord`].
//! Field 0 is the primary key; the other 18 become bins. The flight date is
//! stored as `year * 10000 + month * 100 + day` so it can carry a numeric
//! range index.

use thiserror::Error;

use crate::store::Bin;

/// Set flight records are written to.
pub const FLIGHTS_SET: &str = "flights";
/// Number of fields on every input line.
pub const FIELD_COUNT: usize = 19;

/// Bin holding the encoded flight date.
pub const FL_DATE_BIN: &str = "FL_DATE";
/// Secondary index over [`FL_DATE_BIN`].
pub const FL_DATE_INDEX: &str = FL_DATE_BIN;

/// Bin names, in CSV order (fields 1 through 18).
pub mod bins {
    /// Field 1.
    pub const YEAR: &str = "YEAR";
    /// Field 2.
    pub const DAY_OF_MONTH: &str = "DAY_OF_MONTH";
    /// Field 3.
    pub const FL_DATE: &str = super::FL_DATE_BIN;
    /// Field 4.
    pub const AIRLINE_ID: &str = "AIRLINE_ID";
    /// Field 5.
    pub const CARRIER: &str = "CARRIER";
    /// Field 6.
    pub const FL_NUM: &str = "FL_NUM";
    /// Field 7.
    pub const ORI_AIRPORT_ID: &str = "ORI_AIRPORT_ID";
    /// Field 8.
    pub const ORIGIN: &str = "ORIGIN";
    /// Field 9.
    pub const ORI_CITY_NAME: &str = "ORI_CITY_NAME";
    /// Field 10.
    pub const ORI_STATE_ABR: &str = "ORI_STATE_ABR";
    /// Field 11.
    pub const DEST: &str = "DEST";
    /// Field 12.
    pub const DEST_CITY_NAME: &str = "DEST_CITY_NAME";
    /// Field 13.
    pub const DEST_STATE_ABR: &str = "DEST_STATE_ABR";
    /// Field 14.
    pub const DEP_TIME: &str = "DEP_TIME";
    /// Field 15.
    pub const ARR_TIME: &str = "ARR_TIME";
    /// Field 16.
    pub const ELAPSED_TIME: &str = "ELAPSED_TIME";
    /// Field 17.
    pub const AIR_TIME: &str = "AIR_TIME";
    /// Field 18.
    pub const DISTANCE: &str = "DISTANCE";

    /// All bin names in CSV order.
    pub const ALL: [&str; 18] = [
        YEAR,
        DAY_OF_MONTH,
        FL_DATE,
        AIRLINE_ID,
        CARRIER,
        FL_NUM,
        ORI_AIRPORT_ID,
        ORIGIN,
        ORI_CITY_NAME,
        ORI_STATE_ABR,
        DEST,
        DEST_CITY_NAME,
        DEST_STATE_ABR,
        DEP_TIME,
        ARR_TIME,
        ELAPSED_TIME,
        AIR_TIME,
        DISTANCE,
    ];
}

/// Why a line could not become a [`FlightRecord`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Wrong number of comma-separated fields.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Required count.
        expected: usize,
        /// Count on the line.
        found: usize,
    },
    /// The key field is blank.
    #[error("record key is empty")]
    EmptyKey,
    /// An integer bin did not parse.
    #[error("{field} is not an integer: `{value}`")]
    Integer {
        /// Bin name.
        field: &'static str,
        /// Offending text.
        value: String,
    },
    /// The date is not `YYYY/MM/DD`.
    #[error("invalid date `{value}`, expected YYYY/MM/DD")]
    Date {
        /// Offending text.
        value: String,
    },
}

/// Encode a `YYYY/MM/DD` date as `year * 10000 + month * 100 + day`.
///
/// Components are parsed numerically; `2012/1/5` and `2012/01/05` encode the
/// same.
pub fn to_timestamp(date: &str) -> Result<i64, ParseError> {
    let invalid = || ParseError::Date {
        value: date.to_string(),
    };
    let mut parts = date.trim().split('/');
    let mut component = || -> Result<i64, ParseError> {
        parts
            .next()
            .and_then(|part| part.trim().parse::<i64>().ok())
            .ok_or_else(invalid)
    };
    let year = component()?;
    let month = component()?;
    let day = component()?;
    if parts.next().is_some() {
        return Err(invalid());
    }
    year.checked_mul(10_000)
        .and_then(|v| v.checked_add(month.checked_mul(100)?))
        .and_then(|v| v.checked_add(day))
        .ok_or_else(invalid)
}

/// One flight event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightRecord {
    /// Primary key.
    pub id: String,
    /// Calendar year.
    pub year: i64,
    /// Day of month.
    pub day_of_month: i64,
    /// Encoded flight date, see [`to_timestamp`].
    pub fl_date: i64,
    /// Numeric airline id.
    pub airline_id: i64,
    /// Carrier code.
    pub carrier: String,
    /// Flight number.
    pub fl_num: i64,
    /// Origin airport id.
    pub origin_airport_id: i64,
    /// Origin airport code.
    pub origin: String,
    /// Origin city name.
    pub origin_city_name: String,
    /// Origin state code.
    pub origin_state: String,
    /// Destination airport code.
    pub dest: String,
    /// Destination city name.
    pub dest_city_name: String,
    /// Destination state code.
    pub dest_state: String,
    /// Departure time (hhmm).
    pub dep_time: i64,
    /// Arrival time (hhmm).
    pub arr_time: i64,
    /// Elapsed minutes.
    pub elapsed_time: i64,
    /// Minutes airborne.
    pub air_time: i64,
    /// Miles flown.
    pub distance: i64,
}

fn int(field: &'static str, value: &str) -> Result<i64, ParseError> {
    value.parse().map_err(|_| ParseError::Integer {
        field,
        value: value.to_string(),
    })
}

impl FlightRecord {
    /// Build a record from already split fields.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let f: Vec<&str> = fields.into_iter().map(str::trim).collect();
        if f.len() != FIELD_COUNT {
            return Err(ParseError::FieldCount {
                expected: FIELD_COUNT,
                found: f.len(),
            });
        }
        if f[0].is_empty() {
            return Err(ParseError::EmptyKey);
        }

        Ok(Self {
            id: f[0].to_string(),
            year: int(bins::YEAR, f[1])?,
            day_of_month: int(bins::DAY_OF_MONTH, f[2])?,
            fl_date: to_timestamp(f[3])?,
            airline_id: int(bins::AIRLINE_ID, f[4])?,
            carrier: f[5].to_string(),
            fl_num: int(bins::FL_NUM, f[6])?,
            origin_airport_id: int(bins::ORI_AIRPORT_ID, f[7])?,
            origin: f[8].to_string(),
            origin_city_name: f[9].to_string(),
            origin_state: f[10].to_string(),
            dest: f[11].to_string(),
            dest_city_name: f[12].to_string(),
            dest_state: f[13].to_string(),
            dep_time: int(bins::DEP_TIME, f[14])?,
            arr_time: int(bins::ARR_TIME, f[15])?,
            elapsed_time: int(bins::ELAPSED_TIME, f[16])?,
            air_time: int(bins::AIR_TIME, f[17])?,
            distance: int(bins::DISTANCE, f[18])?,
        })
    }

    /// Split a raw line on commas and build a record.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        Self::from_fields(line.split(','))
    }

    /// The 18 bins written under [`FlightRecord::id`].
    pub fn bins(&self) -> Vec<Bin> {
        vec![
            Bin::new(bins::YEAR, self.year),
            Bin::new(bins::DAY_OF_MONTH, self.day_of_month),
            Bin::new(bins::FL_DATE, self.fl_date),
            Bin::new(bins::AIRLINE_ID, self.airline_id),
            Bin::new(bins::CARRIER, self.carrier.as_str()),
            Bin::new(bins::FL_NUM, self.fl_num),
            Bin::new(bins::ORI_AIRPORT_ID, self.origin_airport_id),
            Bin::new(bins::ORIGIN, self.origin.as_str()),
            Bin::new(bins::ORI_CITY_NAME, self.origin_city_name.as_str()),
            Bin::new(bins::ORI_STATE_ABR, self.origin_state.as_str()),
            Bin::new(bins::DEST, self.dest.as_str()),
            Bin::new(bins::DEST_CITY_NAME, self.dest_city_name.as_str()),
            Bin::new(bins::DEST_STATE_ABR, self.dest_state.as_str()),
            Bin::new(bins::DEP_TIME, self.dep_time),
            Bin::new(bins::ARR_TIME, self.arr_time),
            Bin::new(bins::ELAPSED_TIME, self.elapsed_time),
            Bin::new(bins::AIR_TIME, self.air_time),
            Bin::new(bins::DISTANCE, self.distance),
        ]
    }
}
