//! Utility functions for timestamps and calendar dates.

pub mod timestamps;

pub use timestamps::{
    format_date, format_timestamp, iso_timestamp, now_utc, parse_date, DateError, Timestamp,
};
