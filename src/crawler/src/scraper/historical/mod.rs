//! Historical data scraper for db.netkeiba.com
//!
//! Provides parsers for historical race data:
//! - Race search listing pages
//! - Race result pages

pub mod race_list;
pub mod race_result;

pub use race_list::{FollowUp, PageCursor, RaceListParser};
pub use race_result::RaceResultParser;

use serde::{Deserialize, Serialize};

use super::transport::Request;

/// Year/month window for the race search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRange {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

/// Build race result URL
/// URL: https://db.netkeiba.com/race/RACEID/
pub fn race_result_url(db_url: &str, race_id: &str) -> String {
    format!("{}/race/{}/", db_url, race_id)
}

/// Form POST that opens the race search for `range`
pub fn search_request(db_url: &str, range: &SearchRange, page_size: u32) -> Request {
    Request::post_form(
        format!("{}/", db_url),
        [
            ("pid", "race_list".to_string()),
            ("word", String::new()),
            ("start_year", range.start_year.to_string()),
            ("start_mon", range.start_month.to_string()),
            ("end_year", range.end_year.to_string()),
            ("end_mon", range.end_month.to_string()),
            ("kyori_min", String::new()),
            ("kyori_max", String::new()),
            ("sort", "date".to_string()),
            ("list", page_size.to_string()),
        ],
    )
}

/// Form POST for the listing page after the one `cursor` was read from
pub fn next_page_request(db_url: &str, cursor: &PageCursor) -> Request {
    Request::post_form(
        format!("{}/", db_url),
        [
            ("pid", "race_list".to_string()),
            ("serial", cursor.serial.clone()),
            ("sort_key", "date".to_string()),
            ("sort_type", "desc".to_string()),
            ("page", cursor.page.to_string()),
        ],
    )
}
