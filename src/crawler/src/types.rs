//! Record types produced by the crawler.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the race search listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceIdentifier {
    pub race_date: NaiveDate,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub race_order_in_day: Option<String>,
    pub race_id: String,
    /// Not shown by the older listing layout
    pub runner_count: Option<u32>,
}

/// Surface flags and going reported in the race condition line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceCondition {
    pub has_turf: bool,
    pub has_dirt: bool,
    pub has_obstacle: bool,
    pub weather: Option<String>,
    pub turf_condition: Option<String>,
    pub dirt_condition: Option<String>,
}

/// A fully parsed race page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    #[serde(flatten)]
    pub identifier: RaceIdentifier,
    pub race_name: Option<String>,
    pub race_condition: RaceCondition,
    pub race_distance: Option<u32>,
    /// Race date and post time, `YYYY-MM-DD HH:MM`
    pub start_time: Option<String>,
    /// Unrecognized condition entries as `key=value`
    pub other_data: Vec<String>,
    pub race_results: Vec<RunnerResult>,
}

/// One runner's row in the result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerResult {
    /// Numeric place, or a status such as `取` / `中`
    pub finishing_order: String,
    pub passing_order: Option<String>,
    /// Blank for scratched runners
    pub time_record: Option<String>,
    /// Final-stretch (last 3F) split
    pub sprint_time_record: Option<String>,
    pub frame_number: u8,
    pub horse_number: u8,
    pub horse_id: String,
    pub horse_name: String,
    pub horse_sex: String,
    pub horse_age: u8,
    pub horse_weight: Option<u32>,
    pub horse_weight_diff: Option<i32>,
    pub jockey_id: String,
    pub jockey_name: String,
    pub jockey_weight: f64,
    pub trainer_id: String,
    pub trainer_name: String,
    pub owner_id: String,
    pub owner_name: String,
    /// In units of 10,000 yen
    pub prize: Option<f64>,
}

/// Browser cookie returned by a successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
}

/// Ordered cookie jar read back after login
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthCookieSet(pub Vec<Cookie>);

impl AuthCookieSet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c.name == name)
    }

    /// `Cookie` request header value, `name=value` pairs joined by `; `
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str, value: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: ".netkeiba.com".to_string(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: true,
        }
    }

    #[test]
    fn test_cookie_header_value() {
        let set = AuthCookieSet(vec![cookie("nkauth", "abc"), cookie("netkeiba", "xyz")]);
        assert!(set.contains("nkauth"));
        assert!(!set.contains("other"));
        assert_eq!(set.header_value(), "nkauth=abc; netkeiba=xyz");
    }

    #[test]
    fn test_cookie_set_serializes_as_array() {
        let set = AuthCookieSet(vec![cookie("nkauth", "abc")]);
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["name"], "nkauth");

        let back: AuthCookieSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }
}
