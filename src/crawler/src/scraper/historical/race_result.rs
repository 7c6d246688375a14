//! Race result parser for db.netkeiba.com
//!
//! Parses historical race result pages into a [`RaceRecord`].
//! URL: https://db.netkeiba.com/race/RACEID/

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::{CrawlError, Result};
use crate::scraper::extract::{
    capture, cell_select_attr, cell_select_text, cell_text, child_elements, non_empty, parse_number,
    select_text,
};
use crate::types::{RaceCondition, RaceIdentifier, RaceRecord, RunnerResult};

static RACE_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("dl.racedata h1").unwrap());
static RACE_CONDITION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("dl.racedata diary_snap_cut span").unwrap());
static RESULT_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("table.race_table_01 tr").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

// Condition entries are separated by "&nbsp;/&nbsp;" (older pages omit the slash)
static CONDITION_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\u{a0}/?\u{a0}").unwrap());
static DISTANCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\D*\s*0*(?P<distance>\d+)m").unwrap());
static SEX_AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<sex>\D)(?P<age>\d+)$").unwrap());
static HORSE_WEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<weight>\d+)(?:\((?P<diff>[+\-]?\d+)\))?").unwrap());
static HORSE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/horse/(?P<id>[^/]+)/").unwrap());
static JOCKEY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/jockey/(?:result/(?:recent/)?)?(?P<id>[^/]+)/").unwrap());
static TRAINER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/trainer/(?:result/(?:recent/)?)?(?P<id>[^/]+)/").unwrap());
static OWNER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/owner/(?:result/(?:recent/)?)?(?P<id>[^/]+)/").unwrap());

const TURF: &str = "芝";
const DIRT: &str = "ダ";
const OBSTACLE: &str = "障";

/// Result table shape, decided by the number of `td` cells in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    /// 21 cells: logged-in layout with passing order, split, weight and prize
    Full,
    /// 14 cells: public layout without passing order, split, weight or prize
    Reduced,
    /// Legacy or malformed row, skipped
    Unrecognized,
}

/// Cell offsets that differ between layouts
struct Offsets {
    passing_order: Option<usize>,
    sprint_time: Option<usize>,
    horse_weight: Option<usize>,
    trainer: usize,
    owner: usize,
    prize: Option<usize>,
}

// Offsets shared by both layouts
const FINISHING_ORDER: usize = 0;
const FRAME_NUMBER: usize = 1;
const HORSE_NUMBER: usize = 2;
const HORSE: usize = 3;
const SEX_AND_AGE: usize = 4;
const JOCKEY_WEIGHT: usize = 5;
const JOCKEY: usize = 6;
const TIME_RECORD: usize = 7;

impl RowLayout {
    pub fn from_cell_count(count: usize) -> Self {
        match count {
            21 => RowLayout::Full,
            14 => RowLayout::Reduced,
            _ => RowLayout::Unrecognized,
        }
    }

    fn offsets(self) -> Option<Offsets> {
        match self {
            RowLayout::Full => Some(Offsets {
                passing_order: Some(10),
                sprint_time: Some(11),
                horse_weight: Some(14),
                trainer: 18,
                owner: 19,
                prize: Some(20),
            }),
            RowLayout::Reduced => Some(Offsets {
                passing_order: None,
                sprint_time: None,
                horse_weight: None,
                trainer: 11,
                owner: 12,
                prize: None,
            }),
            RowLayout::Unrecognized => None,
        }
    }
}

/// Accumulates one race page; only [`RaceRecordBuilder::build`] hands out a record
#[derive(Debug)]
pub struct RaceRecordBuilder {
    identifier: RaceIdentifier,
    race_name: Option<String>,
    condition: RaceCondition,
    distance: Option<u32>,
    start_time: Option<String>,
    other_data: Vec<String>,
    results: Vec<RunnerResult>,
}

impl RaceRecordBuilder {
    pub fn new(identifier: RaceIdentifier) -> Self {
        Self {
            identifier,
            race_name: None,
            condition: RaceCondition::default(),
            distance: None,
            start_time: None,
            other_data: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn race_name(&mut self, name: Option<String>) -> &mut Self {
        self.race_name = name;
        self
    }

    /// First condition token, e.g. `芝右1600m` or `障芝 ダート3000m`
    pub fn surface_and_distance(&mut self, token: &str) -> &mut Self {
        self.condition.has_turf = token.contains(TURF);
        self.condition.has_dirt = token.contains(DIRT);
        self.condition.has_obstacle = token.contains(OBSTACLE);
        self.distance = capture(Some(token), &DISTANCE, "distance").and_then(|d| d.parse().ok());
        self
    }

    /// A `key : value` condition token
    pub fn condition_entry(&mut self, token: &str) -> Result<&mut Self> {
        let Some((key, value)) = token.split_once(" : ") else {
            return Err(CrawlError::parse(
                format!("race {}", self.identifier.race_id),
                format!("malformed race condition entry {:?}", token),
            ));
        };

        match key {
            "天候" => self.condition.weather = Some(value.to_string()),
            "芝" => self.condition.turf_condition = Some(value.to_string()),
            "ダート" => self.condition.dirt_condition = Some(value.to_string()),
            "発走" => {
                let value = value.trim();
                if NaiveTime::parse_from_str(value, "%H:%M").is_err() {
                    warn!(race_id = %self.identifier.race_id, value, "Start time is not HH:MM");
                }
                self.start_time = Some(format!("{} {}", self.identifier.race_date, value));
            }
            _ => self.other_data.push(format!("{}={}", key, value)),
        }

        Ok(self)
    }

    pub fn runner(&mut self, result: RunnerResult) -> &mut Self {
        self.results.push(result);
        self
    }

    pub fn build(self) -> RaceRecord {
        RaceRecord {
            identifier: self.identifier,
            race_name: self.race_name,
            race_condition: self.condition,
            race_distance: self.distance,
            start_time: self.start_time,
            other_data: self.other_data,
            race_results: self.results,
        }
    }
}

/// Parser for race result pages
pub struct RaceResultParser;

impl RaceResultParser {
    /// Parse a race result page for the race listed as `identifier`.
    ///
    /// Fails when the race condition line is missing; rows with an unknown
    /// layout are skipped.
    pub fn parse(html: &str, identifier: RaceIdentifier) -> Result<RaceRecord> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let race_id = identifier.race_id.clone();
        let mut builder = RaceRecordBuilder::new(identifier);

        builder.race_name(select_text(root, &RACE_NAME));

        let condition_line = select_text(root, &RACE_CONDITION).ok_or_else(|| {
            CrawlError::parse(format!("race {}", race_id), "race condition line not found")
        })?;
        let mut tokens = CONDITION_DELIMITER.split(&condition_line);
        builder.surface_and_distance(tokens.next().unwrap_or_default());
        for token in tokens.filter(|t| !t.is_empty()) {
            builder.condition_entry(token)?;
        }

        for row in document.select(&RESULT_ROWS) {
            if child_elements(row, "th").next().is_some() {
                continue;
            }

            let cells: Vec<ElementRef> = child_elements(row, "td").collect();
            let layout = RowLayout::from_cell_count(cells.len());
            match Self::parse_row(&cells, layout) {
                Some(result) => {
                    builder.runner(result);
                }
                None if layout == RowLayout::Unrecognized => {
                    debug!(race_id = %race_id, cells = cells.len(), "Skipping row with unrecognized layout");
                }
                None => {
                    warn!(race_id = %race_id, "Skipping result row with missing fields");
                }
            }
        }

        Ok(builder.build())
    }

    /// Parse one result row; `None` for unrecognized layouts or missing required cells
    pub fn parse_row(cells: &[ElementRef<'_>], layout: RowLayout) -> Option<RunnerResult> {
        let offsets = layout.offsets()?;
        let optional = |offset: Option<usize>| offset.and_then(|o| non_empty(cell_text(cells, o)));

        let sex_age = cell_text(cells, SEX_AND_AGE);
        let (horse_weight, horse_weight_diff) = Self::split_horse_weight(optional(offsets.horse_weight).as_deref());

        Some(RunnerResult {
            finishing_order: cell_text(cells, FINISHING_ORDER)?,
            passing_order: optional(offsets.passing_order),
            time_record: non_empty(cell_text(cells, TIME_RECORD)),
            sprint_time_record: optional(offsets.sprint_time),
            frame_number: parse_number(cell_text(cells, FRAME_NUMBER).as_deref())?,
            horse_number: parse_number(cell_text(cells, HORSE_NUMBER).as_deref())?,
            horse_id: capture(
                cell_select_attr(cells, HORSE, &LINK, "href").as_deref(),
                &HORSE_ID,
                "id",
            )?,
            horse_name: cell_select_text(cells, HORSE, &LINK)?,
            horse_sex: capture(sex_age.as_deref(), &SEX_AGE, "sex")?,
            horse_age: capture(sex_age.as_deref(), &SEX_AGE, "age")?.parse().ok()?,
            horse_weight,
            horse_weight_diff,
            jockey_id: capture(
                cell_select_attr(cells, JOCKEY, &LINK, "href").as_deref(),
                &JOCKEY_ID,
                "id",
            )?,
            jockey_name: cell_select_text(cells, JOCKEY, &LINK)?,
            jockey_weight: parse_number(cell_text(cells, JOCKEY_WEIGHT).as_deref())?,
            trainer_id: capture(
                cell_select_attr(cells, offsets.trainer, &LINK, "href").as_deref(),
                &TRAINER_ID,
                "id",
            )?,
            trainer_name: cell_select_text(cells, offsets.trainer, &LINK)?,
            owner_id: capture(
                cell_select_attr(cells, offsets.owner, &LINK, "href").as_deref(),
                &OWNER_ID,
                "id",
            )?,
            owner_name: cell_select_text(cells, offsets.owner, &LINK)?,
            prize: parse_number(optional(offsets.prize).as_deref()),
        })
    }

    /// `480(+2)` → (480, +2); `480` → (480, None); `計不` → (None, None)
    pub fn split_horse_weight(text: Option<&str>) -> (Option<u32>, Option<i32>) {
        let weight = capture(text, &HORSE_WEIGHT, "weight").and_then(|w| w.parse().ok());
        let diff = capture(text, &HORSE_WEIGHT, "diff").and_then(|d| d.parse().ok());
        (weight, diff)
    }
}
