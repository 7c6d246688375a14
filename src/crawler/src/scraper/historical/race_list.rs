//! Race search listing parser for db.netkeiba.com
//!
//! Parses one page of the `pid=race_list` search into race identifiers
//! and works out whether another page follows.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::{next_page_request, race_result_url};
use crate::error::{CrawlError, Result};
use crate::scraper::extract::{
    capture, cell_select_attr, cell_select_text, cell_text, child_elements, parse_number,
    select_attr, text,
};
use crate::scraper::transport::Request;
use crate::types::RaceIdentifier;

static LISTING_ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"table[summary="レース検索結果"] tr"#).unwrap());
static SERIAL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"form[name="sort"] input[name="serial"]"#).unwrap());
static PAGER_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("div.pager a").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

static LOCATION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/race/sum/(?P<id>[^/]+)/[^/]+/").unwrap());
static RACE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/race/(?P<id>[^/]+)/").unwrap());
static PAGING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^javascript:paging\('(?P<page>\d+)'\)$").unwrap());

const NEXT_LABEL: &str = "次";

// Listing columns: 開催日, 開催, 天気, R, レース名, 映像, 距離, 頭数, ...
const DATE: usize = 0;
const LOCATION: usize = 1;
const RACE_ORDER: usize = 3;
const RACE_NAME: usize = 4;
const RUNNER_COUNT: usize = 7;

/// Server-side cursor needed to request the following listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub serial: String,
    pub page: u32,
}

/// Pagination state after reading a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    HasNext(PageCursor),
    Exhausted,
}

/// Fetch produced by a listing page
#[derive(Debug, Clone)]
pub enum FollowUp {
    /// Race detail page, parsed with the listing row carried along
    Race {
        identifier: RaceIdentifier,
        request: Request,
    },
    NextPage(Request),
}

/// One parsed listing page
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub races: Vec<RaceIdentifier>,
    pub state: WalkState,
}

impl SearchPage {
    /// Race fetches in listing order, then the next page if there is one
    pub fn follow_ups(&self, db_url: &str) -> Vec<FollowUp> {
        let mut out: Vec<FollowUp> = self
            .races
            .iter()
            .map(|identifier| FollowUp::Race {
                identifier: identifier.clone(),
                request: Request::get(race_result_url(db_url, &identifier.race_id)),
            })
            .collect();

        if let WalkState::HasNext(cursor) = &self.state {
            out.push(FollowUp::NextPage(next_page_request(db_url, cursor)));
        }

        out
    }
}

/// Parser for race search listing pages
pub struct RaceListParser;

impl RaceListParser {
    pub fn parse(html: &str) -> Result<SearchPage> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let races = document
            .select(&LISTING_ROWS)
            .filter(|row| child_elements(*row, "th").next().is_none())
            .filter_map(|row| {
                let cells: Vec<ElementRef> = child_elements(row, "td").collect();
                let identifier = Self::parse_row(&cells);
                if identifier.is_none() {
                    warn!(
                        race_name = %cell_text(&cells, RACE_NAME).unwrap_or_default(),
                        "Skipping listing row without date or race id"
                    );
                }
                identifier
            })
            .collect();

        let state = Self::parse_pager(root)?;

        Ok(SearchPage { races, state })
    }

    fn parse_row(cells: &[ElementRef<'_>]) -> Option<RaceIdentifier> {
        let race_date = cell_select_text(cells, DATE, &LINK)
            .map(|d| d.replace('/', "-"))
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())?;
        let race_id = capture(
            cell_select_attr(cells, RACE_NAME, &LINK, "href").as_deref(),
            &RACE_ID,
            "id",
        )?;

        Some(RaceIdentifier {
            race_date,
            location_id: capture(
                cell_select_attr(cells, LOCATION, &LINK, "href").as_deref(),
                &LOCATION_ID,
                "id",
            ),
            location_name: cell_select_text(cells, LOCATION, &LINK),
            race_order_in_day: cell_text(cells, RACE_ORDER),
            race_id,
            runner_count: parse_number(cell_text(cells, RUNNER_COUNT).as_deref()),
        })
    }

    fn parse_pager(root: ElementRef<'_>) -> Result<WalkState> {
        let Some(next_link) = root
            .select(&PAGER_LINKS)
            .find(|a| text(*a).as_deref() == Some(NEXT_LABEL))
        else {
            return Ok(WalkState::Exhausted);
        };

        let page = capture(next_link.value().attr("href"), &PAGING, "page")
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| CrawlError::parse("race listing", "unrecognized next page link"))?;
        let serial = select_attr(root, &SERIAL, "value")
            .ok_or_else(|| CrawlError::parse("race listing", "search serial not found"))?;

        Ok(WalkState::HasNext(PageCursor { serial, page }))
    }
}
