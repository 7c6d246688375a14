//! Race search crawl: walks listing pages and parses every listed race.

use std::io::Write;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{CrawlConfig, SiteConfig};
use crate::error::CrawlError;
use crate::output::JsonLinesSink;
use crate::scraper::historical::{search_request, FollowUp, RaceListParser, RaceResultParser, SearchRange};
use crate::scraper::transport::{Request, Transport};
use crate::types::{RaceIdentifier, RaceRecord};

/// Counts reported at the end of a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages: usize,
    pub races: usize,
    pub failed: usize,
}

/// Crawl every race in `range`, writing each record to `sink`.
///
/// A race page that fails to fetch or parse is logged and skipped. A listing
/// page failure ends the crawl, since the next page cannot be requested
/// without it.
pub async fn crawl<T: Transport, W: Write>(
    transport: &T,
    site: &SiteConfig,
    config: &CrawlConfig,
    range: &SearchRange,
    sink: &mut JsonLinesSink<W>,
) -> Result<CrawlSummary> {
    let mut summary = CrawlSummary::default();
    let mut next = Some(search_request(&site.db_url, range, config.page_size));

    while let Some(request) = next.take() {
        let page_number = request.form_value("page").unwrap_or("1").to_string();
        let response = transport
            .fetch(&request)
            .await
            .with_context(|| format!("Failed to fetch listing page {}", page_number))?;
        let page = RaceListParser::parse(&response.body)
            .with_context(|| format!("Failed to parse listing page {}", page_number))?;
        summary.pages += 1;

        let mut races = Vec::with_capacity(page.races.len());
        for follow_up in page.follow_ups(&site.db_url) {
            match follow_up {
                FollowUp::Race { identifier, request } => races.push((identifier, request)),
                FollowUp::NextPage(request) => next = Some(request),
            }
        }
        info!(page = %page_number, races = races.len(), "Listing page parsed");

        let results: Vec<_> = stream::iter(races)
            .map(|(identifier, request)| fetch_race(transport, identifier, request))
            .buffered(config.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                Ok(record) => {
                    sink.write(&record)?;
                    summary.races += 1;
                }
                Err((race_id, e)) => {
                    warn!(race_id = %race_id, error = %e, "Skipping race");
                    summary.failed += 1;
                }
            }
        }
        sink.flush()?;
    }

    info!(
        pages = summary.pages,
        races = summary.races,
        failed = summary.failed,
        "Crawl finished"
    );
    Ok(summary)
}

async fn fetch_race<T: Transport>(
    transport: &T,
    identifier: RaceIdentifier,
    request: Request,
) -> std::result::Result<RaceRecord, (String, CrawlError)> {
    let race_id = identifier.race_id.clone();
    let response = transport
        .fetch(&request)
        .await
        .map_err(|e| (race_id.clone(), e))?;
    debug!(race_id = %race_id, url = %response.url, "Fetched race page");
    RaceResultParser::parse(&response.body, identifier).map_err(|e| (race_id, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use crate::scraper::transport::Response;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies keyed by URL, or by listing page number for POSTs
    struct FakeTransport {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<Request>>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn fetch(&self, request: &Request) -> error::Result<Response> {
            self.requests.lock().unwrap().push(request.clone());
            let key = match request {
                Request::Get { url } => url.clone(),
                Request::PostForm { .. } => {
                    format!("listing:{}", request.form_value("page").unwrap_or("1"))
                }
            };
            let body = self
                .pages
                .get(&key)
                .cloned()
                .ok_or_else(|| CrawlError::parse(key.clone(), "no such page"))?;
            Ok(Response {
                url: request.url().to_string(),
                body,
            })
        }
    }

    fn listing_row(race_id: &str) -> String {
        format!(
            r#"<tr><td><a href="/race/list/20240106/">2024/01/06</a></td>
<td><a href="/race/sum/06/20240106/">1中山1</a></td><td>晴</td><td>1</td>
<td><a href="/race/{race_id}/">未勝利</a></td><td></td><td>ダ1200</td><td>16</td></tr>"#
        )
    }

    fn listing(rows: &[&str], next: Option<u32>) -> String {
        let rows: String = rows.iter().map(|id| listing_row(id)).collect();
        let pager = next
            .map(|n| format!(r#"<a href="javascript:paging('{n}')">次</a>"#))
            .unwrap_or_default();
        format!(
            r#"<html><body>
<form name="sort"><input type="hidden" name="serial" value="serial-token"></form>
<div class="pager">{pager}</div>
<table summary="レース検索結果"><tr><th>開催日</th></tr>{rows}</table>
</body></html>"#
        )
    }

    fn race_page(name: &str) -> String {
        format!(
            r#"<html><body><dl class="racedata"><dd><h1>{name}</h1>
<p><diary_snap_cut><span>ダ右1200m&nbsp;/&nbsp;天候 : 晴&nbsp;/&nbsp;ダート : 良&nbsp;/&nbsp;発走 : 10:05</span></diary_snap_cut></p>
</dd></dl>
<table class="race_table_01"><tr><th>着順</th></tr>
<tr><td>1</td><td>1</td><td>1</td><td><a href="/horse/2021100001/">ホースワン</a></td><td>牡3</td><td>56</td>
<td><a href="/jockey/01170/">横山武史</a></td><td>1:12.0</td><td></td><td>**</td><td>1-1</td><td>37.5</td>
<td>2.0</td><td>1</td><td>470(+4)</td><td></td><td></td><td></td>
<td><a href="/trainer/01102/">鹿戸雄一</a></td><td><a href="/owner/123456/">オーナー</a></td><td>560.0</td></tr>
</table></body></html>"#
        )
    }

    fn transport() -> FakeTransport {
        let mut pages = HashMap::new();
        pages.insert("listing:1".to_string(), listing(&["202406010101", "202406010102"], Some(2)));
        pages.insert("listing:2".to_string(), listing(&["202406010103"], None));
        pages.insert(
            "https://db.netkeiba.com/race/202406010101/".to_string(),
            race_page("3歳未勝利"),
        );
        pages.insert(
            "https://db.netkeiba.com/race/202406010102/".to_string(),
            "<html><body>maintenance</body></html>".to_string(),
        );
        pages.insert(
            "https://db.netkeiba.com/race/202406010103/".to_string(),
            race_page("3歳新馬"),
        );
        FakeTransport {
            pages,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn range() -> SearchRange {
        SearchRange {
            start_year: 2024,
            start_month: 1,
            end_year: 2024,
            end_month: 1,
        }
    }

    #[tokio::test]
    async fn test_crawl_walks_all_pages() {
        let transport = transport();
        let mut sink = JsonLinesSink::new(Vec::new());

        let summary = crawl(
            &transport,
            &SiteConfig::default(),
            &CrawlConfig::default(),
            &range(),
            &mut sink,
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            CrawlSummary {
                pages: 2,
                races: 2,
                failed: 1,
            }
        );

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let records: Vec<RaceRecord> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identifier.race_id, "202406010101");
        assert_eq!(records[0].race_name.as_deref(), Some("3歳未勝利"));
        assert_eq!(records[0].race_results.len(), 1);
        assert_eq!(records[1].identifier.race_id, "202406010103");
    }

    #[tokio::test]
    async fn test_second_page_uses_serial() {
        let transport = transport();
        let mut sink = JsonLinesSink::new(Vec::new());
        crawl(
            &transport,
            &SiteConfig::default(),
            &CrawlConfig::default(),
            &range(),
            &mut sink,
        )
        .await
        .unwrap();

        let requests = transport.requests.lock().unwrap();
        let posts: Vec<_> = requests.iter().filter(|r| r.has_body()).collect();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].form_value("start_year"), Some("2024"));
        assert_eq!(posts[0].form_value("list"), Some("20"));
        assert_eq!(posts[1].form_value("serial"), Some("serial-token"));
        assert_eq!(posts[1].form_value("page"), Some("2"));
    }

    #[tokio::test]
    async fn test_listing_failure_ends_crawl() {
        let transport = FakeTransport {
            pages: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        };
        let mut sink = JsonLinesSink::new(Vec::new());

        let result = crawl(
            &transport,
            &SiteConfig::default(),
            &CrawlConfig::default(),
            &range(),
            &mut sink,
        )
        .await;

        assert!(result.is_err());
        assert!(sink.into_inner().is_empty());
    }
}
