use crate::api_client::{AdsApi, RawRow};
use crate::error::Error;
use log::debug;
use std::collections::VecDeque;

/// Per-campaign daily metrics for the trailing week, non-removed campaigns only.
pub const CAMPAIGN_METRICS_QUERY: &str = "\
SELECT
    campaign.id,
    campaign.name,
    campaign.status,
    metrics.impressions,
    metrics.clicks,
    metrics.ctr,
    metrics.cost_micros,
    metrics.average_cpa_micros,
    segments.date
FROM campaign
WHERE campaign.status != 'REMOVED'
AND segments.date DURING LAST_7_DAYS
LIMIT 100";

pub struct ReportingClient<'a, A: AdsApi> {
    api: &'a A,
}

impl<'a, A: AdsApi> ReportingClient<'a, A> {
    pub fn new(api: &'a A) -> Self {
        ReportingClient { api }
    }

    /// Starts the campaign metrics query for `account_id`. Nothing is sent until
    /// the returned stream is first polled.
    pub fn fetch(&self, account_id: &str) -> RowStream<'a, A> {
        RowStream {
            api: self.api,
            account_id: account_id.to_string(),
            buffered: VecDeque::new(),
            next_page: Some(None),
        }
    }
}

/// Rows of one account's query in server order. Pages are requested only when
/// the previous one has been consumed.
pub struct RowStream<'a, A: AdsApi> {
    api: &'a A,
    account_id: String,
    buffered: VecDeque<RawRow>,
    // `Some(token)` while another page may follow; `Some(None)` is the first page.
    next_page: Option<Option<String>>,
}

impl<A: AdsApi> RowStream<'_, A> {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Returns the next row, `Ok(None)` once the result set is exhausted.
    ///
    /// A platform failure is reported as [`Error::Reporting`] for this account and
    /// ends the stream.
    pub async fn try_next(&mut self) -> Result<Option<RawRow>, Error> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Ok(Some(row));
            }

            let Some(page_token) = self.next_page.take() else {
                return Ok(None);
            };

            let page = self
                .api
                .search(&self.account_id, CAMPAIGN_METRICS_QUERY, page_token)
                .await
                .map_err(|err| match err {
                    Error::Platform { errors, .. } => Error::Reporting {
                        account_id: self.account_id.clone(),
                        errors,
                    },
                    other => other,
                })?;

            debug!(
                "account {}: received page of {} rows",
                self.account_id,
                page.results.len()
            );
            self.buffered.extend(page.results);
            self.next_page = page
                .next_page_token
                .filter(|token| !token.is_empty())
                .map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{MockAdsApi, SearchPage};
    use crate::test_support::spring_sale_row;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use reqwest::StatusCode;

    fn row(id: i64) -> RawRow {
        let mut row = spring_sale_row();
        row.campaign.id = id;
        row
    }

    #[test]
    fn test_query_is_scoped() {
        assert!(CAMPAIGN_METRICS_QUERY.contains("campaign.status != 'REMOVED'"));
        assert!(CAMPAIGN_METRICS_QUERY.contains("DURING LAST_7_DAYS"));
        assert!(CAMPAIGN_METRICS_QUERY.ends_with("LIMIT 100"));
        assert!(CAMPAIGN_METRICS_QUERY.contains("metrics.average_cpa_micros"));
    }

    #[tokio::test]
    async fn test_fetch_is_lazy() {
        let mut api = MockAdsApi::new();
        api.expect_search().never();

        let client = ReportingClient::new(&api);
        let stream = client.fetch("111");
        assert_eq!(stream.account_id(), "111");
    }

    #[tokio::test]
    async fn test_rows_follow_pages_in_order() {
        let mut api = MockAdsApi::new();
        let mut seq = Sequence::new();
        api.expect_search()
            .with(eq("111"), eq(CAMPAIGN_METRICS_QUERY), eq(None::<String>))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(SearchPage {
                    results: vec![row(1), row(2)],
                    next_page_token: Some("page-2".to_string()),
                })
            });
        api.expect_search()
            .with(
                eq("111"),
                eq(CAMPAIGN_METRICS_QUERY),
                eq(Some("page-2".to_string())),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(SearchPage {
                    results: vec![row(3)],
                    next_page_token: Some(String::new()),
                })
            });

        let client = ReportingClient::new(&api);
        let mut stream = client.fetch("111");

        let mut ids = Vec::new();
        while let Some(row) = stream.try_next().await.unwrap() {
            ids.push(row.campaign.id);
        }
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(stream.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_result_set() {
        let mut api = MockAdsApi::new();
        api.expect_search()
            .times(1)
            .returning(|_, _, _| Ok(SearchPage::default()));

        let client = ReportingClient::new(&api);
        let mut stream = client.fetch("111");
        assert!(stream.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_platform_failure_is_attributed_to_account() {
        let mut api = MockAdsApi::new();
        api.expect_search().times(1).returning(|_, _, _| {
            Err(Error::Platform {
                status: StatusCode::BAD_REQUEST,
                errors: vec!["INVALID_QUERY".to_string()],
            })
        });

        let client = ReportingClient::new(&api);
        let mut stream = client.fetch("111");

        assert!(matches!(
            stream.try_next().await.unwrap_err(),
            Error::Reporting { account_id, errors }
                if account_id == "111" && errors == vec!["INVALID_QUERY".to_string()]
        ));
        assert!(stream.try_next().await.unwrap().is_none());
    }
}
