use crate::data::CampaignMetricRecord;
use crate::error::Error;
use rusqlite::{params, Connection};
use std::path::Path;

const CREATE_CAMPAIGN_METRICS: &str = "
CREATE TABLE IF NOT EXISTS campaign_metrics (
    id INTEGER NOT NULL,
    customer_id TEXT NOT NULL,
    date TEXT NOT NULL,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    impressions INTEGER NOT NULL,
    clicks INTEGER NOT NULL,
    ctr REAL NOT NULL,
    cost_micros INTEGER NOT NULL,
    cpa_micros INTEGER,
    PRIMARY KEY (id, customer_id, date)
)";

const UPSERT_CAMPAIGN_METRICS: &str = "
INSERT OR REPLACE INTO campaign_metrics
    (id, customer_id, date, name, status, impressions, clicks, ctr, cost_micros, cpa_micros)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[cfg_attr(test, mockall::automock)]
pub trait MetricsStore {
    /// Creates the backing table when it does not exist yet. Existing rows are untouched.
    fn ensure_schema(&self) -> Result<(), Error>;

    /// Writes `record`, replacing any stored record with the same
    /// `(campaign_id, account_id, date)`.
    fn upsert(&self, record: &CampaignMetricRecord) -> Result<(), Error>;
}

/// SQLite-backed store holding one connection for the whole run.
pub struct SqliteMetricsStore {
    conn: Connection,
}

impl SqliteMetricsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Ok(SqliteMetricsStore { conn })
    }

    pub fn count(&self) -> Result<i64, Error> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM campaign_metrics", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl MetricsStore for SqliteMetricsStore {
    fn ensure_schema(&self) -> Result<(), Error> {
        self.conn.execute_batch(CREATE_CAMPAIGN_METRICS)?;
        Ok(())
    }

    fn upsert(&self, record: &CampaignMetricRecord) -> Result<(), Error> {
        self.conn.execute(
            UPSERT_CAMPAIGN_METRICS,
            params![
                record.campaign_id,
                record.account_id,
                record.date.format(DATE_FORMAT).to_string(),
                record.name,
                record.status.as_str(),
                record.impressions,
                record.clicks,
                record.ctr,
                record.cost_micros,
                record.cpa_micros,
            ],
        )?;
        Ok(())
    }
}
