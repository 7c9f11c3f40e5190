use crate::api_client::RawRow;
use crate::error::Error;
use chrono::NaiveDate;
use serde::Deserialize;

/// Serving status of a campaign as reported by the platform.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(from = "String")]
pub enum CampaignStatus {
    #[default]
    Unspecified,
    Unknown,
    Enabled,
    Paused,
    Removed,
    /// A status this build does not know about yet, kept verbatim.
    Other(String),
}

impl CampaignStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CampaignStatus::Unspecified => "UNSPECIFIED",
            CampaignStatus::Unknown => "UNKNOWN",
            CampaignStatus::Enabled => "ENABLED",
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Removed => "REMOVED",
            CampaignStatus::Other(status) => status,
        }
    }
}

impl From<String> for CampaignStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "UNSPECIFIED" => CampaignStatus::Unspecified,
            "UNKNOWN" => CampaignStatus::Unknown,
            "ENABLED" => CampaignStatus::Enabled,
            "PAUSED" => CampaignStatus::Paused,
            "REMOVED" => CampaignStatus::Removed,
            _ => CampaignStatus::Other(status),
        }
    }
}

/// Latest known metrics for one campaign of one account on one day.
///
/// `(campaign_id, account_id, date)` is the identity of a record; everything
/// else is overwritten whenever the same triple is fetched again.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignMetricRecord {
    pub campaign_id: i64,
    pub account_id: String,
    pub date: NaiveDate,
    pub name: String,
    pub status: CampaignStatus,
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub cost_micros: i64,
    pub cpa_micros: Option<i64>,
}

impl CampaignMetricRecord {
    /// Maps a reporting row fetched for `account_id` into a record.
    ///
    /// # Returns
    /// A Result containing either the record or an [`Error`] when the row's
    /// date is not `YYYY-MM-DD` or a counter is negative.
    pub fn from_row(account_id: &str, row: RawRow) -> Result<Self, Error> {
        let metrics = row.metrics;

        Ok(CampaignMetricRecord {
            campaign_id: row.campaign.id,
            account_id: account_id.to_string(),
            date: parse_date(&row.segments.date)?,
            name: row.campaign.name,
            status: row.campaign.status,
            impressions: non_negative("impressions", metrics.impressions)?,
            clicks: non_negative("clicks", metrics.clicks)?,
            ctr: non_negative_ratio("ctr", metrics.ctr)?,
            cost_micros: non_negative("cost_micros", metrics.cost_micros)?,
            cpa_micros: metrics
                .average_cpa_micros
                .map(|cpa| non_negative("cpa_micros", cpa))
                .transpose()?,
        })
    }

    /// The console acknowledgement printed once the record is stored.
    pub fn success_line(&self) -> String {
        format!("✅ [{}] {} – CTR: {:?}%", self.account_id, self.name, self.ctr)
    }
}

pub(crate) fn parse_date(date: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| Error::InvalidDate {
        date: date.to_string(),
    })
}

fn non_negative(field: &'static str, value: i64) -> Result<i64, Error> {
    if value < 0 {
        return Err(Error::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn non_negative_ratio(field: &'static str, value: f64) -> Result<f64, Error> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}
