use crate::accounts::resolve_accounts;
use crate::api_client::{AdsApi, GoogleAdsClient};
use crate::auth::{Authenticator, Credential, InstalledAppFlow};
use crate::config::Config;
use crate::data::CampaignMetricRecord;
use crate::error::Error;
use crate::reporting::{ReportingClient, RowStream};
use crate::store::{MetricsStore, SqliteMetricsStore};
use log::{debug, info};
use std::io::Write;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub accounts: usize,
    pub rows: usize,
}

pub async fn run<W: Write>(config: Config, out: &mut W) -> Result<RunSummary, Error> {
    let store = SqliteMetricsStore::open(&config.db_file)?;
    let authenticator = InstalledAppFlow::new(&config);

    let summary = run_pipeline(
        &config,
        &store,
        &authenticator,
        |credential| GoogleAdsClient::new(&config, credential),
        out,
    )
    .await?;

    info!(
        "{} now holds {} records",
        config.db_file.display(),
        store.count()?
    );
    Ok(summary)
}

/// Loads the last week of campaign metrics of every target account into `store`.
///
/// Accounts are processed one after another. A reporting failure is printed to
/// `out` and ends the run; accounts after the failing one are not attempted.
pub async fn run_pipeline<S, Au, A, F, W>(
    config: &Config,
    store: &S,
    authenticator: &Au,
    connect: F,
    out: &mut W,
) -> Result<RunSummary, Error>
where
    S: MetricsStore,
    Au: Authenticator,
    A: AdsApi,
    F: FnOnce(Credential) -> A,
    W: Write,
{
    store.ensure_schema()?;
    debug!("schema ready");

    let credential = authenticator.authenticate().await?;
    info!("authenticated");
    let api = connect(credential);

    let account_ids = resolve_accounts(config.customer_id().as_deref(), &api).await?;
    info!("processing {} accounts", account_ids.len());

    let reporting = ReportingClient::new(&api);
    let mut summary = RunSummary::default();

    for account_id in &account_ids {
        let mut rows = reporting.fetch(account_id);

        let written = match store_rows(&mut rows, store, out).await {
            Ok(written) => written,
            Err(Error::Reporting { account_id, errors }) => {
                report_failure(out, &account_id, &errors)?;
                return Err(Error::Reporting { account_id, errors });
            }
            Err(err) => return Err(err),
        };

        info!("account {}: stored {} rows", account_id, written);
        summary.accounts += 1;
        summary.rows += written;
    }

    Ok(summary)
}

async fn store_rows<A, S, W>(
    rows: &mut RowStream<'_, A>,
    store: &S,
    out: &mut W,
) -> Result<usize, Error>
where
    A: AdsApi,
    S: MetricsStore,
    W: Write,
{
    let mut written = 0;

    while let Some(row) = rows.try_next().await? {
        let record = CampaignMetricRecord::from_row(rows.account_id(), row)?;
        store.upsert(&record)?;
        writeln!(out, "{}", record.success_line())?;
        written += 1;
    }

    Ok(written)
}

fn report_failure<W: Write>(out: &mut W, account_id: &str, errors: &[String]) -> Result<(), Error> {
    writeln!(out, "❌ API error for {}:", account_id)?;
    for message in errors {
        writeln!(out, " - {}", message)?;
    }
    Ok(())
}
