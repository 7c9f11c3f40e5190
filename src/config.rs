use crate::accounts::normalize_customer_id;
use clap::Args as ClapArgs;
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "https://googleads.googleapis.com";
const DEFAULT_API_VERSION: &str = "v16";
const CLIENT_SECRETS_FILE: &str = "credentials.json";
const DB_FILE: &str = "ads_data.sqlite";
const OAUTH_CALLBACK_PORT: u16 = 8080;

#[derive(ClapArgs, Debug, Clone)]
pub struct Config {
    /// Single advertiser account to process. All accessible accounts are used when absent.
    #[arg(long, env = "GOOGLE_ADS_CUSTOMER_ID")]
    pub(crate) customer_id: Option<String>,

    #[arg(long, env = "GOOGLE_ADS_DEVELOPER_TOKEN", hide_env_values = true)]
    pub(crate) developer_token: String,

    /// Manager account the requests are made on behalf of.
    #[arg(long, env = "GOOGLE_ADS_LOGIN_CUSTOMER_ID")]
    pub(crate) login_customer_id: Option<String>,

    #[arg(long, default_value = DEFAULT_API_URL, env = "GOOGLE_ADS_API_URL")]
    pub(crate) api_url: String,

    #[arg(long, default_value = DEFAULT_API_VERSION, env = "GOOGLE_ADS_API_VERSION")]
    pub(crate) api_version: String,

    #[arg(long, default_value = CLIENT_SECRETS_FILE, env = "GOOGLE_CLIENT_SECRETS_FILE")]
    pub(crate) client_secrets_file: PathBuf,

    #[arg(long, default_value_t = OAUTH_CALLBACK_PORT, env = "OAUTH_CALLBACK_PORT")]
    pub(crate) oauth_port: u16,

    #[arg(long, default_value = DB_FILE, env = "ADS_DB_FILE")]
    pub(crate) db_file: PathBuf,
}

impl Config {
    /// The configured target account, normalised. Blank values count as unset.
    pub fn customer_id(&self) -> Option<String> {
        self.customer_id.as_deref().and_then(normalize_customer_id)
    }

    pub fn login_customer_id(&self) -> Option<String> {
        self.login_customer_id
            .as_deref()
            .and_then(normalize_customer_id)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        customer_id: None,
        developer_token: "dev-token".to_string(),
        login_customer_id: None,
        api_url: "http://127.0.0.1:1".to_string(),
        api_version: DEFAULT_API_VERSION.to_string(),
        client_secrets_file: PathBuf::from(CLIENT_SECRETS_FILE),
        oauth_port: 0,
        db_file: PathBuf::from(DB_FILE),
    }
}
