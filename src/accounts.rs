use crate::api_client::AdsApi;
use crate::error::Error;
use log::info;

const CUSTOMER_RESOURCE_PREFIX: &str = "customers/";

/// Strips whitespace and `-` separators (`123-456-7890` becomes `1234567890`).
/// Blank input yields `None`.
pub fn normalize_customer_id(raw: &str) -> Option<String> {
    let id: String = raw.trim().chars().filter(|c| *c != '-').collect();
    if id.is_empty() {
        return None;
    }
    Some(id)
}

/// Resolves the accounts a run processes.
///
/// # Arguments
/// * `configured` - An explicitly configured account; when present it is the only one used
///   and the platform is not asked.
/// * `api` - Used to list the accounts accessible to the authenticated identity otherwise.
///
/// # Returns
/// Bare account ids in the order the platform listed them, or [`Error::AccountListing`].
pub async fn resolve_accounts<A: AdsApi>(
    configured: Option<&str>,
    api: &A,
) -> Result<Vec<String>, Error> {
    if let Some(account_id) = configured {
        return Ok(vec![account_id.to_string()]);
    }

    let resource_names = api
        .list_accessible_customers()
        .await
        .map_err(|err| match err {
            Error::Platform { errors, .. } => Error::AccountListing { errors },
            other => other,
        })?;

    let account_ids: Vec<String> = resource_names
        .iter()
        .map(|name| {
            name.strip_prefix(CUSTOMER_RESOURCE_PREFIX)
                .unwrap_or(name)
                .to_string()
        })
        .collect();
    info!("found {} accessible accounts", account_ids.len());

    Ok(account_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::MockAdsApi;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn test_configured_account_skips_listing() {
        let mut api = MockAdsApi::new();
        api.expect_list_accessible_customers().never();

        let accounts = resolve_accounts(Some("555"), &api).await.unwrap();
        assert_eq!(accounts, vec!["555"]);
    }

    #[tokio::test]
    async fn test_accessible_accounts_are_unprefixed_in_order() {
        let mut api = MockAdsApi::new();
        api.expect_list_accessible_customers()
            .times(1)
            .returning(|| Ok(vec!["customers/111".to_string(), "customers/222".to_string()]));

        let accounts = resolve_accounts(None, &api).await.unwrap();
        assert_eq!(accounts, vec!["111", "222"]);
    }

    #[tokio::test]
    async fn test_no_accessible_accounts() {
        let mut api = MockAdsApi::new();
        api.expect_list_accessible_customers()
            .returning(|| Ok(vec![]));

        let accounts = resolve_accounts(None, &api).await.unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let mut api = MockAdsApi::new();
        api.expect_list_accessible_customers().returning(|| {
            Err(Error::Platform {
                status: StatusCode::FORBIDDEN,
                errors: vec!["USER_PERMISSION_DENIED".to_string()],
            })
        });

        assert!(matches!(
            resolve_accounts(None, &api).await.unwrap_err(),
            Error::AccountListing { errors } if errors == vec!["USER_PERMISSION_DENIED".to_string()]
        ));
    }

    #[test]
    fn test_normalize_customer_id() {
        assert_eq!(normalize_customer_id("123-456-7890"), Some("1234567890".to_string()));
        assert_eq!(normalize_customer_id(" 42 "), Some("42".to_string()));
        assert_eq!(normalize_customer_id("   "), None);
        assert_eq!(normalize_customer_id(""), None);
    }
}
