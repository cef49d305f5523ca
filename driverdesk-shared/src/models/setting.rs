/// Application settings
///
/// Key/value pairs edited from the back office. Driver apps only see the
/// keys in [`DRIVER_SETTING_KEYS`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE app_settings (
///     key VARCHAR(127) PRIMARY KEY,
///     value TEXT NOT NULL
/// );
/// ```

use sqlx::PgPool;
use std::collections::BTreeMap;

/// Settings exposed to driver apps
pub const DRIVER_SETTING_KEYS: [&str; 6] = [
    "default_tax",
    "default_currency",
    "app_name",
    "currency_right",
    "enable_paypal",
    "enable_stripe",
];

/// Keeps only the driver-visible keys
///
/// Keys missing from `all` are omitted rather than defaulted.
pub fn driver_settings(all: BTreeMap<String, String>) -> BTreeMap<String, String> {
    all.into_iter()
        .filter(|(key, _)| DRIVER_SETTING_KEYS.contains(&key.as_str()))
        .collect()
}

/// Loads every stored setting
pub async fn load_all(pool: &PgPool) -> Result<BTreeMap<String, String>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM app_settings")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_settings_filters_to_allow_list() {
        let mut all = BTreeMap::new();
        all.insert("app_name".to_string(), "RideNow".to_string());
        all.insert("default_currency".to_string(), "$".to_string());
        all.insert("mail_password".to_string(), "secret".to_string());
        all.insert("google_maps_key".to_string(), "AIza".to_string());

        let filtered = driver_settings(all);

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered["app_name"], "RideNow");
        assert!(!filtered.contains_key("mail_password"));
    }

    #[test]
    fn test_driver_settings_omits_missing_keys() {
        let filtered = driver_settings(BTreeMap::new());
        assert!(filtered.is_empty());
    }
}
