/// Custom fields: schema-defined, per-model account attributes
///
/// Custom field definitions are configured from the back office and scoped to
/// a model name. Values are stored one row per (account, field) pair so an
/// upsert with the same `custom_field_id` replaces the previous value.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE custom_fields (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(127) NOT NULL,
///     field_type VARCHAR(56) NOT NULL,
///     custom_field_model VARCHAR(127) NOT NULL,
///     required BOOLEAN NOT NULL DEFAULT FALSE,
///     sort_order INTEGER NOT NULL DEFAULT 0
/// );
///
/// CREATE TABLE custom_field_values (
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     custom_field_id BIGINT NOT NULL REFERENCES custom_fields(id) ON DELETE CASCADE,
///     value JSONB NOT NULL,
///     view TEXT NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (account_id, custom_field_id)
/// );
/// ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Model name under which account custom fields are registered
pub const ACCOUNT_MODEL: &str = "account";

/// Custom field definition
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomField {
    /// Field ID
    pub id: i64,

    /// Field name, also the key expected in request payloads
    pub name: String,

    /// Input type (text, number, boolean, select, ...)
    pub field_type: String,

    /// Model the field belongs to
    pub custom_field_model: String,

    /// Whether the back office marks the field as required
    pub required: bool,

    /// Display order
    pub sort_order: i32,
}

/// Stored value of a custom field for one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomFieldValue {
    /// Field the value belongs to
    pub custom_field_id: i64,

    /// Field name, denormalized for responses
    pub name: String,

    /// Raw value as supplied by the client
    pub value: JsonValue,

    /// Human readable rendering of the value
    pub view: String,
}

/// Value extracted from a request, ready to be upserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomFieldValue {
    /// Field the value belongs to
    pub custom_field_id: i64,

    /// Field name
    pub name: String,

    /// Raw value
    pub value: JsonValue,
}

impl NewCustomFieldValue {
    /// Display rendering: strings unquoted, everything else as JSON text
    pub fn view(&self) -> String {
        render_view(&self.value)
    }

    /// Converts into the stored representation
    pub fn into_stored(self) -> CustomFieldValue {
        let view = self.view();
        CustomFieldValue {
            custom_field_id: self.custom_field_id,
            name: self.name,
            value: self.value,
            view,
        }
    }
}

fn render_view(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pairs each schema field with the value supplied for it in `input`
///
/// Fields without a supplied value are skipped, so an update only touches
/// the custom fields the client sent. Output follows schema order.
///
/// # Example
///
/// ```
/// use driverdesk_shared::models::custom_field::{extract_values, CustomField};
/// use serde_json::json;
///
/// let fields = vec![CustomField {
///     id: 7,
///     name: "bio".to_string(),
///     field_type: "text".to_string(),
///     custom_field_model: "account".to_string(),
///     required: false,
///     sort_order: 0,
/// }];
/// let input = json!({ "bio": "Night shifts only", "unknown": 1 });
///
/// let values = extract_values(&fields, input.as_object().unwrap());
/// assert_eq!(values.len(), 1);
/// assert_eq!(values[0].custom_field_id, 7);
/// ```
pub fn extract_values(
    fields: &[CustomField],
    input: &Map<String, JsonValue>,
) -> Vec<NewCustomFieldValue> {
    fields
        .iter()
        .filter_map(|field| {
            input.get(&field.name).map(|value| NewCustomFieldValue {
                custom_field_id: field.id,
                name: field.name.clone(),
                value: value.clone(),
            })
        })
        .collect()
}

impl CustomField {
    /// Lists the fields registered for a model, in display order
    pub async fn for_model(pool: &PgPool, model: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CustomField>(
            r#"
            SELECT id, name, field_type, custom_field_model, required, sort_order
            FROM custom_fields
            WHERE custom_field_model = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(model)
        .fetch_all(pool)
        .await
    }
}

impl CustomFieldValue {
    /// Inserts or replaces the value keyed by (account, custom_field_id)
    pub async fn upsert(
        conn: &mut PgConnection,
        account_id: Uuid,
        value: NewCustomFieldValue,
    ) -> Result<(), sqlx::Error> {
        let view = value.view();

        sqlx::query(
            r#"
            INSERT INTO custom_field_values (account_id, custom_field_id, value, view)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id, custom_field_id)
            DO UPDATE SET value = EXCLUDED.value, view = EXCLUDED.view, updated_at = NOW()
            "#,
        )
        .bind(account_id)
        .bind(value.custom_field_id)
        .bind(value.value)
        .bind(view)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Lists the values stored for an account
    pub async fn list_for_account(
        pool: &PgPool,
        account_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CustomFieldValue>(
            r#"
            SELECT v.custom_field_id, f.name, v.value, v.view
            FROM custom_field_values v
            JOIN custom_fields f ON f.id = v.custom_field_id
            WHERE v.account_id = $1
            ORDER BY f.sort_order, f.id
            "#,
        )
        .bind(account_id)
        .fetch_all(pool)
        .await
    }
}
