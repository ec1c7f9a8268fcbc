/// Database row types for the items table. Numeric normalization into the
/// domain types happens in the store, once, at this boundary.

#[derive(Debug, sqlx::FromRow)]
pub struct ItemRow {
    pub id: String,
    pub url: Option<String>,
    pub description: String,
    pub current_price: Option<f64>,
    pub points: Option<f64>,
    pub has_sale: i64,
    pub last_notification: Option<String>,
    pub updated_at: Option<String>,
}

/// The run-lock row, read through the same table under the reserved id.
#[derive(Debug, sqlx::FromRow)]
pub struct LockRow {
    pub status: Option<String>,
    pub started_at: Option<String>,
    pub expires_at: Option<String>,
    pub function_name: Option<String>,
}
