/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Identifier of a catalog product (root product or component product).
pub type ProductId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Calendar dates (validity windows of a BOM line) carry no time zone.
pub type Date = chrono::NaiveDate;
