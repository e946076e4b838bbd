/// Entity and QR identifiers are canonical lowercase UUID strings.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
