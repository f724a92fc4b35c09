/// All catalog primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Operations are addressed by UUID so pollers cannot enumerate them.
pub type OperationId = uuid::Uuid;
