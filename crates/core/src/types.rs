/// Thread identifiers as reported by the monitored JVM.
pub type ThreadId = i64;

/// `System.identityHashCode` of a monitor or lock object.
pub type LockIdentity = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
