//! Local logical clock.

/// Milliseconds since the Unix epoch, used to stamp `updated_at`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
