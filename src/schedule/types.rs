//! Schedule keys and buckets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Naive layouts accepted in addition to RFC 3339. They are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// An absolute instant truncated to the whole minute.
///
/// Renders as `YYYY-MM-DDTHH:MM:00.000Z`, which is also the on-disk key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleKey(DateTime<Utc>);

impl ScheduleKey {
    /// Truncate an instant to its minute.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let secs = at.timestamp();
        let floored = DateTime::from_timestamp(secs - secs.rem_euclid(60), 0).unwrap_or(at);
        Self(floored)
    }

    /// Parse a caller-supplied datetime.
    ///
    /// Accepts RFC 3339 with any offset (normalized to UTC) and a few naive
    /// layouts interpreted as UTC. Seconds and fractions are discarded.
    ///
    /// ```
    /// use sidekick::schedule::ScheduleKey;
    ///
    /// let key = ScheduleKey::parse("2024-01-15T14:30:45.120+03:00").unwrap();
    /// assert_eq!(key.to_string(), "2024-01-15T11:30:00.000Z");
    /// ```
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
            .map(|naive| Self::from_datetime(naive.and_utc()))
    }

    /// The current minute.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// The underlying instant.
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:00.000Z"))
    }
}

impl Serialize for ScheduleKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScheduleKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ScheduleKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid schedule key: {}", raw)))
    }
}

/// Why a removal was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveError {
    BucketNotFound,
    TaskNotFound,
}

/// Why an update was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    OldBucketNotFound,
    OldTaskNotFound,
}

/// Tasks grouped by the minute they are due.
///
/// A bucket holding an empty list means "no tasks"; drained buckets stay in
/// the map that way and are hidden from [`Schedule::listing`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    buckets: BTreeMap<ScheduleKey, Vec<String>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task` to the bucket at `key`, creating it if absent.
    pub fn add(&mut self, key: ScheduleKey, task: impl Into<String>) {
        self.buckets.entry(key).or_default().push(task.into());
    }

    /// Remove the first exact occurrence of `task` from the bucket at `key`.
    pub fn remove(&mut self, key: &ScheduleKey, task: &str) -> Result<(), RemoveError> {
        let bucket = self
            .buckets
            .get_mut(key)
            .ok_or(RemoveError::BucketNotFound)?;
        let index = bucket
            .iter()
            .position(|t| t == task)
            .ok_or(RemoveError::TaskNotFound)?;
        bucket.remove(index);
        Ok(())
    }

    /// Move `old_task` at `old_key` to `new_task` at `new_key`.
    ///
    /// The new entry is written before the old one is removed, and the whole
    /// operation is validated up front, so a rejected update changes nothing.
    pub fn update(
        &mut self,
        old_key: &ScheduleKey,
        old_task: &str,
        new_key: ScheduleKey,
        new_task: impl Into<String>,
    ) -> Result<(), UpdateError> {
        let index = self
            .buckets
            .get(old_key)
            .ok_or(UpdateError::OldBucketNotFound)?
            .iter()
            .position(|t| t == old_task)
            .ok_or(UpdateError::OldTaskNotFound)?;

        // Appending never shifts earlier positions, so `index` stays valid
        // even when both keys name the same bucket.
        self.buckets.entry(new_key).or_default().push(new_task.into());
        if let Some(bucket) = self.buckets.get_mut(old_key) {
            bucket.remove(index);
        }
        Ok(())
    }

    /// Tasks stored at `key`.
    pub fn bucket(&self, key: &ScheduleKey) -> Option<&[String]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Non-empty buckets keyed by their rendered instant.
    pub fn listing(&self) -> BTreeMap<String, Vec<String>> {
        self.buckets
            .iter()
            .filter(|(_, tasks)| !tasks.is_empty())
            .map(|(key, tasks)| (key.to_string(), tasks.clone()))
            .collect()
    }

    /// Total number of tasks not yet performed.
    pub fn pending_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Non-empty buckets due at or before `now` (compared at minute precision).
    pub fn due(&self, now: DateTime<Utc>) -> Vec<(ScheduleKey, Vec<String>)> {
        let now = ScheduleKey::from_datetime(now);
        self.buckets
            .range(..=now)
            .filter(|(_, tasks)| !tasks.is_empty())
            .map(|(key, tasks)| (*key, tasks.clone()))
            .collect()
    }

    /// Remove the tasks that were just performed from the bucket at `key`.
    ///
    /// Tasks are matched by value, one occurrence each, so anything appended
    /// to the bucket after `dispatched` was snapshotted stays scheduled.
    /// Returns true if the bucket changed.
    pub fn drain(&mut self, key: &ScheduleKey, dispatched: &[String]) -> bool {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let before = bucket.len();
        for task in dispatched {
            if let Some(index) = bucket.iter().position(|t| t == task) {
                bucket.remove(index);
            }
        }
        bucket.len() != before
    }

    /// Number of buckets, including drained ones.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(raw: &str) -> ScheduleKey {
        ScheduleKey::parse(raw).unwrap()
    }

    #[test]
    fn test_key_truncates_seconds_and_millis() {
        assert_eq!(
            key("2024-01-15T14:30:59.999Z").to_string(),
            "2024-01-15T14:30:00.000Z"
        );
        assert_eq!(key("2024-01-15T14:30:00Z"), key("2024-01-15T14:30:42Z"));
    }

    #[test]
    fn test_key_normalizes_offsets() {
        assert_eq!(
            key("2024-01-15T14:30:00+03:00").to_string(),
            "2024-01-15T11:30:00.000Z"
        );
        assert_eq!(
            key("2024-01-15T14:30:00-05:00").to_string(),
            "2024-01-15T19:30:00.000Z"
        );
    }

    #[test]
    fn test_key_accepts_naive_forms_as_utc() {
        assert_eq!(key("2024-01-15T14:30").to_string(), "2024-01-15T14:30:00.000Z");
        assert_eq!(
            key("2024-01-15 14:30:10").to_string(),
            "2024-01-15T14:30:00.000Z"
        );
    }

    #[test]
    fn test_key_rejects_garbage() {
        assert!(ScheduleKey::parse("tomorrow at ten").is_none());
        assert!(ScheduleKey::parse("").is_none());
    }

    #[test]
    fn test_key_before_epoch_truncates_down() {
        let at = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
        assert_eq!(
            ScheduleKey::from_datetime(at).to_string(),
            "1969-12-31T23:59:00.000Z"
        );
    }

    #[test]
    fn test_add_appends_in_order() {
        let mut schedule = Schedule::new();
        let k = key("2024-01-15T10:00:00Z");
        schedule.add(k, "first");
        schedule.add(key("2024-01-15T10:00:30Z"), "second");
        assert_eq!(schedule.bucket(&k).unwrap(), ["first", "second"]);
        assert_eq!(schedule.pending_count(), 2);
    }

    #[test]
    fn test_remove_missing_bucket_and_task() {
        let mut schedule = Schedule::new();
        let k = key("2024-01-15T10:00:00Z");
        assert_eq!(
            schedule.remove(&k, "anything"),
            Err(RemoveError::BucketNotFound)
        );

        schedule.add(k, "call mom");
        assert_eq!(schedule.remove(&k, "call dad"), Err(RemoveError::TaskNotFound));
        assert_eq!(schedule.bucket(&k).unwrap(), ["call mom"]);
    }

    #[test]
    fn test_remove_first_exact_match_only() {
        let mut schedule = Schedule::new();
        let k = key("2024-01-15T10:00:00Z");
        schedule.add(k, "water plants");
        schedule.add(k, "water plants");
        schedule.remove(&k, "water plants").unwrap();
        assert_eq!(schedule.bucket(&k).unwrap(), ["water plants"]);
    }

    #[test]
    fn test_update_moves_between_buckets() {
        let mut schedule = Schedule::new();
        let old = key("2024-01-15T10:00:00Z");
        let new = key("2024-01-16T12:00:00Z");
        schedule.add(old, "Remind the user about the dentist");

        schedule
            .update(&old, "Remind the user about the dentist", new, "Remind the user about the doctor")
            .unwrap();

        assert!(schedule.bucket(&old).unwrap().is_empty());
        assert_eq!(
            schedule.bucket(&new).unwrap(),
            ["Remind the user about the doctor"]
        );
        assert_eq!(schedule.pending_count(), 1);
    }

    #[test]
    fn test_update_within_same_bucket_leaves_one_occurrence() {
        let mut schedule = Schedule::new();
        let k = key("2024-01-15T10:00:00Z");
        schedule.add(k, "a");
        schedule.add(k, "task");
        schedule.add(k, "b");

        schedule.update(&k, "task", k, "task").unwrap();

        let bucket = schedule.bucket(&k).unwrap();
        assert_eq!(bucket.iter().filter(|t| *t == "task").count(), 1);
        assert_eq!(bucket, ["a", "b", "task"]);
    }

    #[test]
    fn test_update_rejections_change_nothing() {
        let mut schedule = Schedule::new();
        let k = key("2024-01-15T10:00:00Z");
        let other = key("2024-01-15T11:00:00Z");
        assert_eq!(
            schedule.update(&k, "x", other, "y"),
            Err(UpdateError::OldBucketNotFound)
        );
        schedule.add(k, "real");
        assert_eq!(
            schedule.update(&k, "x", other, "y"),
            Err(UpdateError::OldTaskNotFound)
        );
        assert!(schedule.bucket(&other).is_none());
    }

    #[test]
    fn test_due_is_inclusive_and_skips_empty() {
        let mut schedule = Schedule::new();
        schedule.add(key("2024-01-15T09:59:00Z"), "past");
        schedule.add(key("2024-01-15T10:00:00Z"), "now");
        schedule.add(key("2024-01-15T10:01:00Z"), "future");
        schedule.add(key("2024-01-15T09:00:00Z"), "drained");
        schedule.drain(&key("2024-01-15T09:00:00Z"), &["drained".to_string()]);

        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 45).unwrap();
        let due: Vec<String> = schedule
            .due(now)
            .into_iter()
            .flat_map(|(_, tasks)| tasks)
            .collect();
        assert_eq!(due, ["past", "now"]);
    }

    #[test]
    fn test_drain_keeps_tasks_added_after_snapshot() {
        let mut schedule = Schedule::new();
        let k = key("2024-01-15T10:00:00Z");
        schedule.add(k, "old");
        let snapshot = schedule.bucket(&k).unwrap().to_vec();
        schedule.add(k, "late arrival");

        assert!(schedule.drain(&k, &snapshot));
        assert_eq!(schedule.bucket(&k).unwrap(), ["late arrival"]);
    }

    #[test]
    fn test_listing_hides_empty_buckets() {
        let mut schedule = Schedule::new();
        let k = key("2024-01-15T10:00:00Z");
        schedule.add(k, "done");
        schedule.drain(&k, &["done".to_string()]);
        schedule.add(key("2024-02-01T08:00:00Z"), "pending");

        let listing = schedule.listing();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing["2024-02-01T08:00:00.000Z"], ["pending"]);
        assert_eq!(schedule.bucket_count(), 2);
    }

    #[test]
    fn test_document_shape() {
        let mut schedule = Schedule::new();
        schedule.add(key("2024-01-15T10:00:00Z"), "task");
        let json = serde_json::to_string(&schedule).unwrap();
        assert_eq!(json, r#"{"2024-01-15T10:00:00.000Z":["task"]}"#);

        let restored: Schedule = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, schedule);
    }
}
