use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::{debug, info, Level};
use logging_timer::timer;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::ActivityError;

/// Page size used when the caller gives no usable `limit`
pub const DEFAULT_LIMIT: usize = 50;
/// Page start used when the caller gives no usable `offset`
pub const DEFAULT_OFFSET: usize = 0;

/// A single logged event.
///
/// Fields a caller supplies beyond the known ones are carried in `extra` and
/// serialized back at the top level of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub activity_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(rename = "userId", default, deserialize_with = "null_as_default")]
    pub user_id: String,

    #[serde(
        serialize_with = "serialize_timestamp",
        deserialize_with = "deserialize_timestamp",
        default = "Utc::now"
    )]
    pub timestamp: DateTime<Utc>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Millisecond precision with a trailing `Z`, the shape browsers produce for Date values
fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// `null` reads the same as an absent field
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(d).map(Option::unwrap_or_default)
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

impl Activity {
    /// Builds a record from an arbitrary JSON payload. `id` and `timestamp`
    /// are always the server's, whatever the payload carried.
    pub fn from_payload(
        payload: Value,
        id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ActivityError> {
        let mut fields = match payload {
            Value::Object(fields) => fields,
            other => {
                return Err(ActivityError::Internal(format!(
                    "Activity payload must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        // Drop caller values so they cannot fail timestamp parsing or leak into `extra`
        fields.remove("id");
        fields.remove("timestamp");

        let mut activity: Activity = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ActivityError::Internal(e.to_string()))?;
        activity.id = id;
        activity.timestamp = timestamp;

        Ok(activity)
    }

    fn numeric_id(&self) -> Option<i64> {
        self.id.parse::<i64>().ok()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Pagination envelope returned by the list operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPage {
    pub activities: Vec<Activity>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Counts over the trailing 24 hours
#[derive(Debug, Clone, Serialize)]
pub struct ActivityStats {
    pub total: usize,
    #[serde(rename = "last24Hours")]
    pub last_24_hours: usize,
    /// Type counts in first-encounter order
    #[serde(rename = "typeCounts", serialize_with = "serialize_type_counts")]
    pub type_counts: Vec<(String, usize)>,
    #[serde(rename = "mostActiveType")]
    pub most_active_type: String,
}

fn serialize_type_counts<S: Serializer>(
    counts: &[(String, usize)],
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_map(counts.iter().map(|(k, v)| (k, v)))
}

/// Owns every activity record for the life of the process.
///
/// Appends take the write lock; queries copy matching records under the read
/// lock and sort outside it.
pub struct ActivityStore {
    activities: RwLock<Vec<Activity>>,
}

impl Default for ActivityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityStore {
    pub fn new() -> Self {
        Self {
            activities: RwLock::new(Vec::new()),
        }
    }

    pub fn with_activities(activities: Vec<Activity>) -> Self {
        Self {
            activities: RwLock::new(activities),
        }
    }

    /// Store holding the three demo records, timestamped relative to now
    pub fn seeded() -> Self {
        Self::with_activities(seed_activities(Utc::now()))
    }

    pub fn len(&self) -> usize {
        self.activities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.read().is_empty()
    }

    /// Filter by exact type (when given), newest first, then page.
    pub fn list(&self, activity_type: Option<&str>, limit: usize, offset: usize) -> ActivityPage {
        let _tmr = timer!(Level::Trace; "ActivityStore::list");

        let matching = self.collect_sorted(|a| match activity_type {
            Some(t) => a.activity_type == t,
            None => true,
        });

        let total = matching.len();
        let activities = matching.into_iter().skip(offset).take(limit).collect();

        ActivityPage {
            activities,
            total,
            limit,
            offset,
        }
    }

    pub fn get(&self, id: &str) -> Result<Activity, ActivityError> {
        self.activities
            .read()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(ActivityError::NotFound)
    }

    pub fn by_type(&self, activity_type: &str, limit: usize) -> Vec<Activity> {
        let _tmr = timer!(Level::Trace; "ActivityStore::by_type", "{}", activity_type);
        let mut matching = self.collect_sorted(|a| a.activity_type == activity_type);
        matching.truncate(limit);
        matching
    }

    pub fn by_user(&self, user_id: &str, limit: usize) -> Vec<Activity> {
        let _tmr = timer!(Level::Trace; "ActivityStore::by_user", "{}", user_id);
        let mut matching = self.collect_sorted(|a| a.user_id == user_id);
        matching.truncate(limit);
        matching
    }

    /// Builds a record from `payload`, assigns id and timestamp, and appends it.
    pub fn create(&self, payload: Value) -> Result<Activity, ActivityError> {
        self.create_at(payload, Utc::now())
    }

    pub fn create_at(&self, payload: Value, now: DateTime<Utc>) -> Result<Activity, ActivityError> {
        let mut activities = self.activities.write();

        let id = next_id(&activities, now);
        let activity = Activity::from_payload(payload, id, now)?;
        activities.push(activity.clone());

        info!(
            "Created activity {} (type: '{}', user: '{}')",
            activity.id, activity.activity_type, activity.user_id
        );
        Ok(activity)
    }

    pub fn stats(&self) -> ActivityStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> ActivityStats {
        let _tmr = timer!(Level::Trace; "ActivityStore::stats");
        let since = now - Duration::hours(24);

        let activities = self.activities.read();
        let total = activities.len();

        let mut type_counts: Vec<(String, usize)> = Vec::new();
        let mut last_24_hours = 0;
        for activity in activities.iter().filter(|a| a.timestamp >= since) {
            last_24_hours += 1;
            match type_counts
                .iter_mut()
                .find(|(t, _)| *t == activity.activity_type)
            {
                Some((_, count)) => *count += 1,
                None => type_counts.push((activity.activity_type.clone(), 1)),
            }
        }
        drop(activities);

        // Strictly greater keeps the first type seen on ties
        let mut most_active_type = String::new();
        let mut best = 0;
        for (t, count) in &type_counts {
            if *count > best {
                best = *count;
                most_active_type = t.clone();
            }
        }

        debug!(
            "Stats: total={}, last24Hours={}, mostActiveType='{}'",
            total, last_24_hours, most_active_type
        );

        ActivityStats {
            total,
            last_24_hours,
            type_counts,
            most_active_type,
        }
    }

    fn collect_sorted<F>(&self, keep: F) -> Vec<Activity>
    where
        F: Fn(&Activity) -> bool,
    {
        let mut matching: Vec<Activity> = self
            .activities
            .read()
            .iter()
            .filter(|a| keep(a))
            .cloned()
            .collect();
        // Stable, so equal timestamps keep insertion order
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching
    }
}

/// Creation time in Unix milliseconds, bumped past any numeric id already
/// issued so two creates in the same millisecond stay distinct.
fn next_id(existing: &[Activity], now: DateTime<Utc>) -> String {
    let candidate = now.timestamp_millis();
    let highest = existing.iter().filter_map(Activity::numeric_id).max();
    match highest {
        Some(h) if h >= candidate => (h + 1).to_string(),
        _ => candidate.to_string(),
    }
}

/// The three demo records the service starts with
pub fn seed_activities(now: DateTime<Utc>) -> Vec<Activity> {
    let seed = |id: &str,
                activity_type: &str,
                description: &str,
                user_id: &str,
                minutes_ago: i64,
                metadata: Value| Activity {
        id: id.to_string(),
        activity_type: activity_type.to_string(),
        description: description.to_string(),
        user_id: user_id.to_string(),
        timestamp: now - Duration::minutes(minutes_ago),
        metadata: match metadata {
            Value::Object(m) => m,
            _ => Map::new(),
        },
        extra: Map::new(),
    };

    vec![
        seed(
            "1",
            "ticket_created",
            "New ticket created for John Doe - Sleep Study Equipment Issue",
            "user1",
            5,
            json!({ "ticketId": 1, "patientId": 1 }),
        ),
        seed(
            "2",
            "ticket_updated",
            "Ticket status updated to \"in-progress\" for Mary Smith",
            "user2",
            15,
            json!({ "ticketId": 2, "status": "in-progress" }),
        ),
        seed(
            "3",
            "call_logged",
            "Call documented with Robert Johnson regarding insurance authorization",
            "user3",
            30,
            json!({ "ticketId": 3, "callType": "outbound" }),
        ),
    ]
}
