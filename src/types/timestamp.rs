// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::SystemTime;

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::TimeZone;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(ts: DateTime<Utc>) -> Self {
        Self(ts)
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        Self(DateTime::<Utc>::from(time))
    }

    /// Parse the `YYMMDD_HHMMSS` prefix the server gives its result files,
    /// e.g. `251016_203000_R.json`. The server writes these in local time,
    /// which we treat as UTC since the offset is not recorded.
    pub fn from_result_file_name(name: &str) -> Option<Self> {
        let prefix = name.get(..13)?;
        let naive = NaiveDateTime::parse_from_str(prefix, "%y%m%d_%H%M%S").ok()?;
        Some(Self(Utc.from_utc_datetime(&naive)))
    }

    /// Whole seconds elapsed from `self` to `later`, clamped at zero.
    pub fn seconds_until(self, later: Timestamp) -> u64 {
        let delta = later.0.signed_duration_since(self.0).num_seconds();
        delta.max(0) as u64
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;
    use chrono::Timelike;

    use super::*;

    #[test]
    fn test_from_result_file_name() {
        let ts = Timestamp::from_result_file_name("251016_203015_R.json").unwrap();
        let inner = ts.into_inner();
        assert_eq!(inner.year(), 2025);
        assert_eq!(inner.month(), 10);
        assert_eq!(inner.day(), 16);
        assert_eq!(inner.hour(), 20);
        assert_eq!(inner.second(), 15);
    }

    #[test]
    fn test_from_result_file_name_rejects_other_names() {
        assert!(Timestamp::from_result_file_name("results.json").is_none());
        assert!(Timestamp::from_result_file_name("short").is_none());
    }

    #[test]
    fn test_seconds_until_is_clamped() {
        let a = Timestamp::now();
        let b = Timestamp::new(a.into_inner() + chrono::Duration::seconds(42));
        assert_eq!(a.seconds_until(b), 42);
        assert_eq!(b.seconds_until(a), 0);
    }

    #[test]
    fn test_serializes_as_rfc3339() {
        let ts = Timestamp::from_result_file_name("240101_000000_Q.json").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-01-01T00:00:00+00:00\"");
    }
}
