//! IdGenerator port - ID 生成の抽象化
//!
//! Orchestrators usually bring their own record ids, but sessions and batch
//! jobs often need a fresh one. ULIDs sort by creation time, which keeps
//! session listings chronological.

use crate::domain::ids::{JobId, RecordId, SessionId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_session_id(&self) -> SessionId;

    fn generate_job_id(&self) -> JobId;

    fn generate_record_id(&self) -> RecordId;
}

/// ULID generator with a pluggable clock.
///
/// With a `FixedClock` the timestamp part is deterministic; the random part
/// still keeps ids unique.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_session_id(&self) -> SessionId {
        SessionId::new(format!("session-{}", self.next_ulid()))
    }

    fn generate_job_id(&self) -> JobId {
        JobId::new(format!("job-{}", self.next_ulid()))
    }

    fn generate_record_id(&self) -> RecordId {
        RecordId::new(format!("record-{}", self.next_ulid()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_session_id();
        let id2 = id_gen.generate_session_id();
        let id3 = id_gen.generate_session_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn fixed_clock_pins_the_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_job_id();
        let id2 = id_gen.generate_job_id();
        assert_ne!(id1, id2);

        let ulid1: Ulid = id1.as_str().trim_start_matches("job-").parse().unwrap();
        let ulid2: Ulid = id2.as_str().trim_start_matches("job-").parse().unwrap();
        assert_eq!(ulid1.timestamp_ms(), ulid2.timestamp_ms());
        assert_eq!(ulid1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn prefixes_name_the_id_kind() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_session_id().as_str().starts_with("session-"));
        assert!(id_gen.generate_job_id().as_str().starts_with("job-"));
        assert!(id_gen.generate_record_id().as_str().starts_with("record-"));
    }
}
