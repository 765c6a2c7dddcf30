//! Absolute timeline construction.
//!
//! Offsets in a procedure are waits after the *previous* command, so entry
//! `i` is dispatched at `T0 + offset[0] + ... + offset[i]`. The running sum is
//! kept in integer milliseconds and each absolute time is derived from `T0`
//! and that sum, never from the previous absolute time, so no rounding can
//! accumulate along the sequence.

use chrono::{DateTime, Utc};
use rts_types::{ConcreteEntry, ConcreteProcedure, RtsDuration, SlotId};
use rts_util::{cxc_seconds, format_doy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("entry {index} lies beyond the representable time range")]
    Overflow { index: usize },
    #[error("entry {index} would be scheduled before its predecessor")]
    NonMonotonic { index: usize },
}

/// One scheduled entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub index: usize,
    /// Absolute dispatch time.
    pub at: DateTime<Utc>,
    /// Time since activation.
    pub elapsed: RtsDuration,
    pub entry: ConcreteEntry,
}

/// Absolute schedule for one procedure instance. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    activation: DateTime<Utc>,
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn activation(&self) -> DateTime<Utc> {
        self.activation
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time of the final entry, if there is one.
    pub fn completion_time(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|entry| entry.at)
    }

    /// Flattens the timeline into export records.
    pub fn records(&self, slot: Option<SlotId>) -> Vec<TimelineRecord> {
        self.entries
            .iter()
            .map(|scheduled| {
                let substitution = scheduled.entry.arguments.first();
                TimelineRecord {
                    step: scheduled.index + 1,
                    date: format_doy(&scheduled.at),
                    time: cxc_seconds(&scheduled.at),
                    statement: scheduled.entry.target.clone(),
                    mnemonic: scheduled.entry.mnemonic.clone(),
                    substitution_parameter: substitution.map(|(key, _)| key.clone()),
                    substitution_parameter_value: substitution.map(|(_, value)| value.clone()),
                    delta: scheduled.entry.offset.as_secs_f64(),
                    slot: slot.map(SlotId::number),
                }
            })
            .collect()
    }
}

/// Flat, per-command export row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRecord {
    /// 1-based position in the procedure.
    pub step: usize,
    /// `YYYY:DDD:HH:MM:SS.fff`.
    pub date: String,
    /// Chandra CXC seconds (TT since 1998.0).
    pub time: f64,
    pub statement: String,
    pub mnemonic: String,
    pub substitution_parameter: Option<String>,
    pub substitution_parameter_value: Option<String>,
    /// Offset from the previous command in seconds.
    pub delta: f64,
    pub slot: Option<u32>,
}

/// Builds the absolute timeline of `procedure` activated at `activation`.
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use rts_engine::{bind, build_timeline, parse_procedure};
///
/// let procedure = parse_procedure("demo", "ACIS, A\nACIS, B, DELTA=00:00:01\nACIS, C, DELTA=00:00:02")?;
/// let concrete = bind(&procedure, &Default::default())?;
/// let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
///
/// let timeline = build_timeline(&concrete, start)?;
/// assert_eq!(timeline.entries()[2].at, Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 3).unwrap());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn build_timeline(procedure: &ConcreteProcedure, activation: DateTime<Utc>) -> Result<Timeline, TimelineError> {
    let mut elapsed = RtsDuration::ZERO;
    let mut previous: Option<DateTime<Utc>> = None;
    let mut entries = Vec::with_capacity(procedure.entries.len());

    for (index, entry) in procedure.entries.iter().enumerate() {
        elapsed = elapsed.checked_add(entry.offset).ok_or(TimelineError::Overflow { index })?;
        let at = elapsed
            .to_time_delta()
            .and_then(|delta| activation.checked_add_signed(delta))
            .ok_or(TimelineError::Overflow { index })?;
        if previous.is_some_and(|previous| at < previous) {
            return Err(TimelineError::NonMonotonic { index });
        }
        previous = Some(at);
        entries.push(TimelineEntry {
            index,
            at,
            elapsed,
            entry: entry.clone(),
        });
    }

    Ok(Timeline { activation, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{bind, parse_procedure, validate};
    use chrono::{TimeDelta, TimeZone};
    use indexmap::{IndexMap, indexmap};

    const LTCTI: &str = "\
PARAM, NUM_HOURS, DURATION, MIN=000:00:01:00, MAX=000:21:00:00
/CMD, OORMPEN
ACIS, WSVIDALLDN, DELTA=00:00:01.000
/CMD, 2S2STHV, 2S2STHV2=0, DELTA=00:00:01.000
/CMD, 2S2HVON, DELTA=00:00:01.000
ACIS, WSPOW0CF3F, DELTA=00:00:01.000
ACIS, WT00C62014, DELTA=00:01:05.000
ACIS, XTZ0000005, DELTA=00:00:04.000
ACIS, RS_0000001, DELTA=00:00:01.000
/CMD, OORMPDS, DELTA=&NUM_HOURS&
ACIS, AA00000000, DELTA=00:00:01.000
ACIS, WSPOW00000, DELTA=00:00:01.000
";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 9, 8, 20, 45, 0).unwrap()
    }

    fn concrete(source: &str, bindings: IndexMap<String, String>) -> ConcreteProcedure {
        let procedure = parse_procedure("test", source).expect("parse");
        let concrete = bind(&procedure, &bindings).expect("bind");
        validate(&concrete).expect("validate");
        concrete
    }

    #[test]
    fn offsets_accumulate_from_the_previous_entry() {
        let procedure = concrete(
            "ACIS, A, DELTA=00:00:05\nACIS, B, DELTA=00:00:01\nACIS, C, DELTA=00:00:00\nACIS, D, DELTA=00:00:10",
            IndexMap::new(),
        );
        let timeline = build_timeline(&procedure, start()).expect("timeline");
        let seconds: Vec<i64> = timeline.entries().iter().map(|entry| (entry.at - start()).num_seconds()).collect();
        assert_eq!(seconds, vec![5, 6, 6, 16]);
    }

    #[test]
    fn disable_monitor_entry_lands_after_the_bound_duration() {
        let procedure = concrete(LTCTI, indexmap! {"NUM_HOURS".into() => "000:04:00:00".into()});
        let timeline = build_timeline(&procedure, start()).expect("timeline");

        let steps_one_to_eight: i64 = 1 + 1 + 1 + 1 + 65 + 4 + 1;
        let disable_monitor = &timeline.entries()[8];
        assert_eq!(disable_monitor.entry.mnemonic, "OORMPDS");
        assert_eq!(
            disable_monitor.at,
            start() + TimeDelta::seconds(steps_one_to_eight) + TimeDelta::hours(4)
        );
        assert_eq!(
            timeline.completion_time(),
            Some(disable_monitor.at + TimeDelta::seconds(2))
        );
    }

    #[test]
    fn many_small_offsets_do_not_drift() {
        let mut source = String::from("ACIS, A0, DELTA=00:00:00.001\n");
        for index in 1..10_000 {
            source.push_str(&format!("ACIS, A{index}, DELTA=00:00:00.001\n"));
        }
        let procedure = concrete(&source, IndexMap::new());
        let timeline = build_timeline(&procedure, start()).expect("timeline");

        for (index, entry) in timeline.entries().iter().enumerate() {
            assert_eq!(entry.elapsed, RtsDuration::from_millis(index as u64 + 1));
            assert_eq!(entry.at, start() + TimeDelta::milliseconds(index as i64 + 1));
        }
    }

    #[test]
    fn building_is_pure() {
        let procedure = concrete(LTCTI, indexmap! {"NUM_HOURS".into() => "000:04:00:00".into()});
        assert_eq!(build_timeline(&procedure, start()), build_timeline(&procedure, start()));
    }

    #[test]
    fn empty_procedure_has_empty_timeline() {
        let procedure = concrete("! nothing to do\n", IndexMap::new());
        let timeline = build_timeline(&procedure, start()).expect("timeline");
        assert!(timeline.is_empty());
        assert_eq!(timeline.completion_time(), None);
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let mut procedure = concrete("ACIS, A\nACIS, B, DELTA=00:00:01", IndexMap::new());
        procedure.entries[1].offset = RtsDuration::from_millis(u64::MAX);
        assert_eq!(build_timeline(&procedure, start()), Err(TimelineError::Overflow { index: 1 }));
    }

    #[test]
    fn records_carry_dates_and_substitutions() {
        let procedure = concrete(LTCTI, indexmap! {"NUM_HOURS".into() => "000:04:00:00".into()});
        let records = build_timeline(&procedure, start()).expect("timeline").records(Some(SlotId(135)));

        assert_eq!(records[0].date, "2017:251:20:45:00.000");
        assert_eq!(records[0].time, 621_290_769.184);
        assert_eq!(records[1].time - records[0].time, 1.0);
        assert_eq!(records[2].substitution_parameter.as_deref(), Some("2S2STHV2"));
        assert_eq!(records[2].substitution_parameter_value.as_deref(), Some("0"));
        assert_eq!(records[2].delta, 1.0);
        assert_eq!(records[8].delta, 4.0 * 3_600.0);
        assert!(records.iter().all(|record| record.slot == Some(135)));
        assert_eq!(records.last().map(|record| record.step), Some(11));
    }
}
