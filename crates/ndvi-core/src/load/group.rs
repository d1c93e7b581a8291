use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::raster::ObservationMeta;

/// How observations are bucketed into fused time slots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One slot per local solar day at the footprint centre.
    #[default]
    SolarDay,
    /// One slot per distinct acquisition timestamp.
    Time,
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SolarDay => write!(f, "solar_day"),
            Self::Time => write!(f, "time"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SlotKey {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

/// Observations fused into one slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Earliest acquisition time among the members.
    pub time: DateTime<Utc>,
    /// Indices into the observation list, in contributor order.
    pub members: Vec<usize>,
}

/// Local solar date: UTC time shifted by longitude / 15 hours.
pub fn solar_day(meta: &ObservationMeta) -> NaiveDate {
    let offset_seconds = (meta.footprint.center_longitude() / 15.0 * 3600.0).round() as i64;
    (meta.time + Duration::seconds(offset_seconds)).date_naive()
}

/// Bucket observations into slots sorted by time.
///
/// Within a slot, members are ordered by (acquisition time, catalog id) so
/// first-valid fusion is reproducible for a fixed catalog query.
pub fn group_observations(observations: &[ObservationMeta], group_by: GroupBy) -> Vec<Slot> {
    let mut buckets: BTreeMap<SlotKey, Vec<usize>> = BTreeMap::new();
    for (i, meta) in observations.iter().enumerate() {
        let key = match group_by {
            GroupBy::SolarDay => SlotKey::Day(solar_day(meta)),
            GroupBy::Time => SlotKey::Instant(meta.time),
        };
        buckets.entry(key).or_default().push(i);
    }

    let mut slots: Vec<Slot> = buckets
        .into_values()
        .filter_map(|mut members| {
            members.sort_by(|&a, &b| {
                let (ma, mb) = (&observations[a], &observations[b]);
                ma.time.cmp(&mb.time).then_with(|| ma.id.cmp(&mb.id))
            });
            let time = observations[*members.first()?].time;
            Some(Slot { time, members })
        })
        .collect();
    slots.sort_by_key(|slot| slot.time);
    slots
}
