//! Per-area alarm state
//!
//! The store is plain data behind one lock. The ingestor is the only writer;
//! renderers poll [`AreaStateStore::generation`] and take snapshots.

use crate::protocol::AreaEvent;
use chrono::{DateTime, Local};
use log::debug;
use std::sync::{PoisonError, RwLock};

/// Number of areas on the standard panel
pub const DEFAULT_AREA_COUNT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaState {
    Normal,
    Alarm,
}

impl std::fmt::Display for AreaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaState::Normal => write!(f, "normal"),
            AreaState::Alarm => write!(f, "ALARM"),
        }
    }
}

/// One monitored area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    /// 1-based area number
    pub id: usize,
    pub state: AreaState,
    /// Time of the last state transition
    pub changed_at: Option<DateTime<Local>>,
}

#[derive(Debug)]
struct Inner {
    areas: Vec<Area>,
    generation: u64,
}

/// Thread-safe store of every area's state
#[derive(Debug)]
pub struct AreaStateStore {
    inner: RwLock<Inner>,
}

impl AreaStateStore {
    /// Create `count` areas, numbered from 1, all normal
    pub fn new(count: usize) -> Self {
        let areas = (1..=count)
            .map(|id| Area {
                id,
                state: AreaState::Normal,
                changed_at: None,
            })
            .collect();

        Self {
            inner: RwLock::new(Inner {
                areas,
                generation: 0,
            }),
        }
    }

    /// Apply one event. Returns whether any area changed.
    ///
    /// Alarms for area numbers outside `1..=count` are ignored.
    pub fn apply_event(&self, event: AreaEvent) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let now = Local::now();

        let changed = match event {
            AreaEvent::ResetAll => {
                let mut changed = false;
                for area in inner.areas.iter_mut().filter(|a| a.state != AreaState::Normal) {
                    area.state = AreaState::Normal;
                    area.changed_at = Some(now);
                    changed = true;
                }
                changed
            }
            AreaEvent::AreaAlarm(id) => {
                let slot = match id.checked_sub(1) {
                    Some(idx) => inner.areas.get_mut(idx),
                    None => None,
                };
                match slot {
                    Some(area) if area.state == AreaState::Alarm => false,
                    Some(area) => {
                        area.state = AreaState::Alarm;
                        area.changed_at = Some(now);
                        true
                    }
                    None => {
                        debug!("Ignoring alarm for unknown area {}", id);
                        false
                    }
                }
            }
        };

        if changed {
            inner.generation += 1;
        }
        changed
    }

    /// Point-in-time copy of every area, ordered by id
    pub fn snapshot(&self) -> Vec<Area> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .areas
            .clone()
    }

    /// Snapshot together with the generation it belongs to
    pub fn snapshot_with_generation(&self) -> (u64, Vec<Area>) {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (inner.generation, inner.areas.clone())
    }

    /// Counter bumped on every change
    pub fn generation(&self) -> u64 {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Ids of areas currently in alarm
    pub fn active_alarms(&self) -> Vec<usize> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .areas
            .iter()
            .filter(|a| a.state == AreaState::Alarm)
            .map(|a| a.id)
            .collect()
    }
}

impl Default for AreaStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_AREA_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot_all_normal() {
        for count in [1, 8, 32, 100] {
            let store = AreaStateStore::new(count);
            let snapshot = store.snapshot();
            assert_eq!(snapshot.len(), count);
            for (i, area) in snapshot.iter().enumerate() {
                assert_eq!(area.id, i + 1);
                assert_eq!(area.state, AreaState::Normal);
                assert!(area.changed_at.is_none());
            }
        }
    }

    #[test]
    fn test_alarm_touches_only_its_area() {
        let store = AreaStateStore::default();
        assert!(store.apply_event(AreaEvent::AreaAlarm(7)));

        for area in store.snapshot() {
            let expected = if area.id == 7 { AreaState::Alarm } else { AreaState::Normal };
            assert_eq!(area.state, expected);
        }
        assert_eq!(store.active_alarms(), vec![7]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = AreaStateStore::default();
        store.apply_event(AreaEvent::AreaAlarm(1));
        store.apply_event(AreaEvent::AreaAlarm(32));
        assert!(store.apply_event(AreaEvent::ResetAll));
        assert!(store.snapshot().iter().all(|a| a.state == AreaState::Normal));

        // Reset on an all-normal panel is a no-op
        assert!(!store.apply_event(AreaEvent::ResetAll));
    }

    #[test]
    fn test_out_of_range_ids_ignored() {
        let store = AreaStateStore::new(32);
        let before = store.snapshot();

        for id in [0, 33, 1000, usize::MAX] {
            assert!(!store.apply_event(AreaEvent::AreaAlarm(id)));
        }
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_generation_tracks_changes() {
        let store = AreaStateStore::new(4);
        store.apply_event(AreaEvent::AreaAlarm(2));
        assert_eq!(store.generation(), 1);

        // Repeated alarm for the same area changes nothing
        store.apply_event(AreaEvent::AreaAlarm(2));
        assert_eq!(store.generation(), 1);

        store.apply_event(AreaEvent::ResetAll);
        let (generation, areas) = store.snapshot_with_generation();
        assert_eq!(generation, 2);
        assert!(areas[1].changed_at.is_some());
    }
}
