//! Fixed-capacity rolling history of branch current.
//!
//! The buffer holds [`TICK_SIZE`] entries. Each append writes slot
//! `tick % TICK_SIZE` and then advances `tick`, so the buffer always holds the
//! most recent `min(tick, TICK_SIZE)` entries. [`RollingHistory::snapshot_all`]
//! returns slots in slot order, not by recency: after a wrap, slot 0 is not
//! the oldest entry. Use [`RollingHistory::chronological`] when order matters.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::snapshot::PhaseCurrent;
use crate::topology::{PHASES, Phase, RACKS, Rack};

/// Number of slots in the history buffer.
pub const TICK_SIZE: usize = 10;

/// One tick's current readings for every (rack, phase). Serializes as `[[f64; 3]; 4]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HistoryEntry {
    pub racks: [PhaseCurrent; RACKS],
}

impl HistoryEntry {
    pub fn get(&self, rack: Rack, phase: Phase) -> f64 {
        self.racks[rack.index()].get(phase)
    }
}

/// Current readings for one cycle, where a reading may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentSample {
    values: [[Option<f64>; PHASES]; RACKS],
}

impl CurrentSample {
    /// Every (rack, phase) present with `value`.
    pub fn filled(value: f64) -> Self {
        Self {
            values: [[Some(value); PHASES]; RACKS],
        }
    }

    pub fn get(&self, rack: Rack, phase: Phase) -> Option<f64> {
        self.values[rack.index()][phase.index()]
    }

    pub fn set(&mut self, rack: Rack, phase: Phase, value: f64) {
        self.values[rack.index()][phase.index()] = Some(value);
    }

    pub fn clear(&mut self, rack: Rack, phase: Phase) {
        self.values[rack.index()][phase.index()] = None;
    }

    /// Number of present readings.
    pub fn present(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_some()).count()
    }
}

struct HistoryState {
    slots: [HistoryEntry; TICK_SIZE],
    tick: u64,
}

/// Circular buffer of [`HistoryEntry`], safe to share between the writer and readers.
pub struct RollingHistory {
    state: Mutex<HistoryState>,
}

impl RollingHistory {
    /// Zero-filled history with `tick == 0`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HistoryState {
                slots: [HistoryEntry::default(); TICK_SIZE],
                tick: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `sample` into the current slot and advance the cursor.
    ///
    /// Absent readings leave that position of the slot untouched.
    pub fn append(&self, sample: &CurrentSample) {
        let mut state = self.lock();
        let slot = (state.tick % TICK_SIZE as u64) as usize;
        let entry = &mut state.slots[slot];
        for rack in Rack::all() {
            for phase in Phase::ALL {
                if let Some(value) = sample.get(rack, phase) {
                    entry.racks[rack.index()].set(phase, value);
                }
            }
        }
        state.tick += 1;
    }

    /// Raw slot array, slot 0 first.
    pub fn snapshot_all(&self) -> [HistoryEntry; TICK_SIZE] {
        self.lock().slots
    }

    /// Number of appends since start.
    pub fn tick(&self) -> u64 {
        self.lock().tick
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        (self.lock().tick as usize).min(TICK_SIZE)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tick == 0
    }

    /// Most recently appended entry.
    pub fn latest(&self) -> Option<HistoryEntry> {
        let state = self.lock();
        if state.tick == 0 {
            return None;
        }
        let slot = ((state.tick - 1) % TICK_SIZE as u64) as usize;
        Some(state.slots[slot])
    }

    /// Populated entries, oldest first.
    pub fn chronological(&self) -> Vec<HistoryEntry> {
        let state = self.lock();
        if state.tick <= TICK_SIZE as u64 {
            return state.slots[..state.tick as usize].to_vec();
        }
        let start = (state.tick % TICK_SIZE as u64) as usize;
        (0..TICK_SIZE)
            .map(|i| state.slots[(start + i) % TICK_SIZE])
            .collect()
    }
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new()
    }
}
