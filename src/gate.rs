//! Upload debouncing.
//!
//! `UploadGate` turns the per-frame occupancy stream into sparse upload
//! events. An upload fires only when
//!
//! - at least `min_upload_interval` has passed since the previous upload, and
//! - `min_motion_frames` consecutive occupied frames have been counted since
//!   the last reset (an unoccupied frame or an upload).
//!
//! Occupied frames that arrive during the cooldown are not counted.

use chrono::{DateTime, Local, TimeDelta};

use crate::detect::Occupancy;

pub const DEFAULT_MIN_MOTION_FRAMES: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateSettings {
    pub min_upload_interval: TimeDelta,
    pub min_motion_frames: u32,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            min_upload_interval: TimeDelta::seconds(3),
            min_motion_frames: DEFAULT_MIN_MOTION_FRAMES,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadGate {
    settings: GateSettings,
    last_upload: Option<DateTime<Local>>,
    motion_frames: u32,
}

impl UploadGate {
    /// Gate with no previous upload: the first sustained run may fire immediately.
    pub fn new(settings: GateSettings) -> Self {
        Self {
            settings,
            last_upload: None,
            motion_frames: 0,
        }
    }

    /// Gate that treats `started_at` as the previous upload, so nothing fires
    /// until one full interval after start-up.
    pub fn starting_at(settings: GateSettings, started_at: DateTime<Local>) -> Self {
        Self {
            settings,
            last_upload: Some(started_at),
            motion_frames: 0,
        }
    }

    pub fn last_upload(&self) -> Option<DateTime<Local>> {
        self.last_upload
    }

    pub fn motion_frames(&self) -> u32 {
        self.motion_frames
    }

    /// Feed one classification. Returns true when an upload should be emitted.
    pub fn evaluate(&mut self, occupancy: Occupancy, timestamp: DateTime<Local>) -> bool {
        if !occupancy.is_occupied() {
            self.motion_frames = 0;
            return false;
        }

        if self.in_cooldown(timestamp) {
            return false;
        }

        self.motion_frames += 1;
        if self.motion_frames >= self.settings.min_motion_frames {
            self.last_upload = Some(timestamp);
            self.motion_frames = 0;
            return true;
        }
        false
    }

    /// A timestamp earlier than the last upload (clock stepped back) counts as cooldown.
    fn in_cooldown(&self, timestamp: DateTime<Local>) -> bool {
        match self.last_upload {
            Some(last) => timestamp.signed_duration_since(last) < self.settings.min_upload_interval,
            None => false,
        }
    }
}
