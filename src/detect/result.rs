use std::fmt;

/// Whether motion was detected in a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Occupancy {
    #[default]
    Unoccupied,
    Occupied,
}

impl Occupancy {
    pub fn is_occupied(self) -> bool {
        matches!(self, Occupancy::Occupied)
    }

    pub fn label(self) -> &'static str {
        match self {
            Occupancy::Occupied => "Occupied",
            Occupancy::Unoccupied => "Unoccupied",
        }
    }
}

impl fmt::Display for Occupancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bounding rectangle around one connected area of change, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Area enclosed by the region's outer border (after dilation).
    pub area: u32,
}

impl MotionRegion {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Result of observing one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    pub occupancy: Occupancy,
    /// Regions that survived the area filter, for annotation.
    pub regions: Vec<MotionRegion>,
    /// True when the frame only seeded the background model.
    pub bootstrap: bool,
}

impl Observation {
    pub(crate) fn bootstrap() -> Self {
        Self {
            occupancy: Occupancy::Unoccupied,
            regions: Vec::new(),
            bootstrap: true,
        }
    }

    pub(crate) fn from_regions(regions: Vec<MotionRegion>) -> Self {
        let occupancy = if regions.is_empty() {
            Occupancy::Unoccupied
        } else {
            Occupancy::Occupied
        };
        Self {
            occupancy,
            regions,
            bootstrap: false,
        }
    }
}
