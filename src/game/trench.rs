//! Static trench layout and cover lookup

/// Which side dug a trench. Cosmetic only, cover applies to everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affiliation {
    Allies,
    Axis,
    Neutral,
}

/// A horizontal stretch of trench along the ground
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrenchZone {
    /// Left edge (inclusive)
    pub x1: f32,
    /// Right edge (inclusive)
    pub x2: f32,
    pub affiliation: Affiliation,
}

impl TrenchZone {
    const fn new(x1: f32, x2: f32, affiliation: Affiliation) -> Self {
        Self { x1, x2, affiliation }
    }

    pub fn contains_x(&self, x: f32) -> bool {
        x >= self.x1 && x <= self.x2
    }
}

/// Anything above this height is out of the trench
pub const TRENCH_FLOOR_Y: f32 = 390.0;

/// The battlefield's trench zones, left to right
pub static TRENCHES: [TrenchZone; 5] = [
    TrenchZone::new(60.0, 180.0, Affiliation::Allies),
    TrenchZone::new(350.0, 450.0, Affiliation::Allies),
    TrenchZone::new(700.0, 900.0, Affiliation::Neutral),
    TrenchZone::new(1150.0, 1250.0, Affiliation::Axis),
    TrenchZone::new(1420.0, 1540.0, Affiliation::Axis),
];

/// Cover lookup over the static trench layout
pub struct TrenchMap;

impl TrenchMap {
    /// The zone covering a position, if any
    pub fn zone_at(x: f32, y: f32) -> Option<&'static TrenchZone> {
        if y < TRENCH_FLOOR_Y {
            return None;
        }
        TRENCHES.iter().find(|zone| zone.contains_x(x))
    }

    /// Check if a position is inside a trench
    pub fn is_in_trench(x: f32, y: f32) -> bool {
        Self::zone_at(x, y).is_some()
    }
}
