//! Compass octant classification.

/// One of the eight 45° compass bands, clockwise from north
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Octant {
    North,
    Northeast,
    East,
    Southeast,
    South,
    Southwest,
    West,
    Northwest,
}

impl Octant {
    /// Clockwise order starting at north
    pub const ALL: [Octant; 8] = [
        Octant::North,
        Octant::Northeast,
        Octant::East,
        Octant::Southeast,
        Octant::South,
        Octant::Southwest,
        Octant::West,
        Octant::Northwest,
    ];

    /// Width of each band in degrees
    pub const WIDTH: f64 = 45.0;

    /// Classify an angle in degrees.
    ///
    /// The angle is reduced modulo 360 first. Bands are centered on the compass
    /// points and half-open, so a boundary value such as 22.5 belongs to the
    /// band on its clockwise side. Non-finite input classifies as north.
    pub fn classify(angle_degrees: f64) -> Self {
        let angle = normalize_degrees(angle_degrees);
        let index = ((angle + Self::WIDTH / 2.0) / Self::WIDTH).floor();
        if !index.is_finite() {
            return Octant::North;
        }
        Self::ALL[(index as usize) % Self::ALL.len()]
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::North => "N",
            Self::Northeast => "NE",
            Self::East => "E",
            Self::Southeast => "SE",
            Self::South => "S",
            Self::Southwest => "SW",
            Self::West => "W",
            Self::Northwest => "NW",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::North => "North",
            Self::Northeast => "Northeast",
            Self::East => "East",
            Self::Southeast => "Southeast",
            Self::South => "South",
            Self::Southwest => "Southwest",
            Self::West => "West",
            Self::Northwest => "Northwest",
        }
    }

    /// Center of the band in degrees
    pub fn center(&self) -> f64 {
        let index = Self::ALL.iter().position(|o| o == self).unwrap_or(0);
        index as f64 * Self::WIDTH
    }
}

/// Wrap any angle into [0, 360).
pub fn normalize_degrees(angle_degrees: f64) -> f64 {
    let wrapped = angle_degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
