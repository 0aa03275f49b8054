use serde::Serialize;

use crate::{PalError, PalResult};

/// Ось акселерометра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Одно измерение акселерометра: три сырых значения по осям.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Triplet {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

/// Декодированная выборка: триплет и её порядковый номер в файле.
///
/// Номера идут подряд с нуля, без пропусков.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawFrame {
    pub index: u64,
    pub triplet: Triplet,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl Triplet {
    pub const fn new(
        x: u8,
        y: u8,
        z: u8,
    ) -> Self {
        Self { x, y, z }
    }

    pub const fn from_bytes(b: [u8; 3]) -> Self {
        Self::new(b[0], b[1], b[2])
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.x, self.y, self.z]
    }

    pub fn get(
        &self,
        axis: Axis,
    ) -> u8 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Модуль вектора по сырым значениям: √(x² + y² + z²).
    pub fn rss(&self) -> f64 {
        rss(self.x, self.y, self.z)
    }
}

impl RawFrame {
    pub const fn new(
        index: u64,
        triplet: Triplet,
    ) -> Self {
        Self { index, triplet }
    }
}

/// √(x² + y² + z²) в f64 без промежуточного переполнения.
#[inline]
pub fn rss(
    x: u8,
    y: u8,
    z: u8,
) -> f64 {
    let (x, y, z) = (x as f64, y as f64, z as f64);

    (x * x + y * y + z * z).sqrt()
}

impl std::fmt::Display for Axis {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Axis {
    type Err = PalError;

    fn from_str(s: &str) -> PalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(PalError::validation(format!(
                "Unknown axis: '{s}'. Use: x, y, z"
            ))),
        }
    }
}

impl std::fmt::Display for Triplet {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
