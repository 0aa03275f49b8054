use serde::Serialize;

use crate::{PalError, PalResult};

/// Режим упаковки тела файла (байт 36 заголовка)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum CompressionMode {
    /// Без сжатия: каждый триплет: одна выборка
    None = 0,
    /// Сжатие прошивки activPAL: `(0, 0, n)` повторяет предыдущую выборку
    Duplicate = 1,
    /// Escape-запись: сентинел, счётчик u16, триплет
    RunLength = 2,
}

impl CompressionMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionMode::None),
            1 => Some(CompressionMode::Duplicate),
            2 => Some(CompressionMode::RunLength),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for CompressionMode {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            CompressionMode::None => write!(f, "none"),
            CompressionMode::Duplicate => write!(f, "duplicate"),
            CompressionMode::RunLength => write!(f, "rle"),
        }
    }
}

impl std::str::FromStr for CompressionMode {
    type Err = PalError;

    fn from_str(s: &str) -> PalResult<Self> {
        match s.to_lowercase().as_str() {
            "none" | "no" | "off" => Ok(CompressionMode::None),
            "duplicate" | "dup" | "legacy" => Ok(CompressionMode::Duplicate),
            "rle" | "run-length" | "runlength" => Ok(CompressionMode::RunLength),
            _ => Err(PalError::validation(format!(
                "Unknown compression mode '{s}'. Use: none, duplicate, rle"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_known_and_unknown() {
        assert_eq!(CompressionMode::from_u8(0), Some(CompressionMode::None));
        assert_eq!(
            CompressionMode::from_u8(1),
            Some(CompressionMode::Duplicate)
        );
        assert_eq!(
            CompressionMode::from_u8(2),
            Some(CompressionMode::RunLength)
        );
        assert_eq!(CompressionMode::from_u8(7), None);
        assert_eq!(CompressionMode::RunLength.as_u8(), 2);
    }

    #[test]
    fn test_fromstr_display() {
        for mode in [
            CompressionMode::None,
            CompressionMode::Duplicate,
            CompressionMode::RunLength,
        ] {
            assert_eq!(mode.to_string().parse::<CompressionMode>().unwrap(), mode);
        }
        assert!("lz4".parse::<CompressionMode>().is_err());
    }
}
