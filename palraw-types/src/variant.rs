use std::path::Path;

use serde::Serialize;

use crate::{PalError, PalResult};

/// Размер заголовка `.dat` файла
pub const DAT_HEADER_SIZE: usize = 1023;

/// Размер заголовка `.datx` файла
pub const DATX_HEADER_SIZE: usize = 1024;

/// Разновидность файла. Определяет длину заголовка и маркер конца данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileVariant {
    /// Старые устройства: заголовок 1023 байта, 8-байтный хвостовой паттерн
    Dat,
    /// Заголовок 1024 байта, хвост помечен ASCII `tail`
    Datx,
}

impl FileVariant {
    pub fn header_len(&self) -> usize {
        match self {
            FileVariant::Dat => DAT_HEADER_SIZE,
            FileVariant::Datx => DATX_HEADER_SIZE,
        }
    }

    /// Сколько байт от начала записи нужно, чтобы распознать маркер конца.
    pub fn tail_lookahead(&self) -> usize {
        match self {
            FileVariant::Dat => 8,
            FileVariant::Datx => 4,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileVariant::Dat => "dat",
            FileVariant::Datx => "datx",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "dat" => Some(FileVariant::Dat),
            "datx" => Some(FileVariant::Datx),
            _ => None,
        }
    }

    /// Определяет разновидность по расширению пути.
    pub fn from_path(path: &Path) -> PalResult<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                PalError::validation(format!(
                    "Unknown file extension for '{}': expected .dat or .datx",
                    path.display()
                ))
            })
    }
}

impl std::fmt::Display for FileVariant {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for FileVariant {
    type Err = PalError;

    fn from_str(s: &str) -> PalResult<Self> {
        Self::from_extension(s.trim_start_matches('.')).ok_or_else(|| {
            PalError::validation(format!("Unknown file variant '{s}'. Use: dat, datx"))
        })
    }
}
