use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::{CompressionMode, FileVariant};

/// Условие старта записи (байт 268)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StartCondition {
    /// По срабатыванию триггера
    Trigger,
    /// Сразу после программирования
    Immediately,
    /// В заданное время
    SetTime,
    /// Код, не описанный в документации устройства
    Unknown(u8),
}

/// Условие остановки записи (байт 275)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopCondition {
    MemoryFull,
    LowBattery,
    Usb,
    ProgrammedTime,
    Unknown(u8),
}

/// Метаданные из заголовка raw-файла.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    /// Разновидность файла (`.dat` / `.datx`)
    pub variant: FileVariant,
    /// Версия прошивки устройства
    pub firmware: u16,
    /// Разрядность АЦП: 8 или 10 бит
    pub bit_depth: u8,
    /// Диапазон измерения (±g), `None` для неизвестного кода
    pub range_g: Option<u8>,
    /// Частота дискретизации в Гц (всегда > 0)
    pub sample_rate_hz: u32,
    /// Количество осей, `None` для неизвестного кода
    pub axes: Option<u8>,
    /// Время начала записи
    pub start: NaiveDateTime,
    /// Время окончания (`None`, если поле не содержит корректной даты)
    pub stop: Option<NaiveDateTime>,
    pub start_condition: StartCondition,
    pub stop_condition: StopCondition,
    /// Метка файла (до 8 ASCII символов), обычно идентификатор участника
    pub file_code: String,
    /// Серийный номер устройства
    pub device_id: u32,
    /// Режим упаковки тела
    pub compression: CompressionMode,
    /// Объявленная длина тела в байтах, если известен размер файла
    pub body_len: Option<u64>,
}

impl StartCondition {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => StartCondition::Trigger,
            1 => StartCondition::Immediately,
            2 => StartCondition::SetTime,
            other => StartCondition::Unknown(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            StartCondition::Trigger => 0,
            StartCondition::Immediately => 1,
            StartCondition::SetTime => 2,
            StartCondition::Unknown(v) => *v,
        }
    }
}

impl StopCondition {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => StopCondition::MemoryFull,
            3 => StopCondition::LowBattery,
            64 => StopCondition::Usb,
            128 => StopCondition::ProgrammedTime,
            other => StopCondition::Unknown(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            StopCondition::MemoryFull => 0,
            StopCondition::LowBattery => 3,
            StopCondition::Usb => 64,
            StopCondition::ProgrammedTime => 128,
            StopCondition::Unknown(v) => *v,
        }
    }
}

impl FileMetadata {
    /// Запланированная длительность записи (`stop - start`).
    pub fn duration(&self) -> Option<TimeDelta> {
        self.stop.map(|stop| stop - self.start)
    }

    pub fn header_len(&self) -> usize {
        self.variant.header_len()
    }
}

impl std::fmt::Display for StartCondition {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            StartCondition::Trigger => write!(f, "Trigger"),
            StartCondition::Immediately => write!(f, "Immediately"),
            StartCondition::SetTime => write!(f, "Set Time"),
            StartCondition::Unknown(v) => write!(f, "Unknown ({v})"),
        }
    }
}

impl std::fmt::Display for StopCondition {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            StopCondition::MemoryFull => write!(f, "Memory Full"),
            StopCondition::LowBattery => write!(f, "Low Battery"),
            StopCondition::Usb => write!(f, "USB"),
            StopCondition::ProgrammedTime => write!(f, "Programmed Time"),
            StopCondition::Unknown(v) => write!(f, "Unknown ({v})"),
        }
    }
}
