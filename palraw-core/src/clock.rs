//! Метки времени выборок.
//!
//! Выборка `i` записана в момент `start + i / hz` с точностью до
//! наносекунды. Для целых частот смещение считается в целых числах,
//! поэтому шаг между соседними метками не накапливает ошибку округления.

use chrono::{NaiveDateTime, TimeDelta};
use palraw_types::{FileMetadata, PalError, PalResult};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Генератор меток времени для одной записи.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleClock {
    start: NaiveDateTime,
    hz: f64,
    /// Та же частота, если она целая
    whole_hz: Option<u64>,
}

impl SampleClock {
    /// Часы с началом `start` и частотой `hz`.
    ///
    /// Частота должна быть конечным положительным числом.
    pub fn new(
        start: NaiveDateTime,
        hz: f64,
    ) -> PalResult<Self> {
        if !hz.is_finite() || hz <= 0.0 {
            return Err(PalError::configuration(format!(
                "Sampling frequency must be a positive number, got {hz}"
            )));
        }

        let whole_hz = (hz.fract() == 0.0 && hz <= u64::MAX as f64).then_some(hz as u64);

        Ok(Self {
            start,
            hz,
            whole_hz,
        })
    }

    pub fn from_metadata(meta: &FileMetadata) -> PalResult<Self> {
        Self::new(meta.start, meta.sample_rate_hz as f64)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn hz(&self) -> f64 {
        self.hz
    }

    /// Интервал между выборками, округлённый до наносекунды.
    pub fn period(&self) -> TimeDelta {
        TimeDelta::nanoseconds((1e9 / self.hz).round() as i64)
    }

    /// Смещение выборки `index` от начала записи в наносекундах.
    pub fn offset_nanos(
        &self,
        index: u64,
    ) -> PalResult<i64> {
        let nanos = match self.whole_hz {
            Some(hz) => {
                let hz = hz as u128;
                let n = (index as u128 * NANOS_PER_SEC + hz / 2) / hz;
                i64::try_from(n).ok()
            }
            None => {
                let n = (index as f64 * 1e9 / self.hz).round();
                (n.is_finite() && n < i64::MAX as f64).then_some(n as i64)
            }
        };

        nanos.ok_or_else(|| {
            PalError::overflow(format!(
                "Offset of sample {index} at {} Hz exceeds the time range",
                self.hz
            ))
        })
    }

    /// Метка времени выборки `index`.
    pub fn timestamp(
        &self,
        index: u64,
    ) -> PalResult<NaiveDateTime> {
        let nanos = self.offset_nanos(index)?;

        self.start
            .checked_add_signed(TimeDelta::nanoseconds(nanos))
            .ok_or_else(|| {
                PalError::overflow(format!(
                    "Timestamp of sample {index} is past the end of the calendar"
                ))
            })
    }

    /// Колонка меток времени для `n` выборок.
    pub fn timestamps(
        &self,
        n: usize,
    ) -> PalResult<Vec<NaiveDateTime>> {
        // Смещение монотонно: если последняя метка представима, то и все
        if let Some(last) = n.checked_sub(1) {
            self.timestamp(last as u64)?;
        }

        let mut out = Vec::with_capacity(n);
        for i in 0..n as u64 {
            out.push(self.timestamp(i)?);
        }

        Ok(out)
    }
}

/// `start + index / hz` без создания [`SampleClock`].
pub fn timestamp(
    start: NaiveDateTime,
    index: u64,
    hz: f64,
) -> PalResult<NaiveDateTime> {
    SampleClock::new(start, hz)?.timestamp(index)
}
