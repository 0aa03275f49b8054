//! Колоночное представление декодированной записи.

use chrono::NaiveDateTime;
use palraw_types::{Axis, FileMetadata, PalError, PalResult, RawFrame, Triplet};

use crate::{
    body::AxisColumns,
    clock::SampleClock,
    format::{ACCEL_COUNTS_PER_G, ACCEL_ZERO},
};

/// Оси и метки времени одной записи.
///
/// После сборки не меняется. Производные величины (модуль вектора,
/// ускорение в g) не хранятся, а вычисляются при обращении.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    columns: AxisColumns,
    timestamps: Vec<NaiveDateTime>,
}

/// Результат загрузки файла: заголовок и сигнал.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    metadata: FileMetadata,
    signal: Signal,
}

/// Переводит сырое значение оси в g.
#[inline]
pub fn raw_to_g(raw: u8) -> f64 {
    (raw as f64 - ACCEL_ZERO) / ACCEL_COUNTS_PER_G
}

////////////////////////////////////////////////////////////////////////////////
// Signal
////////////////////////////////////////////////////////////////////////////////

impl Signal {
    /// Достраивает колонку меток времени и собирает сигнал.
    pub fn assemble(
        columns: AxisColumns,
        clock: &SampleClock,
    ) -> PalResult<Self> {
        let timestamps = clock.timestamps(columns.len())?;

        Self::from_parts(columns, timestamps)
    }

    /// Собирает сигнал из готовых колонок. Все колонки должны быть одной длины.
    pub fn from_parts(
        columns: AxisColumns,
        timestamps: Vec<NaiveDateTime>,
    ) -> PalResult<Self> {
        if !columns.is_aligned() || columns.len() != timestamps.len() {
            return Err(PalError::internal(format!(
                "Column length mismatch: x={}, y={}, z={}, time={}",
                columns.x.len(),
                columns.y.len(),
                columns.z.len(),
                timestamps.len()
            )));
        }

        Ok(Self {
            columns,
            timestamps,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn axis(
        &self,
        axis: Axis,
    ) -> &[u8] {
        match axis {
            Axis::X => &self.columns.x,
            Axis::Y => &self.columns.y,
            Axis::Z => &self.columns.z,
        }
    }

    /// Колонка оси по имени (`"x"`, `"y"`, `"z"`).
    pub fn axis_named(
        &self,
        name: &str,
    ) -> PalResult<&[u8]> {
        Ok(self.axis(name.parse()?))
    }

    pub fn axes(&self) -> (&[u8], &[u8], &[u8]) {
        (&self.columns.x, &self.columns.y, &self.columns.z)
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    pub fn frame(
        &self,
        index: usize,
    ) -> Option<RawFrame> {
        self.columns
            .get(index)
            .map(|t| RawFrame::new(index as u64, t))
    }

    pub fn frames(&self) -> impl ExactSizeIterator<Item = RawFrame> + '_ {
        (0..self.len()).map(move |i| RawFrame::new(i as u64, self.triplet_at(i)))
    }

    /// Модуль вектора √(x² + y² + z²) по сырым значениям.
    pub fn rss(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.triplet_at(i).rss())
    }

    /// Колонка оси в g: `(raw - 127) / 63`.
    pub fn axis_g(
        &self,
        axis: Axis,
    ) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.axis(axis).iter().map(|&v| raw_to_g(v))
    }

    /// Модуль вектора ускорения в g.
    pub fn rss_g(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| {
            let t = self.triplet_at(i);
            let (x, y, z) = (raw_to_g(t.x), raw_to_g(t.y), raw_to_g(t.z));

            (x * x + y * y + z * z).sqrt()
        })
    }

    pub fn into_columns(self) -> (AxisColumns, Vec<NaiveDateTime>) {
        (self.columns, self.timestamps)
    }

    #[inline]
    fn triplet_at(
        &self,
        i: usize,
    ) -> Triplet {
        Triplet::new(self.columns.x[i], self.columns.y[i], self.columns.z[i])
    }
}

////////////////////////////////////////////////////////////////////////////////
// DecodedFile
////////////////////////////////////////////////////////////////////////////////

impl DecodedFile {
    pub fn new(
        metadata: FileMetadata,
        signal: Signal,
    ) -> Self {
        Self { metadata, signal }
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn into_parts(self) -> (FileMetadata, Signal) {
        (self.metadata, self.signal)
    }
}
