//! Пакетная распаковка тела в колонки осей.
//!
//! Работает в два прохода по записям: первый считает выборки и проверяет
//! структуру, второй заполняет заранее выделенные колонки. В горячем цикле
//! нет выделений памяти на выборку, повторы разворачиваются через
//! `Vec::resize`.

use log::debug;
use palraw_types::{PalError, PalResult, Triplet};

use crate::record::{parse_record, BodyLayout, Record, Step};

/// Колонки осей после распаковки тела.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisColumns {
    pub x: Vec<u8>,
    pub y: Vec<u8>,
    pub z: Vec<u8>,
}

/// Итог прохода по записям тела.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BodySummary {
    /// Всего выборок после развёртки повторов.
    pub samples: u64,
    /// Литеральных записей.
    pub literal_records: u64,
    /// Записей повтора (escape и duplicate).
    pub repeat_records: u64,
    /// Байт тела, занятых записями (без маркера и хвоста за ним).
    pub bytes_consumed: u64,
    /// Разбор остановлен маркером конца данных.
    pub ended_by_marker: bool,
}

impl AxisColumns {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    pub fn push(
        &mut self,
        t: Triplet,
    ) {
        self.x.push(t.x);
        self.y.push(t.y);
        self.z.push(t.z);
    }

    /// Добавляет `count` копий триплета.
    #[inline]
    pub fn push_repeat(
        &mut self,
        t: Triplet,
        count: usize,
    ) {
        let len = self.x.len() + count;
        self.x.resize(len, t.x);
        self.y.resize(len, t.y);
        self.z.resize(len, t.z);
    }

    pub fn get(
        &self,
        index: usize,
    ) -> Option<Triplet> {
        Some(Triplet::new(
            *self.x.get(index)?,
            *self.y.get(index)?,
            *self.z.get(index)?,
        ))
    }

    pub fn last(&self) -> Option<Triplet> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Все ли колонки одной длины.
    pub fn is_aligned(&self) -> bool {
        self.x.len() == self.y.len() && self.y.len() == self.z.len()
    }
}

/// Проходит по записям тела без материализации выборок.
pub fn scan_body(
    body: &[u8],
    layout: &BodyLayout,
) -> PalResult<BodySummary> {
    walk_records(body, layout, |_, _| Ok(()))
}

/// Распаковывает тело в колонки осей.
///
/// При любой ошибке частично заполненные колонки отбрасываются.
pub fn decode_body(
    body: &[u8],
    layout: &BodyLayout,
) -> PalResult<AxisColumns> {
    let summary = scan_body(body, layout)?;

    let capacity = usize::try_from(summary.samples).map_err(|_| {
        PalError::overflow(format!(
            "{} samples do not fit in memory on this platform",
            summary.samples
        ))
    })?;

    let mut columns = AxisColumns::with_capacity(capacity);

    walk_records(body, layout, |record, offset| {
        match record {
            Record::Literal(t) => columns.push(t),
            Record::Run { count, triplet } => columns.push_repeat(triplet, count as usize),
            Record::RepeatPrevious { count } => {
                let prev = columns
                    .last()
                    .ok_or_else(|| no_previous_sample(offset))?;
                columns.push_repeat(prev, count as usize);
            }
        }
        Ok(())
    })?;

    if columns.len() != capacity || !columns.is_aligned() {
        return Err(PalError::internal(format!(
            "Decoded {} samples, counting pass expected {capacity}",
            columns.len()
        )));
    }

    debug!(
        "Decoded body: {} samples from {} literal + {} repeat records ({} bytes)",
        summary.samples, summary.literal_records, summary.repeat_records, summary.bytes_consumed,
    );

    Ok(columns)
}

/// Общий цикл разбора. `visit` получает каждую запись и её абсолютное
/// смещение.
fn walk_records<F>(
    body: &[u8],
    layout: &BodyLayout,
    mut visit: F,
) -> PalResult<BodySummary>
where
    F: FnMut(Record, u64) -> PalResult<()>,
{
    let (body, declared) = match layout.declared_len {
        Some(d) if (body.len() as u64) > d => (&body[..d as usize], d),
        Some(d) => (body, d),
        None => (body, body.len() as u64),
    };

    let mut summary = BodySummary::default();
    let mut pos = 0usize;

    loop {
        let offset = layout.origin + pos as u64;

        match parse_record(&body[pos..], true, layout, offset)? {
            Step::Record { record, len } => {
                if matches!(record, Record::RepeatPrevious { .. }) && summary.samples == 0 {
                    return Err(no_previous_sample(offset));
                }

                summary.samples = summary
                    .samples
                    .checked_add(record.samples())
                    .ok_or_else(|| PalError::overflow("Sample count exceeds u64"))?;

                match record {
                    Record::Literal(_) => summary.literal_records += 1,
                    _ => summary.repeat_records += 1,
                }

                visit(record, offset)?;
                pos += len;
            }
            Step::End => break,
            Step::NeedMore => {
                return Err(PalError::internal(
                    "Record parser asked for more data at end of body",
                ));
            }
        }
    }

    summary.bytes_consumed = pos as u64;
    summary.ended_by_marker = pos < body.len();

    if summary.ended_by_marker {
        debug!(
            "End-of-data marker at byte {}, {} trailing bytes ignored",
            layout.origin + pos as u64,
            body.len() - pos
        );
    } else if (body.len() as u64) < declared {
        return Err(PalError::format_at(
            layout.origin + pos as u64,
            format!(
                "Body shorter than declared: {} of {declared} bytes",
                body.len()
            ),
        ));
    }

    Ok(summary)
}

fn no_previous_sample(offset: u64) -> PalError {
    PalError::format_at(offset, "Repeat record before the first sample")
}

#[cfg(test)]
mod tests {
    use palraw_types::{CompressionMode, FileVariant};

    use super::*;

    fn triplets(columns: &AxisColumns) -> Vec<(u8, u8, u8)> {
        (0..columns.len())
            .map(|i| {
                let t = columns.get(i).unwrap();
                (t.x, t.y, t.z)
            })
            .collect()
    }

    #[test]
    fn test_worked_example() {
        // literal(1,2,3), repeat(3, (4,5,6))
        let body = [1, 2, 3, 0, 0, 0, 3, 0, 4, 5, 6];
        let columns = decode_body(&body, &BodyLayout::run_length()).unwrap();

        assert_eq!(
            triplets(&columns),
            vec![(1, 2, 3), (4, 5, 6), (4, 5, 6), (4, 5, 6)]
        );
        assert_eq!(columns.x, vec![1, 4, 4, 4]);
        assert_eq!(columns.y, vec![2, 5, 5, 5]);
        assert_eq!(columns.z, vec![3, 6, 6, 6]);
    }

    #[test]
    fn test_scan_counts() {
        let body = [1, 2, 3, 0, 0, 0, 0xE8, 0x03, 4, 5, 6, 7, 8, 9];
        let summary = scan_body(&body, &BodyLayout::run_length()).unwrap();

        assert_eq!(summary.samples, 1 + 1000 + 1);
        assert_eq!(summary.literal_records, 2);
        assert_eq!(summary.repeat_records, 1);
        assert_eq!(summary.bytes_consumed, body.len() as u64);
        assert!(!summary.ended_by_marker);
    }

    #[test]
    fn test_zero_repeat_is_error() {
        let body = [1, 2, 3, 0, 0, 0, 0, 0, 4, 5, 6];
        let layout = BodyLayout {
            origin: 1024,
            ..BodyLayout::run_length()
        };
        let err = decode_body(&body, &layout).unwrap_err();

        assert!(matches!(err, PalError::Format { .. }));
        assert_eq!(err.offset(), Some(1027));
    }

    #[test]
    fn test_truncated_escape_points_at_record_start() {
        let body = [1, 2, 3, 4, 5, 6, 0, 0, 0, 3, 0];
        let layout = BodyLayout {
            origin: 1024,
            ..BodyLayout::run_length()
        };
        let err = decode_body(&body, &layout).unwrap_err();

        assert_eq!(err.offset(), Some(1030));
    }

    #[test]
    fn test_body_shorter_than_declared() {
        let body = [1, 2, 3, 4, 5, 6];
        let layout = BodyLayout {
            origin: 1024,
            declared_len: Some(9),
            ..BodyLayout::run_length()
        };
        let err = decode_body(&body, &layout).unwrap_err();

        assert!(matches!(err, PalError::Format { .. }));
        assert_eq!(err.offset(), Some(1030));
    }

    #[test]
    fn test_body_longer_than_declared_is_cut() {
        let body = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        let layout = BodyLayout {
            declared_len: Some(6),
            ..BodyLayout::run_length()
        };
        let columns = decode_body(&body, &layout).unwrap();

        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn test_tail_marker_stops_decoding() {
        let mut body = vec![1, 2, 3, 4, 5, 6];
        body.extend_from_slice(b"tail");
        body.extend_from_slice(&[0xAA; 17]);

        let summary = scan_body(&body, &BodyLayout::run_length()).unwrap();
        assert!(summary.ended_by_marker);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.bytes_consumed, 6);

        let columns = decode_body(&body, &BodyLayout::run_length()).unwrap();
        assert_eq!(triplets(&columns), vec![(1, 2, 3), (4, 5, 6)]);
    }

    #[test]
    fn test_duplicate_mode_expands_previous() {
        let body = [10, 20, 30, 0, 0, 2, 0xFF, 0xFF, 0xFF, 40, 50, 60];
        let layout = BodyLayout {
            compression: CompressionMode::Duplicate,
            ..BodyLayout::run_length()
        };
        let columns = decode_body(&body, &layout).unwrap();

        assert_eq!(
            triplets(&columns),
            vec![
                (10, 20, 30),
                (10, 20, 30),
                (10, 20, 30),
                (10, 20, 30),
                (40, 50, 60)
            ]
        );
    }

    #[test]
    fn test_duplicate_before_first_sample() {
        let layout = BodyLayout {
            compression: CompressionMode::Duplicate,
            origin: 1023,
            variant: FileVariant::Dat,
            ..BodyLayout::run_length()
        };
        let err = decode_body(&[0, 0, 4, 1, 2, 3], &layout).unwrap_err();

        assert_eq!(err.offset(), Some(1023));
    }

    #[test]
    fn test_empty_body() {
        let columns = decode_body(&[], &BodyLayout::run_length()).unwrap();

        assert!(columns.is_empty());
        assert_eq!(columns.last(), None);
    }

    #[test]
    fn test_capacity_is_exact() {
        let body = [0, 0, 0, 0xFF, 0xFF, 1, 1, 1];
        let columns = decode_body(&body, &BodyLayout::run_length()).unwrap();

        assert_eq!(columns.len(), 65_535);
        assert_eq!(columns.x.capacity(), 65_535);
    }
}
