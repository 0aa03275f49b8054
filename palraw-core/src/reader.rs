use std::io::{ErrorKind, Read};

use log::{debug, trace};
use palraw_types::{PalError, PalResult, RawFrame, Triplet};

use crate::{
    body::AxisColumns,
    format::RLE_RECORD_SIZE,
    record::{parse_record, BodyLayout, Record, Step},
};

/// Размер буфера чтения по умолчанию.
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

/// Минимальный буфер: в нём должна помещаться самая длинная запись вместе
/// с упреждающим чтением маркера конца.
const MIN_READ_BUFFER: usize = 2 * RLE_RECORD_SIZE;

/// Потоковый декодер тела.
///
/// Выдаёт выборки по одной, держа в памяти только буфер чтения
/// фиксированного размера. Владеет источником: при удалении читателя
/// (в том числе на середине файла) файл закрывается.
pub struct FrameReader<R: Read> {
    reader: R,
    layout: BodyLayout,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    /// Байт тела, уже разобранных в записи.
    consumed: u64,
    /// Байт тела, прочитанных из источника.
    read_total: u64,
    /// Незавершённый повтор: триплет и сколько копий осталось выдать.
    pending: Option<(Triplet, u32)>,
    last: Option<Triplet>,
    next_index: u64,
    stats: ReadStats,
    eof: bool,
    short: bool,
    done: bool,
}

/// Статистика, накопленная [`FrameReader`] в процессе чтения.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadStats {
    /// Литеральных записей.
    pub literal_records: u64,
    /// Записей повтора.
    pub repeat_records: u64,
    /// Выданных выборок.
    pub samples: u64,
    /// Байт тела, разобранных в записи.
    pub bytes_processed: u64,
    /// Чтение остановлено маркером конца данных.
    pub ended_by_marker: bool,
}

impl<R: Read> FrameReader<R> {
    /// Создаёт декодер поверх потока, стоящего на первом байте тела.
    pub fn new(
        inner: R,
        layout: BodyLayout,
    ) -> Self {
        Self::with_capacity(inner, layout, DEFAULT_READ_BUFFER)
    }

    pub fn with_capacity(
        inner: R,
        layout: BodyLayout,
        capacity: usize,
    ) -> Self {
        Self {
            reader: inner,
            layout,
            buf: vec![0u8; capacity.max(MIN_READ_BUFFER)],
            start: 0,
            end: 0,
            consumed: 0,
            read_total: 0,
            pending: None,
            last: None,
            next_index: 0,
            stats: ReadStats::default(),
            eof: false,
            short: false,
            done: false,
        }
    }

    /// Возвращает следующую выборку или `None` в конце тела.
    ///
    /// После первой ошибки читатель больше ничего не выдаёт.
    pub fn next_frame(&mut self) -> Option<PalResult<RawFrame>> {
        if self.done {
            return None;
        }

        if let Some(frame) = self.take_pending() {
            return Some(Ok(frame));
        }

        loop {
            let offset = self.layout.origin + self.consumed;
            let step = parse_record(
                &self.buf[self.start..self.end],
                self.eof,
                &self.layout,
                offset,
            );

            match step {
                Ok(Step::Record { record, len }) => {
                    self.start += len;
                    self.consumed += len as u64;
                    self.stats.bytes_processed += len as u64;

                    let frame = match record {
                        Record::Literal(t) => {
                            self.stats.literal_records += 1;
                            self.emit(t)
                        }
                        Record::Run { count, triplet } => {
                            trace!("Run of {count} x {triplet} at byte {offset}");
                            self.stats.repeat_records += 1;
                            self.pending = Some((triplet, count));
                            self.take_pending()?
                        }
                        Record::RepeatPrevious { count } => {
                            self.stats.repeat_records += 1;
                            let Some(prev) = self.last else {
                                return self.fail(PalError::format_at(
                                    offset,
                                    "Repeat record before the first sample",
                                ));
                            };
                            self.pending = Some((prev, count));
                            self.take_pending()?
                        }
                    };

                    return Some(Ok(frame));
                }
                Ok(Step::NeedMore) => {
                    if let Err(e) = self.fill() {
                        return self.fail(e);
                    }
                }
                Ok(Step::End) => return self.finish(offset),
                Err(e) => return self.fail(e),
            }
        }
    }

    /// Дочитывает остаток тела в колонки осей.
    pub fn into_columns(mut self) -> PalResult<AxisColumns> {
        let mut columns = AxisColumns::default();

        while let Some(frame) = self.next_frame() {
            columns.push(frame?.triplet);
        }

        Ok(columns)
    }

    /// Параметры разбора тела.
    pub fn layout(&self) -> &BodyLayout {
        &self.layout
    }

    /// Накопленная статистика чтения.
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    fn take_pending(&mut self) -> Option<RawFrame> {
        let (triplet, remaining) = self.pending?;

        self.pending = if remaining > 1 {
            Some((triplet, remaining - 1))
        } else {
            None
        };

        Some(self.emit(triplet))
    }

    #[inline]
    fn emit(
        &mut self,
        triplet: Triplet,
    ) -> RawFrame {
        let frame = RawFrame::new(self.next_index, triplet);

        self.next_index += 1;
        self.last = Some(triplet);
        self.stats.samples += 1;

        frame
    }

    /// Сдвигает неразобранный остаток в начало буфера и дочитывает поток.
    fn fill(&mut self) -> PalResult<()> {
        if self.eof {
            return Err(PalError::internal(
                "Record parser asked for more data after end of stream",
            ));
        }

        self.buf.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;

        let mut room = self.buf.len() - self.end;
        if let Some(declared) = self.layout.declared_len {
            room = room.min((declared - self.read_total).min(usize::MAX as u64) as usize);
        }

        if room == 0 {
            self.eof = true;
            return Ok(());
        }

        loop {
            match self.reader.read(&mut self.buf[self.end..self.end + room]) {
                Ok(0) => {
                    self.eof = true;
                    self.short = self
                        .layout
                        .declared_len
                        .is_some_and(|declared| self.read_total < declared);
                    return Ok(());
                }
                Ok(n) => {
                    self.end += n;
                    self.read_total += n as u64;
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(PalError::Io(e)),
            }
        }
    }

    fn finish(
        &mut self,
        offset: u64,
    ) -> Option<PalResult<RawFrame>> {
        self.stats.ended_by_marker = self.start < self.end;

        if !self.stats.ended_by_marker && self.short {
            let declared = self.layout.declared_len.unwrap_or_default();

            return self.fail(PalError::format_at(
                offset,
                format!(
                    "Body shorter than declared: {} of {declared} bytes",
                    self.read_total
                ),
            ));
        }

        debug!(
            "Stream decoded: {} samples, {} literal + {} repeat records, marker={}",
            self.stats.samples,
            self.stats.literal_records,
            self.stats.repeat_records,
            self.stats.ended_by_marker,
        );

        self.done = true;
        None
    }

    fn fail(
        &mut self,
        e: PalError,
    ) -> Option<PalResult<RawFrame>> {
        self.done = true;
        self.pending = None;
        Some(Err(e))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = PalResult<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}

impl<R: Read> std::iter::FusedIterator for FrameReader<R> {}
