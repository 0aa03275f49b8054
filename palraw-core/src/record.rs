//! Грамматика записей тела файла.
//!
//! Тело разбирается по границам триплетов. Режим упаковки из заголовка
//! определяет, какие триплеты являются служебными:
//!
//! ```text
//! None       [x y z]                        : одна выборка
//! RunLength  [x y z]                        : одна выборка
//!            [00 00 00][count u16 LE][x y z]: count копий (x, y, z)
//! Duplicate  [x y z]                        : одна выборка
//!            [00 00 n]                      : n копий предыдущей выборки
//!                                              (n + 1 для прошивок < 218)
//!            [FE FE FE] / [FF FF FF]        : одна копия предыдущей
//! ```
//!
//! Во всех режимах разбор останавливается на маркере конца данных варианта
//! файла (`tail` для `.datx`, 8-байтный паттерн для `.dat`).

use palraw_types::{CompressionMode, FileMetadata, FileVariant, PalError, PalResult, Triplet};

use crate::{
    binary::read_u16_local,
    format::{
        DATX_TAIL, DUPLICATE_BIAS_FIRMWARE, FILL_TRIPLETS, RECORD_SIZE, RLE_RECORD_SIZE,
        RLE_SENTINEL,
    },
};

/// Параметры разбора тела, получаемые из заголовка.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLayout {
    pub compression: CompressionMode,
    pub variant: FileVariant,
    pub firmware: u16,
    /// Абсолютное смещение первого байта тела в файле
    pub origin: u64,
    /// Объявленная длина тела; `None`: до конца потока
    pub declared_len: Option<u64>,
}

/// Одна разобранная запись.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Literal(Triplet),
    Run { count: u32, triplet: Triplet },
    RepeatPrevious { count: u32 },
}

/// Результат попытки разобрать запись в начале буфера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Запись длиной `len` байт
    Record { record: Record, len: usize },
    /// Байт недостаточно, а поток ещё не закончился
    NeedMore,
    /// Конец данных: буфер исчерпан или найден маркер
    End,
}

impl BodyLayout {
    pub fn from_metadata(meta: &FileMetadata) -> Self {
        Self {
            compression: meta.compression,
            variant: meta.variant,
            firmware: meta.firmware,
            origin: meta.header_len() as u64,
            declared_len: meta.body_len,
        }
    }

    /// Тело `.datx` с escape-записями, смещения от нуля.
    pub fn run_length() -> Self {
        Self {
            compression: CompressionMode::RunLength,
            variant: FileVariant::Datx,
            firmware: DUPLICATE_BIAS_FIRMWARE,
            origin: 0,
            declared_len: None,
        }
    }

    /// Поправка к счётчику повторов в режиме `Duplicate`.
    pub fn duplicate_bias(&self) -> u32 {
        (self.firmware < DUPLICATE_BIAS_FIRMWARE) as u32
    }
}

impl Record {
    /// Сколько выборок даёт запись.
    #[inline]
    pub fn samples(&self) -> u64 {
        match self {
            Record::Literal(_) => 1,
            Record::Run { count, .. } | Record::RepeatPrevious { count } => *count as u64,
        }
    }
}

/// Разбирает запись в начале `buf`.
///
/// `offset`: абсолютное смещение `buf[0]` в файле, оно попадает в ошибки.
/// При `at_eof == false` нехватка байт даёт [`Step::NeedMore`], иначе
/// ошибку формата, указывающую на первый байт неполной записи.
#[inline]
pub fn parse_record(
    buf: &[u8],
    at_eof: bool,
    layout: &BodyLayout,
    offset: u64,
) -> PalResult<Step> {
    if buf.is_empty() {
        return Ok(if at_eof { Step::End } else { Step::NeedMore });
    }

    if !at_eof && buf.len() < layout.variant.tail_lookahead() {
        return Ok(Step::NeedMore);
    }

    if is_tail(buf, layout.variant) {
        return Ok(Step::End);
    }

    if buf.len() < RECORD_SIZE {
        return Err(incomplete(offset, RECORD_SIZE, buf.len()));
    }

    let raw = [buf[0], buf[1], buf[2]];

    let record = match layout.compression {
        CompressionMode::None => Record::Literal(Triplet::from_bytes(raw)),

        CompressionMode::RunLength if raw == RLE_SENTINEL => {
            if buf.len() < RLE_RECORD_SIZE {
                if !at_eof {
                    return Ok(Step::NeedMore);
                }
                return Err(incomplete(offset, RLE_RECORD_SIZE, buf.len()));
            }

            let mut off = RECORD_SIZE;
            let count = read_u16_local(buf, &mut off) as u32;

            if count == 0 {
                return Err(PalError::format_at(
                    offset,
                    "Run-length record with zero repeat count",
                ));
            }

            let triplet = Triplet::from_bytes([buf[off], buf[off + 1], buf[off + 2]]);

            return Ok(Step::Record {
                record: Record::Run { count, triplet },
                len: RLE_RECORD_SIZE,
            });
        }
        CompressionMode::RunLength => Record::Literal(Triplet::from_bytes(raw)),

        CompressionMode::Duplicate if FILL_TRIPLETS.contains(&raw) => {
            Record::RepeatPrevious { count: 1 }
        }
        CompressionMode::Duplicate if raw[0] == 0 && raw[1] == 0 => {
            let count = raw[2] as u32 + layout.duplicate_bias();

            if count == 0 {
                return Err(PalError::format_at(
                    offset,
                    "Duplicate record with zero repeat count",
                ));
            }

            Record::RepeatPrevious { count }
        }
        CompressionMode::Duplicate => Record::Literal(Triplet::from_bytes(raw)),
    };

    Ok(Step::Record {
        record,
        len: RECORD_SIZE,
    })
}

/// Проверяет маркер конца данных в начале `buf`.
#[inline]
pub fn is_tail(
    buf: &[u8],
    variant: FileVariant,
) -> bool {
    match variant {
        FileVariant::Datx => buf.len() >= DATX_TAIL.len() && buf[..DATX_TAIL.len()] == DATX_TAIL,
        FileVariant::Dat => {
            buf.len() >= 8
                && buf[0] == 0
                && buf[1] == 0
                && buf[2] > 0
                && buf[3] == 0
                && buf[4] == 0
                && buf[5] > 0
                && buf[6] > 0
                && buf[7] == 0
        }
    }
}

fn incomplete(
    offset: u64,
    need: usize,
    have: usize,
) -> PalError {
    PalError::format_at(
        offset,
        format!("Incomplete record: need {need} bytes, {have} left in body"),
    )
}
