//! Раскладка raw-файла activPAL.
//!
//! Файл состоит из заголовка фиксированного размера (1023 байта для `.dat`,
//! 1024 для `.datx`) и тела из трёхбайтных записей. Все смещения ниже :
//! абсолютные, от начала файла. Многобайтовые поля хранятся в порядке
//! little-endian.
//!
//! ```text
//! [10..15]   DEVICE_ID        разряды серийного номера (+ байт 40)
//! [17]       FIRMWARE_LO      младшая часть версии прошивки
//! [35]       SAMPLE_RATE      частота дискретизации, Гц
//! [36]       COMPRESSION      режим упаковки тела
//! [38]       RANGE            бит 7: 10-битный АЦП, младшие биты: диапазон
//! [39]       FIRMWARE_HI      старшая часть версии прошивки
//! [256..262] START            час, минута, секунда, день, месяц, год - 2000
//! [262..268] STOP             та же упаковка
//! [268]      START_CONDITION
//! [275]      STOP_CONDITION
//! [280]      AXES
//! [512..520] FILE_CODE        ASCII, добивается нулями
//! ```

pub use palraw_types::{DATX_HEADER_SIZE, DAT_HEADER_SIZE};

/// Минимальная длина буфера, из которого читаются поля заголовка.
pub const MIN_HEADER_SIZE: usize = DAT_HEADER_SIZE;

pub const DEVICE_ID_YEAR_OFFSET: usize = 10;
pub const DEVICE_ID_DIGITS_OFFSET: usize = 11;
pub const DEVICE_ID_HIGH_OFFSET: usize = 14;
pub const DEVICE_ID_EXTRA_OFFSET: usize = 40;

pub const FIRMWARE_LO_OFFSET: usize = 17;
pub const FIRMWARE_HI_OFFSET: usize = 39;

/// Множитель старшего байта прошивки. Устройство хранит версию как
/// `hi * 255 + lo`, а не `hi * 256 + lo`.
pub const FIRMWARE_HI_WEIGHT: u16 = 255;

pub const SAMPLE_RATE_OFFSET: usize = 35;
pub const COMPRESSION_OFFSET: usize = 36;
pub const RANGE_OFFSET: usize = 38;

/// Бит 10-битного АЦП в байте диапазона.
pub const TEN_BIT_FLAG: u8 = 0x80;

pub const START_DATETIME_OFFSET: usize = 256;
pub const STOP_DATETIME_OFFSET: usize = 262;
pub const PACKED_DATETIME_SIZE: usize = 6;

/// Годы в заголовке хранятся как смещение от 2000.
pub const YEAR_BASE: i32 = 2000;

pub const START_CONDITION_OFFSET: usize = 268;
pub const STOP_CONDITION_OFFSET: usize = 275;
pub const AXES_OFFSET: usize = 280;

pub const FILE_CODE_OFFSET: usize = 512;
pub const FILE_CODE_LEN: usize = 8;
pub const FILE_CODE_FILL: u8 = 0x00;

/// Размер одной записи тела (триплет x, y, z).
pub const RECORD_SIZE: usize = 3;

/// Триплет, открывающий escape-запись в режиме `RunLength`.
///
/// `00 00 00` соответствует −2g по всем осям одновременно, такой
/// литерал физически не встречается.
pub const RLE_SENTINEL: [u8; 3] = [0x00, 0x00, 0x00];

/// Полный размер escape-записи: сентинел + u16 счётчик + триплет.
pub const RLE_RECORD_SIZE: usize = RECORD_SIZE + 2 + RECORD_SIZE;

/// Максимальное число повторов в одной escape-записи.
pub const RLE_MAX_RUN: u32 = u16::MAX as u32;

/// Прошивки ниже этой версии кодируют `n` повторов как `n - 1`.
pub const DUPLICATE_BIAS_FIRMWARE: u16 = 218;

/// Заполнители, которыми прошивка помечает пропущенную выборку.
pub const FILL_TRIPLETS: [[u8; 3]; 2] = [[0xFE, 0xFE, 0xFE], [0xFF, 0xFF, 0xFF]];

/// Маркер конца данных `.datx`.
pub const DATX_TAIL: [u8; 4] = *b"tail";

/// Сырое значение, соответствующее 0g.
pub const ACCEL_ZERO: f64 = 127.0;

/// Сырых единиц на 1g.
pub const ACCEL_COUNTS_PER_G: f64 = 63.0;

/// Таблица кодов диапазона измерения → ±g.
pub const RANGE_TABLE: [(u8, u8); 3] = [(0, 2), (1, 4), (2, 8)];

/// Таблица кодов осей → количество осей.
pub const AXES_TABLE: [(u8, u8); 2] = [(0, 3), (1, 1)];

/// Переводит код частоты из заголовка в Гц.
///
/// Прошивка записывает частоту напрямую; `0` не описывает ни одну частоту.
pub fn sample_rate_from_code(code: u8) -> Option<u32> {
    match code {
        0 => None,
        hz => Some(hz as u32),
    }
}

pub(crate) fn lookup(
    table: &[(u8, u8)],
    code: u8,
) -> Option<u8> {
    table.iter().find(|(c, _)| *c == code).map(|(_, v)| *v)
}

pub(crate) fn reverse_lookup(
    table: &[(u8, u8)],
    value: u8,
) -> Option<u8> {
    table.iter().find(|(_, v)| *v == value).map(|(c, _)| *c)
}
