//! Разбор заголовка и перезапись метки файла.

use std::io::{ErrorKind, Read};

use log::{debug, warn};
use palraw_types::{
    CompressionMode, FileMetadata, FileVariant, PalError, PalResult, StartCondition,
    StopCondition,
};

use crate::{
    binary::read_packed_datetime,
    format::{
        lookup, sample_rate_from_code, AXES_OFFSET, AXES_TABLE, COMPRESSION_OFFSET,
        DEVICE_ID_DIGITS_OFFSET, DEVICE_ID_EXTRA_OFFSET, DEVICE_ID_HIGH_OFFSET,
        DEVICE_ID_YEAR_OFFSET, FILE_CODE_FILL, FILE_CODE_LEN, FILE_CODE_OFFSET,
        FIRMWARE_HI_OFFSET, FIRMWARE_HI_WEIGHT, FIRMWARE_LO_OFFSET, RANGE_OFFSET, RANGE_TABLE,
        SAMPLE_RATE_OFFSET, START_CONDITION_OFFSET, START_DATETIME_OFFSET,
        STOP_CONDITION_OFFSET, STOP_DATETIME_OFFSET, TEN_BIT_FLAG,
    },
};

/// Разбирает заголовок из начала `buf`.
///
/// `buf` может содержать и тело файла, читаются только первые
/// `variant.header_len()` байт. Поле `body_len` остаётся `None`: длину тела
/// заполняет вызывающая сторона, которой известен размер файла.
pub fn parse_header(
    buf: &[u8],
    variant: FileVariant,
) -> PalResult<FileMetadata> {
    let header_len = variant.header_len();

    if buf.len() < header_len {
        return Err(PalError::format_at(
            buf.len() as u64,
            format!(
                "Header too short: {} < {header_len} bytes ({variant})",
                buf.len()
            ),
        ));
    }

    let buf = &buf[..header_len];

    let firmware =
        buf[FIRMWARE_HI_OFFSET] as u16 * FIRMWARE_HI_WEIGHT + buf[FIRMWARE_LO_OFFSET] as u16;

    let range_byte = buf[RANGE_OFFSET];
    let (bit_depth, range_code) = if range_byte & TEN_BIT_FLAG == 0 {
        (8, range_byte)
    } else {
        (10, range_byte - TEN_BIT_FLAG)
    };

    let range_g = lookup(&RANGE_TABLE, range_code);
    if range_g.is_none() {
        warn!("Unknown range code {range_code} at byte {RANGE_OFFSET}");
    }

    let sample_rate_hz = sample_rate_from_code(buf[SAMPLE_RATE_OFFSET]).ok_or_else(|| {
        PalError::configuration(format!(
            "Sampling frequency code {} at byte {SAMPLE_RATE_OFFSET} does not describe a rate",
            buf[SAMPLE_RATE_OFFSET]
        ))
    })?;

    let compression = CompressionMode::from_u8(buf[COMPRESSION_OFFSET]).ok_or_else(|| {
        PalError::format_at(
            COMPRESSION_OFFSET as u64,
            format!("Unknown compression mode: {}", buf[COMPRESSION_OFFSET]),
        )
    })?;

    let axes = lookup(&AXES_TABLE, buf[AXES_OFFSET]);
    if axes.is_none() {
        warn!("Unknown axes code {} at byte {AXES_OFFSET}", buf[AXES_OFFSET]);
    }

    let start = read_packed_datetime(buf, START_DATETIME_OFFSET).ok_or_else(|| {
        PalError::format_at(
            START_DATETIME_OFFSET as u64,
            "Start date-time is not a valid calendar date",
        )
    })?;

    // Запись, прерванная до штатной остановки, оставляет мусор в этом поле
    let stop = read_packed_datetime(buf, STOP_DATETIME_OFFSET);
    if stop.is_none() {
        debug!("Stop date-time is not set");
    }

    let start_condition = StartCondition::from_u8(buf[START_CONDITION_OFFSET]);
    if let StartCondition::Unknown(code) = start_condition {
        warn!("Unknown start condition {code} at byte {START_CONDITION_OFFSET}");
    }

    let stop_condition = StopCondition::from_u8(buf[STOP_CONDITION_OFFSET]);
    if let StopCondition::Unknown(code) = stop_condition {
        warn!("Unknown stop condition {code} at byte {STOP_CONDITION_OFFSET}");
    }

    let metadata = FileMetadata {
        variant,
        firmware,
        bit_depth,
        range_g,
        sample_rate_hz,
        axes,
        start,
        stop,
        start_condition,
        stop_condition,
        file_code: read_file_code(buf)?,
        device_id: device_id(buf),
        compression,
        body_len: None,
    };

    debug!(
        "Parsed {} header: firmware={}, {} Hz, compression={}, start={}, code='{}'",
        variant,
        metadata.firmware,
        metadata.sample_rate_hz,
        metadata.compression,
        metadata.start,
        metadata.file_code,
    );

    Ok(metadata)
}

/// Читает ровно один заголовок из потока и разбирает его.
pub fn read_header<R: Read>(
    inner: &mut R,
    variant: FileVariant,
) -> PalResult<FileMetadata> {
    let mut buf = vec![0u8; variant.header_len()];

    if let Err(e) = inner.read_exact(&mut buf) {
        return Err(match e.kind() {
            ErrorKind::UnexpectedEof => PalError::format("Stream ended inside the header"),
            _ => PalError::Io(e),
        });
    }

    parse_header(&buf, variant)
}

/// Метка файла: байты 512..520 без нулевого заполнения.
pub fn read_file_code(buf: &[u8]) -> PalResult<String> {
    let end = FILE_CODE_OFFSET + FILE_CODE_LEN;

    let Some(field) = buf.get(FILE_CODE_OFFSET..end) else {
        return Err(PalError::format_at(
            buf.len() as u64,
            format!("Buffer of {} bytes has no file code field", buf.len()),
        ));
    };

    Ok(field
        .iter()
        .filter(|&&b| b != FILE_CODE_FILL)
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end()
        .to_string())
}

/// Проверяет метку и возвращает её байтовое представление в заголовке.
///
/// Допустимы печатные ASCII символы без пробела, не длиннее 8.
pub fn encode_file_code(code: &str) -> PalResult<[u8; FILE_CODE_LEN]> {
    let bytes = code.as_bytes();

    if bytes.len() > FILE_CODE_LEN {
        return Err(PalError::validation(format!(
            "File code '{code}' is longer than {FILE_CODE_LEN} characters"
        )));
    }

    if let Some(bad) = bytes.iter().find(|b| !b.is_ascii_graphic()) {
        return Err(PalError::validation(format!(
            "File code '{}' contains byte 0x{bad:02x} outside printable ASCII",
            code.escape_default()
        )));
    }

    let mut field = [FILE_CODE_FILL; FILE_CODE_LEN];
    field[..bytes.len()].copy_from_slice(bytes);

    Ok(field)
}

/// Перезаписывает метку файла в буфере заголовка.
///
/// Меняются только байты 512..520, остальной буфер не трогается.
pub fn set_file_code(
    buf: &mut [u8],
    new_code: &str,
) -> PalResult<()> {
    let field = encode_file_code(new_code)?;
    let end = FILE_CODE_OFFSET + FILE_CODE_LEN;

    if buf.len() < end {
        return Err(PalError::format_at(
            buf.len() as u64,
            format!("Buffer of {} bytes has no file code field", buf.len()),
        ));
    }

    buf[FILE_CODE_OFFSET..end].copy_from_slice(&field);

    Ok(())
}

fn device_id(buf: &[u8]) -> u32 {
    // Первая цифра серийного номера: последняя цифра года выпуска
    let year_digit = (buf[DEVICE_ID_YEAR_OFFSET] % 10) as u32;
    let digits = &buf[DEVICE_ID_DIGITS_OFFSET..DEVICE_ID_DIGITS_OFFSET + 3];

    year_digit * 100_000
        + buf[DEVICE_ID_HIGH_OFFSET] as u32 * 10_000
        + buf[DEVICE_ID_EXTRA_OFFSET] as u32 * 4_096
        + digits[0] as u32 * 256
        + digits[1] as u32 * 16
        + digits[2] as u32
}
