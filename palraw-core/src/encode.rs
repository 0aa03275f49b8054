//! Запись raw-файлов: заголовок и тело с escape-записями.
//!
//! Устройство не читает файлы обратно, поэтому кодировщик нужен для
//! фикстур, бенчмарков и пересохранения загруженной записи.

use chrono::{NaiveDateTime, TimeDelta};
use palraw_types::{
    CompressionMode, FileMetadata, FileVariant, PalError, PalResult, StartCondition,
    StopCondition, Triplet,
};

use crate::{
    binary::{write_packed_datetime, write_u16_local},
    format::{
        reverse_lookup, AXES_OFFSET, AXES_TABLE, COMPRESSION_OFFSET, DATX_TAIL,
        DEVICE_ID_DIGITS_OFFSET, DEVICE_ID_EXTRA_OFFSET, DEVICE_ID_HIGH_OFFSET,
        DEVICE_ID_YEAR_OFFSET, DUPLICATE_BIAS_FIRMWARE, FILE_CODE_OFFSET, FIRMWARE_HI_OFFSET,
        FIRMWARE_HI_WEIGHT, FIRMWARE_LO_OFFSET, RANGE_OFFSET, RANGE_TABLE, RECORD_SIZE, RLE_MAX_RUN,
        RLE_RECORD_SIZE, RLE_SENTINEL, SAMPLE_RATE_OFFSET, START_CONDITION_OFFSET,
        START_DATETIME_OFFSET, STOP_CONDITION_OFFSET, STOP_DATETIME_OFFSET, TEN_BIT_FLAG,
    },
    header::encode_file_code,
    record::is_tail,
    signal::Signal,
};

/// Наибольший серийный номер, который помещается в поля заголовка.
pub const MAX_DEVICE_ID: u32 = 999_999;

/// Серии короче этой пишутся литералами: escape-запись длиннее.
const MIN_ESCAPED_RUN: u32 = 3;

/// Построитель блока заголовка.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBuilder {
    pub variant: FileVariant,
    pub firmware: u16,
    pub ten_bit: bool,
    /// Диапазон измерения, ±g (2, 4 или 8)
    pub range_g: u8,
    pub sample_rate_hz: u8,
    pub compression: CompressionMode,
    pub start: NaiveDateTime,
    /// `None` оставляет поле нулевым, как у прерванной записи
    pub stop: Option<NaiveDateTime>,
    pub start_condition: StartCondition,
    pub stop_condition: StopCondition,
    /// Количество осей (1 или 3)
    pub axes: u8,
    pub file_code: String,
    pub device_id: u32,
}

/// Упаковщик тела.
///
/// Собирает подряд идущие одинаковые выборки в серии и пишет серию из трёх
/// и более выборок одной escape-записью.
///
/// Литерал, с которого мог бы начаться маркер конца данных варианта, тоже
/// уходит в escape-запись: она начинается с `00 00 00` и маркером не бывает.
#[derive(Debug)]
pub struct BodyEncoder {
    mode: CompressionMode,
    variant: FileVariant,
    out: Vec<u8>,
    run: Option<(Triplet, u32)>,
    samples: u64,
}

////////////////////////////////////////////////////////////////////////////////
// HeaderBuilder
////////////////////////////////////////////////////////////////////////////////

impl HeaderBuilder {
    pub fn new(
        variant: FileVariant,
        sample_rate_hz: u8,
        start: NaiveDateTime,
    ) -> Self {
        Self {
            variant,
            firmware: DUPLICATE_BIAS_FIRMWARE,
            ten_bit: false,
            range_g: 2,
            sample_rate_hz,
            compression: CompressionMode::RunLength,
            start,
            stop: Some(start + TimeDelta::days(1)),
            start_condition: StartCondition::Immediately,
            stop_condition: StopCondition::ProgrammedTime,
            axes: 3,
            file_code: String::new(),
            device_id: 0,
        }
    }

    /// Построитель, воспроизводящий заголовок загруженного файла.
    ///
    /// Неизвестные коды диапазона и осей заменяются значениями по
    /// умолчанию.
    pub fn from_metadata(meta: &FileMetadata) -> PalResult<Self> {
        let sample_rate_hz = u8::try_from(meta.sample_rate_hz).map_err(|_| {
            PalError::validation(format!(
                "Sampling frequency {} Hz does not fit in one header byte",
                meta.sample_rate_hz
            ))
        })?;

        Ok(Self {
            variant: meta.variant,
            firmware: meta.firmware,
            ten_bit: meta.bit_depth == 10,
            range_g: meta.range_g.unwrap_or(2),
            sample_rate_hz,
            compression: meta.compression,
            start: meta.start,
            stop: meta.stop,
            start_condition: meta.start_condition,
            stop_condition: meta.stop_condition,
            axes: meta.axes.unwrap_or(3),
            file_code: meta.file_code.clone(),
            device_id: meta.device_id,
        })
    }

    /// Собирает заголовок длиной `variant.header_len()` байт.
    pub fn build(&self) -> PalResult<Vec<u8>> {
        let mut buf = vec![0u8; self.variant.header_len()];

        if self.sample_rate_hz == 0 {
            return Err(PalError::validation("Sampling frequency must be non-zero"));
        }

        let hi = self.firmware / FIRMWARE_HI_WEIGHT;
        if hi > u8::MAX as u16 {
            return Err(PalError::validation(format!(
                "Firmware version {} cannot be stored in the header",
                self.firmware
            )));
        }
        buf[FIRMWARE_HI_OFFSET] = hi as u8;
        buf[FIRMWARE_LO_OFFSET] = (self.firmware % FIRMWARE_HI_WEIGHT) as u8;

        let range_code = reverse_lookup(&RANGE_TABLE, self.range_g).ok_or_else(|| {
            PalError::validation(format!(
                "Unsupported range ±{}g. Use: 2, 4, 8",
                self.range_g
            ))
        })?;
        buf[RANGE_OFFSET] = if self.ten_bit {
            range_code | TEN_BIT_FLAG
        } else {
            range_code
        };

        buf[AXES_OFFSET] = reverse_lookup(&AXES_TABLE, self.axes).ok_or_else(|| {
            PalError::validation(format!("Unsupported axis count {}. Use: 1, 3", self.axes))
        })?;

        buf[SAMPLE_RATE_OFFSET] = self.sample_rate_hz;
        buf[COMPRESSION_OFFSET] = self.compression.as_u8();
        buf[START_CONDITION_OFFSET] = self.start_condition.as_u8();
        buf[STOP_CONDITION_OFFSET] = self.stop_condition.as_u8();

        write_packed_datetime(&mut buf, START_DATETIME_OFFSET, &self.start)?;
        if let Some(stop) = &self.stop {
            write_packed_datetime(&mut buf, STOP_DATETIME_OFFSET, stop)?;
        }

        let code = encode_file_code(&self.file_code)?;
        buf[FILE_CODE_OFFSET..FILE_CODE_OFFSET + code.len()].copy_from_slice(&code);

        self.write_device_id(&mut buf)?;

        Ok(buf)
    }

    fn write_device_id(
        &self,
        buf: &mut [u8],
    ) -> PalResult<()> {
        let id = self.device_id;

        if id > MAX_DEVICE_ID {
            return Err(PalError::validation(format!(
                "Device id {id} has more than 6 digits"
            )));
        }

        let rest = id % 100_000;
        let low = rest % 10_000;
        let digits = low % 4_096;

        buf[DEVICE_ID_YEAR_OFFSET] = (id / 100_000) as u8;
        buf[DEVICE_ID_HIGH_OFFSET] = (rest / 10_000) as u8;
        buf[DEVICE_ID_EXTRA_OFFSET] = (low / 4_096) as u8;
        buf[DEVICE_ID_DIGITS_OFFSET] = (digits / 256) as u8;
        buf[DEVICE_ID_DIGITS_OFFSET + 1] = (digits % 256 / 16) as u8;
        buf[DEVICE_ID_DIGITS_OFFSET + 2] = (digits % 16) as u8;

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// BodyEncoder
////////////////////////////////////////////////////////////////////////////////

impl BodyEncoder {
    /// Упаковщик для режима `mode` и варианта файла `variant`.
    ///
    /// Режим `Duplicate` только читается: записать его так, чтобы старые
    /// прошивки прочли файл одинаково, нельзя.
    pub fn new(
        mode: CompressionMode,
        variant: FileVariant,
    ) -> PalResult<Self> {
        if mode == CompressionMode::Duplicate {
            return Err(PalError::configuration(
                "Duplicate compression is supported for reading only",
            ));
        }

        Ok(Self {
            mode,
            variant,
            out: Vec::new(),
            run: None,
            samples: 0,
        })
    }

    /// Добавляет выборку.
    ///
    /// Без сжатия экранировать нечем: выборка, на которой байты тела
    /// сложились в маркер конца данных, отклоняется с `Validation`, и тело
    /// остаётся прежним.
    pub fn push(
        &mut self,
        t: Triplet,
    ) -> PalResult<()> {
        if self.mode == CompressionMode::None {
            let start = self.out.len();
            self.out.extend_from_slice(&t.to_bytes());

            // Маркер длиной до 8 байт начинается не раньше третьей записи с конца
            let hit = (0..self.out.len())
                .step_by(RECORD_SIZE)
                .rev()
                .take(3)
                .find(|&p| is_tail(&self.out[p..], self.variant));

            if let Some(p) = hit {
                self.out.truncate(start);
                return Err(PalError::validation(format!(
                    "Sample #{} would read as the end-of-data marker at body offset {p}",
                    self.samples
                )));
            }

            self.samples += 1;
            return Ok(());
        }

        self.samples += 1;

        if let Some((prev, count)) = &mut self.run {
            if *prev == t && *count < RLE_MAX_RUN {
                *count += 1;
                return Ok(());
            }
        }

        self.flush_run();
        self.run = Some((t, 1));

        Ok(())
    }

    /// Выборок принято.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Завершает тело и возвращает его байты.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush_run();
        self.out
    }

    fn flush_run(&mut self) {
        let Some((t, count)) = self.run.take() else {
            return;
        };

        if count < MIN_ESCAPED_RUN && !self.needs_escape(t) {
            for _ in 0..count {
                self.out.extend_from_slice(&t.to_bytes());
            }
            return;
        }

        let start = self.out.len();
        self.out.resize(start + RLE_RECORD_SIZE, 0);

        let rec = &mut self.out[start..];
        rec[..RECORD_SIZE].copy_from_slice(&RLE_SENTINEL);
        let mut off = RECORD_SIZE;
        write_u16_local(rec, &mut off, count as u16);
        rec[off..off + RECORD_SIZE].copy_from_slice(&t.to_bytes());
    }

    /// Литерал прочитался бы как escape-запись или как начало маркера.
    fn needs_escape(
        &self,
        t: Triplet,
    ) -> bool {
        let bytes = t.to_bytes();
        if bytes == RLE_SENTINEL {
            return true;
        }

        match self.variant {
            FileVariant::Datx => bytes[..] == DATX_TAIL[..RECORD_SIZE],
            FileVariant::Dat => t.x == 0 && t.y == 0 && t.z > 0,
        }
    }
}

/// Кодирует сигнал в полный файл с заголовком из `meta`.
pub fn encode_signal(
    meta: &FileMetadata,
    signal: &Signal,
) -> PalResult<Vec<u8>> {
    let mut out = HeaderBuilder::from_metadata(meta)?.build()?;
    let mut encoder = BodyEncoder::new(meta.compression, meta.variant)?;

    for frame in signal.frames() {
        encoder.push(frame.triplet)?;
    }

    out.extend_from_slice(&encoder.finish());

    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        body::decode_body,
        header::parse_header,
        record::BodyLayout,
    };

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap()
    }

    fn encode(
        mode: CompressionMode,
        samples: &[Triplet],
    ) -> Vec<u8> {
        encode_as(FileVariant::Datx, mode, samples)
    }

    fn encode_as(
        variant: FileVariant,
        mode: CompressionMode,
        samples: &[Triplet],
    ) -> Vec<u8> {
        let mut enc = BodyEncoder::new(mode, variant).unwrap();
        for &t in samples {
            enc.push(t).unwrap();
        }
        enc.finish()
    }

    fn decoded(
        variant: FileVariant,
        body: &[u8],
    ) -> Vec<Triplet> {
        let layout = BodyLayout {
            variant,
            ..BodyLayout::run_length()
        };
        let columns = decode_body(body, &layout).unwrap();
        (0..columns.len()).filter_map(|i| columns.get(i)).collect()
    }

    #[test]
    fn test_header_round_trip() {
        let mut b = HeaderBuilder::new(FileVariant::Dat, 10, start());
        b.firmware = 600;
        b.ten_bit = true;
        b.range_g = 8;
        b.axes = 1;
        b.device_id = 999_999;
        b.file_code = "XYZ".to_string();
        b.stop = None;

        let buf = b.build().unwrap();
        assert_eq!(buf.len(), 1023);

        let meta = parse_header(&buf, FileVariant::Dat).unwrap();
        assert_eq!(meta.firmware, 600);
        assert_eq!(meta.bit_depth, 10);
        assert_eq!(meta.range_g, Some(8));
        assert_eq!(meta.axes, Some(1));
        assert_eq!(meta.device_id, 999_999);
        assert_eq!(meta.sample_rate_hz, 10);
        assert_eq!(meta.start, start());
        assert_eq!(meta.stop, None);

        assert_eq!(HeaderBuilder::from_metadata(&meta).unwrap(), b);
    }

    #[test]
    fn test_device_id_bytes() {
        let mut b = HeaderBuilder::new(FileVariant::Datx, 20, start());
        b.device_id = 412_345;
        let buf = b.build().unwrap();

        assert_eq!(buf[10], 4);
        assert_eq!(buf[14], 1);
        assert_eq!(buf[40], 0);
        assert_eq!(&buf[11..14], &[9, 2, 9]);
    }

    #[test]
    fn test_invalid_header_fields() {
        let mut b = HeaderBuilder::new(FileVariant::Datx, 20, start());
        b.range_g = 3;
        assert!(matches!(b.build(), Err(PalError::Validation(_))));

        let mut b = HeaderBuilder::new(FileVariant::Datx, 20, start());
        b.device_id = 1_000_000;
        assert!(b.build().is_err());

        let mut b = HeaderBuilder::new(FileVariant::Datx, 20, start());
        b.file_code = "way too long".to_string();
        assert!(b.build().is_err());

        assert!(HeaderBuilder::new(FileVariant::Datx, 0, start()).build().is_err());
    }

    #[test]
    fn test_worked_example_bytes() {
        let body = encode(
            CompressionMode::RunLength,
            &[
                Triplet::new(1, 2, 3),
                Triplet::new(4, 5, 6),
                Triplet::new(4, 5, 6),
                Triplet::new(4, 5, 6),
            ],
        );

        assert_eq!(body, vec![1, 2, 3, 0, 0, 0, 3, 0, 4, 5, 6]);
    }

    #[test]
    fn test_short_runs_stay_literal() {
        let t = Triplet::new(7, 7, 7);
        let body = encode(CompressionMode::RunLength, &[t, t]);

        assert_eq!(body, vec![7, 7, 7, 7, 7, 7]);
    }

    #[test]
    fn test_sentinel_sample_is_escaped() {
        let body = encode(CompressionMode::RunLength, &[Triplet::new(0, 0, 0)]);

        assert_eq!(body, vec![0, 0, 0, 1, 0, 0, 0, 0]);

        let columns = decode_body(&body, &BodyLayout::run_length()).unwrap();
        assert_eq!(columns.get(0), Some(Triplet::new(0, 0, 0)));
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn test_datx_tail_literal_is_escaped() {
        let samples = [
            Triplet::new(b't', b'a', b'i'),
            Triplet::new(b'l', 120, 130),
            Triplet::new(1, 2, 3),
        ];
        let body = encode_as(FileVariant::Datx, CompressionMode::RunLength, &samples);

        assert_eq!(&body[..RLE_RECORD_SIZE], &[0, 0, 0, 1, 0, b't', b'a', b'i']);
        assert_eq!(decoded(FileVariant::Datx, &body), samples);
    }

    #[test]
    fn test_dat_marker_literals_are_escaped() {
        let samples = [
            Triplet::new(0, 0, 5),
            Triplet::new(0, 0, 3),
            Triplet::new(4, 0, 9),
            Triplet::new(9, 9, 9),
        ];
        let body = encode_as(FileVariant::Dat, CompressionMode::RunLength, &samples);

        assert_eq!(&body[..RLE_RECORD_SIZE], &[0, 0, 0, 1, 0, 0, 0, 5]);
        assert_eq!(decoded(FileVariant::Dat, &body), samples);

        // В .datx те же выборки маркер не образуют
        let body = encode_as(FileVariant::Datx, CompressionMode::RunLength, &samples);
        assert_eq!(body.len(), 4 * RECORD_SIZE);
    }

    #[test]
    fn test_uncompressed_marker_is_rejected() {
        let mut enc = BodyEncoder::new(CompressionMode::None, FileVariant::Datx).unwrap();
        enc.push(Triplet::new(b't', b'a', b'i')).unwrap();

        let err = enc.push(Triplet::new(b'l', 0, 0)).unwrap_err();
        assert!(matches!(err, PalError::Validation(_)));
        assert_eq!(enc.samples(), 1, "отклонённая выборка не считается");

        enc.push(Triplet::new(b'k', 0, 0)).unwrap();
        assert_eq!(enc.finish(), b"taik\0\0".to_vec());

        let mut enc = BodyEncoder::new(CompressionMode::None, FileVariant::Dat).unwrap();
        enc.push(Triplet::new(0, 0, 5)).unwrap();
        enc.push(Triplet::new(0, 0, 3)).unwrap();
        assert!(enc.push(Triplet::new(4, 0, 9)).is_err());
        enc.push(Triplet::new(4, 4, 9)).unwrap();
        assert_eq!(enc.finish(), vec![0, 0, 5, 0, 0, 3, 4, 4, 9]);
    }

    #[test]
    fn test_long_run_is_split() {
        let t = Triplet::new(1, 1, 1);
        let samples = vec![t; 70_000];
        let body = encode(CompressionMode::RunLength, &samples);

        assert_eq!(body.len(), 2 * RLE_RECORD_SIZE);
        assert_eq!(&body[3..5], &[0xFF, 0xFF]);

        let columns = decode_body(&body, &BodyLayout::run_length()).unwrap();
        assert_eq!(columns.len(), 70_000);
    }

    #[test]
    fn test_no_compression_mode() {
        let samples = [Triplet::new(0, 0, 0), Triplet::new(0, 0, 0), Triplet::new(0, 0, 0)];
        let body = encode(CompressionMode::None, &samples);

        assert_eq!(body, vec![0; 9]);
    }

    #[test]
    fn test_duplicate_mode_rejected() {
        assert!(matches!(
            BodyEncoder::new(CompressionMode::Duplicate, FileVariant::Datx),
            Err(PalError::Configuration(_))
        ));
    }

    #[test]
    fn test_samples_counter() {
        let mut enc = BodyEncoder::new(CompressionMode::RunLength, FileVariant::Datx).unwrap();
        for i in 0..10u8 {
            enc.push(Triplet::new(i / 4, 0, 1)).unwrap();
        }

        assert_eq!(enc.samples(), 10);
    }
}
