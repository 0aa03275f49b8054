use byteorder::{ByteOrder, LittleEndian};
use chrono::{Datelike, NaiveDateTime, Timelike};
use palraw_types::{PalError, PalResult};

use crate::format::YEAR_BASE;

pub fn write_u16_local(
    buf: &mut [u8],
    off: &mut usize,
    val: u16,
) {
    LittleEndian::write_u16(&mut buf[*off..*off + 2], val);
    *off += 2;
}

/// Упаковывает дату-время в 6 байт (см. [`super::read_packed_datetime`]).
pub fn write_packed_datetime(
    buf: &mut [u8],
    off: usize,
    dt: &NaiveDateTime,
) -> PalResult<()> {
    let year = dt.year() - YEAR_BASE;

    if !(0..=u8::MAX as i32).contains(&year) {
        return Err(PalError::validation(format!(
            "Year {} cannot be stored in the header (2000..=2255)",
            dt.year()
        )));
    }

    buf[off..off + 6].copy_from_slice(&[
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.day() as u8,
        dt.month() as u8,
        year as u8,
    ]);

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::binary::{read_packed_datetime, read_u16_local};

    #[test]
    fn test_write_u16_matches_reader() {
        let mut buf = [0u8; 4];
        let mut off = 1;
        write_u16_local(&mut buf, &mut off, 0xBEEF);

        assert_eq!(off, 3);
        assert_eq!(buf, [0x00, 0xEF, 0xBE, 0x00]);

        let mut off = 1;
        assert_eq!(read_u16_local(&buf, &mut off), 0xBEEF);
    }

    #[test]
    fn test_packed_datetime_layout() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let mut buf = [0u8; 8];
        write_packed_datetime(&mut buf, 2, &dt).unwrap();

        assert_eq!(&buf[2..8], &[23, 59, 58, 31, 1, 24]);
        assert_eq!(read_packed_datetime(&buf, 2), Some(dt));
    }

    #[test]
    fn test_packed_datetime_year_out_of_range() {
        let dt = NaiveDate::from_ymd_opt(1999, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut buf = [0u8; 6];

        assert!(matches!(
            write_packed_datetime(&mut buf, 0, &dt),
            Err(PalError::Validation(_))
        ));
    }
}
