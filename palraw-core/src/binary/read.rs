use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveDateTime};

use crate::format::YEAR_BASE;

pub fn read_u16_local(
    buf: &[u8],
    off: &mut usize,
) -> u16 {
    let v = LittleEndian::read_u16(&buf[*off..*off + 2]);
    *off += 2;
    v
}

/// Читает дату-время, упакованное в 6 байт: час, минута, секунда, день,
/// месяц, год - 2000. Возвращает `None` для несуществующей даты.
pub fn read_packed_datetime(
    buf: &[u8],
    off: usize,
) -> Option<NaiveDateTime> {
    let b = buf.get(off..off + 6)?;

    NaiveDate::from_ymd_opt(YEAR_BASE + b[5] as i32, b[4] as u32, b[3] as u32)?.and_hms_opt(
        b[0] as u32,
        b[1] as u32,
        b[2] as u32,
    )
}
