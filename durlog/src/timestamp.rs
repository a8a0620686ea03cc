use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;
use jiff::Timestamp;

/// Length of a rendered record stamp: `yyyy-MM-dd HH:mm:ss.fff`.
pub const STAMP_LEN: usize = 23;

/// Length of a rendered calendar date: `yyyy-MM-dd`.
pub const DATE_LEN: usize = 10;

// Precomputed lookup table for formatting two decimal digits (00-99) quickly.
const DEC_DIGITS_LUT: &[u8] = concat!(
    "0001020304050607080910111213141516171819",
    "2021222324252627282930313233343536373839",
    "4041424344454647484950515253545556575859",
    "6061626364656667686970717273747576777879",
    "8081828384858687888990919293949596979899",
)
.as_bytes();

#[inline]
fn push_2digit(output: &mut Vec<u8>, value: u32) {
    let index = (value % 100) as usize * 2;
    output.extend_from_slice(&DEC_DIGITS_LUT[index..index + 2]);
}

/// Appends `date` as `yyyy-MM-dd` to the output.
///
/// Years outside `0000..=9999` are clamped so the output is always exactly
/// [`DATE_LEN`] bytes of ASCII.
pub fn write_date(date: Date, output: &mut Vec<u8>) {
    let year = date.year().clamp(0, 9999) as u32;
    output.reserve(DATE_LEN);
    push_2digit(output, year / 100);
    push_2digit(output, year % 100);
    output.push(b'-');
    push_2digit(output, date.month() as u32);
    output.push(b'-');
    push_2digit(output, date.day() as u32);
}

/// Appends `datetime` as `yyyy-MM-dd HH:mm:ss.fff` (24 hour clock,
/// millisecond precision, no locale dependence) to the output.
pub fn write_stamp(datetime: DateTime, output: &mut Vec<u8>) {
    output.reserve(STAMP_LEN);
    write_date(datetime.date(), output);
    output.push(b' ');
    push_2digit(output, datetime.hour() as u32);
    output.push(b':');
    push_2digit(output, datetime.minute() as u32);
    output.push(b':');
    push_2digit(output, datetime.second() as u32);
    output.push(b'.');
    let ms = datetime.millisecond() as u32;
    output.push(b'0' + (ms / 100) as u8);
    push_2digit(output, ms % 100);
}

/// Renders `date` as an owned `yyyy-MM-dd` string.
pub fn date_string(date: Date) -> String {
    let mut buffer = Vec::with_capacity(DATE_LEN);
    write_date(date, &mut buffer);
    // Only ASCII digits and dashes were written.
    String::from_utf8(buffer).unwrap_or_default()
}

/// The current calendar date in the given time zone.
pub fn today(time_zone: &TimeZone) -> Date {
    time_zone.to_datetime(Timestamp::now()).date()
}

#[cfg(test)]
mod test {
    use super::*;
    use jiff::civil::date;

    fn stamp(datetime: DateTime) -> String {
        let mut out = Vec::new();
        write_stamp(datetime, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn stamp_fmt() {
        assert_eq!(
            stamp(date(2024, 3, 7).at(9, 5, 1, 7_000_000)),
            "2024-03-07 09:05:01.007"
        );
        assert_eq!(
            stamp(date(1999, 12, 31).at(23, 59, 59, 999_999_999)),
            "1999-12-31 23:59:59.999"
        );
        assert_eq!(
            stamp(date(2000, 1, 1).at(0, 0, 0, 0)),
            "2000-01-01 00:00:00.000"
        );
        assert_eq!(stamp(date(2025, 6, 15).at(13, 0, 0, 120_000_000)).len(), STAMP_LEN);
    }

    #[test]
    fn date_fmt() {
        assert_eq!(date_string(date(2026, 10, 16)), "2026-10-16");
        assert_eq!(date_string(date(7, 2, 3)), "0007-02-03");
        assert_eq!(date_string(date(-44, 3, 15)), "0000-03-15");
    }

    #[test]
    fn today_follows_time_zone() {
        let utc = today(&TimeZone::UTC);
        let ahead = today(&TimeZone::fixed(jiff::tz::offset(14)));
        let behind = today(&TimeZone::fixed(jiff::tz::offset(-12)));
        assert!(behind <= utc && utc <= ahead);
    }
}
