use chrono::{
    Datelike,
    NaiveDate
};

#[inline]
pub const fn is_leap (year: i32) -> bool {
    ((year % 4 == 0) && (year % 100!= 0)) || (year % 400 == 0)
}


pub const fn days_of_month (year: i32, month: u32) -> u32 {
    const NO_LEAP_EOM: [u32; 13] = [
        0, 31, 28, 31, 30,
        31, 30, 31, 31, 30,
        31, 30, 31
    ];

    const LEAP_EOM: [u32; 13] = [
        0, 31, 29, 31, 30,
        31, 30, 31, 31, 30,
        31, 30, 31
    ];

    if is_leap(year) {
        LEAP_EOM[month as usize]
    } else {
        NO_LEAP_EOM[month as usize]
    }
}

/// 以 ACT/365 計算 `d1` 到 `d2` 的年數，曲線上所有時間軸都用這個。
#[inline]
pub fn act365_time(d1: NaiveDate, d2: NaiveDate) -> f64 {
    (d2 - d1).num_days() as f64 / 365.0
}

/// Months elapsed between two dates, ignoring the day of month.
#[inline]
pub fn months_between(d1: NaiveDate, d2: NaiveDate) -> i32 {
    12 * (d2.year() - d1.year()) + d2.month() as i32 - d1.month() as i32
}
