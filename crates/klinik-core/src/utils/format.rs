use chrono::{Datelike, NaiveDate, Weekday};

const MONTHS_ID: [&str; 12] = [
    "Januari", "Februari", "Maret", "April", "Mei", "Juni",
    "Juli", "Agustus", "September", "Oktober", "November", "Desember",
];

fn weekday_id(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Senin",
        Weekday::Tue => "Selasa",
        Weekday::Wed => "Rabu",
        Weekday::Thu => "Kamis",
        Weekday::Fri => "Jumat",
        Weekday::Sat => "Sabtu",
        Weekday::Sun => "Minggu",
    }
}

/// Indonesian month name for 1-based `month`, e.g. "Oktober"
pub fn month_name(month: u32) -> &'static str {
    MONTHS_ID
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

/// Long Indonesian date, e.g. "Senin, 19 Oktober 2026"
pub fn format_date_long(date: NaiveDate) -> String {
    format!(
        "{}, {} {} {}",
        weekday_id(date.weekday()),
        date.day(),
        month_name(date.month()),
        date.year()
    )
}

/// Two-letter weekday headers, Monday first
pub fn weekday_headers() -> [&'static str; 7] {
    ["Sn", "Sl", "Rb", "Km", "Jm", "Sb", "Mg"]
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Human readable byte size
pub fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}
