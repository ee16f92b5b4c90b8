//! Field classifier.
//!
//! Every function here is pure and total: bad input maps to `None` or a
//! documented default, never to a panic or an error. Callers branch on the
//! result explicitly.
//!
//! The central rule is that a bare whole number in `[0, 23]` is never read as
//! a price, because the same token is a valid clock hour. An explicit
//! currency marker makes a token a price whatever its magnitude, but a record
//! whose price is hour-like is still rejected by [`is_plausible_record`] and by
//! `BookingSlotRecord::new`.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use slotscout_core::{
    BookingSlotCandidate, Price, PriceField, ProviderName, MAX_DURATION_MINUTES, PRICE_SCALE,
};

/// Duration used when the page gives none or it cannot be parsed.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Provider tokens shorter than this (in characters) are treated as noise.
pub const MIN_PROVIDER_CHARS: usize = 3;

/// Currency assumed for unmarked prices. The booking application family
/// renders prices in roubles unless a symbol says otherwise.
const IMPLIED_CURRENCY: &str = "RUB";

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("valid time regex")
});

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:от|from)\s*)?([^\d]*?)\s*(\d[\d\s.,]*?)\s*([^\d]*)$")
        .expect("valid price regex")
});

static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:часов|часа|час|ч|hours|hour|hrs|hr|h)")
        .expect("valid hours regex")
});

static MINUTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:минуты|минут|мин|м|minutes|minute|mins|min|m)")
        .expect("valid minutes regex")
});

/// Exact (lower-cased) unit words and symbols accepted as a currency marker.
const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("₽", "RUB"),
    ("руб", "RUB"),
    ("руб.", "RUB"),
    ("рубль", "RUB"),
    ("рубля", "RUB"),
    ("рублей", "RUB"),
    ("р", "RUB"),
    ("р.", "RUB"),
    ("rub", "RUB"),
    ("₸", "KZT"),
    ("тг", "KZT"),
    ("тенге", "KZT"),
    ("kzt", "KZT"),
    ("₴", "UAH"),
    ("грн", "UAH"),
    ("uah", "UAH"),
    ("byn", "BYN"),
    ("$", "USD"),
    ("usd", "USD"),
    ("€", "EUR"),
    ("eur", "EUR"),
    ("£", "GBP"),
    ("gbp", "GBP"),
];

/// Tokens a venue shows in the price column when it will not quote a price.
const UNKNOWN_PRICE_MARKERS: &[&str] = &[
    "по запросу",
    "цена по запросу",
    "цена не указана",
    "уточняйте",
    "уточняйте цену",
    "price on request",
    "unknown",
    "n/a",
    "?",
];

/// Replaces the various non-breaking and thin spaces booking widgets use with
/// plain spaces, collapses runs, trims, and lower-cases.
fn normalize_token(token: &str) -> String {
    token
        .replace(['\u{a0}', '\u{202f}', '\u{2009}', '\u{2007}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parses `H:MM`, `HH:MM` or `HH:MM:SS` with hour in `[0, 23]`.
#[must_use]
pub fn classify_time(token: &str) -> Option<NaiveTime> {
    let caps = TIME_RE.captures(token.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = match caps.get(3) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Looks up a currency marker. Only the first word of the suffix is
/// considered so that `"1500 ₽ / час"` still resolves.
fn currency_code(marker: &str) -> Option<&'static str> {
    let first = marker
        .split(|c: char| c.is_whitespace() || c == '/')
        .find(|s| !s.is_empty())?;
    CURRENCY_MARKERS
        .iter()
        .find(|(m, _)| *m == first)
        .map(|(_, code)| *code)
}

/// Strips thousands separators and normalises the decimal separator.
///
/// A `,` or `.` followed by exactly three digits and then either the end or
/// another separator is a thousands separator; any other separator is the
/// decimal point. More than one decimal point is rejected.
fn parse_amount(digits: &str) -> Option<Decimal> {
    let compact: Vec<char> = digits.chars().filter(|c| !c.is_whitespace()).collect();
    let mut out = String::with_capacity(compact.len());
    let mut seen_decimal = false;

    for (i, &c) in compact.iter().enumerate() {
        if c.is_ascii_digit() {
            out.push(c);
            continue;
        }
        if c != ',' && c != '.' {
            return None;
        }
        let run = compact[i + 1..]
            .iter()
            .take_while(|d| d.is_ascii_digit())
            .count();
        let after = compact.get(i + 1 + run);
        let is_thousands = run == 3 && matches!(after, None | Some(',' | '.'));
        if is_thousands {
            continue;
        }
        if seen_decimal || run == 0 {
            return None;
        }
        seen_decimal = true;
        out.push('.');
    }

    Decimal::from_str(&out).ok()
}

/// Classifies a price token.
///
/// Accepts an optional `от`/`from` prefix, a currency symbol or unit word
/// before or after the number, and space/comma/dot thousands separators.
/// Without a currency marker the amount must be above 23; unrecognised
/// words around the number (`"22 шт"`, `"#22"`) reject the token outright.
#[must_use]
pub fn classify_price(token: &str) -> Option<Price> {
    let normalized = normalize_token(token);
    if normalized.is_empty() || normalized.contains(':') {
        return None;
    }

    let caps = PRICE_RE.captures(&normalized)?;
    let prefix = caps.get(1).map_or("", |m| m.as_str().trim());
    let digits = caps.get(2).map_or("", |m| m.as_str());
    let suffix = caps.get(3).map_or("", |m| m.as_str().trim());
    let digits = digits.trim_end_matches(['.', ',', ' ']);

    let marker = match (prefix.is_empty(), suffix.is_empty()) {
        (true, true) => None,
        (false, true) => Some(currency_code(prefix)?),
        (true, false) => Some(currency_code(suffix)?),
        (false, false) => {
            let from_prefix = currency_code(prefix)?;
            currency_code(suffix).filter(|code| *code == from_prefix)?;
            Some(from_prefix)
        }
    };

    // Rounded the way storage rounds, so the hour check below sees the
    // stored value.
    let amount = parse_amount(digits)?
        .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if amount.is_sign_negative() || amount > Price::max_amount() {
        return None;
    }

    match marker {
        Some(code) => Some(Price {
            amount,
            currency: code.to_string(),
        }),
        None if amount > Decimal::from(23) => Some(Price {
            amount,
            currency: IMPLIED_CURRENCY.to_string(),
        }),
        None => None,
    }
}

/// Returns `true` when the token is the page's explicit "no price" marker.
#[must_use]
pub fn is_unknown_price_marker(token: &str) -> bool {
    let normalized = normalize_token(token);
    UNKNOWN_PRICE_MARKERS.contains(&normalized.as_str())
}

/// Classifies the price column: a known price, the explicit unknown marker,
/// or `None` when it is neither.
#[must_use]
pub fn classify_price_field(token: Option<&str>) -> Option<PriceField> {
    let token = token?;
    if let Some(price) = classify_price(token) {
        return Some(PriceField::Known(price));
    }
    is_unknown_price_marker(token).then_some(PriceField::Unknown)
}

/// Parses `"1 ч 30 мин"`, `"1h 30m"`, `"1.5 ч"`, `"45 мин"` and similar.
///
/// Empty or unparseable input yields [`DEFAULT_DURATION_MINUTES`]; results
/// are clamped to `MAX_DURATION_MINUTES`.
#[must_use]
pub fn classify_duration(token: &str) -> u32 {
    let normalized = normalize_token(token);
    if normalized.is_empty() {
        return DEFAULT_DURATION_MINUTES;
    }

    let hours = HOURS_RE
        .captures(&normalized)
        .and_then(|c| Decimal::from_str(&c[1].replace(',', ".")).ok());
    let minutes = MINUTES_RE
        .captures(&normalized)
        .and_then(|c| c[1].parse::<u32>().ok());

    if hours.is_none() && minutes.is_none() {
        return DEFAULT_DURATION_MINUTES;
    }

    let from_hours = hours
        .and_then(|h| h.checked_mul(Decimal::from(60)))
        .map(|m| m.round())
        .and_then(|m| m.to_u32())
        .unwrap_or(0);
    let total = from_hours.saturating_add(minutes.unwrap_or(0));

    match total {
        0 => DEFAULT_DURATION_MINUTES,
        t => t.min(MAX_DURATION_MINUTES),
    }
}

/// Accepts name-like tokens; rejects blanks, placeholders, numbers and
/// anything shorter than [`MIN_PROVIDER_CHARS`].
#[must_use]
pub fn classify_provider(token: Option<&str>) -> ProviderName {
    let Some(token) = token else {
        return ProviderName::Unspecified;
    };
    let collapsed = token.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() < MIN_PROVIDER_CHARS {
        return ProviderName::Unspecified;
    }
    if !collapsed.chars().any(char::is_alphabetic) {
        return ProviderName::Unspecified;
    }
    if classify_time(&collapsed).is_some() || classify_price(&collapsed).is_some() {
        return ProviderName::Unspecified;
    }
    ProviderName::Named(collapsed)
}

/// Resolves the slot date: a parseable `raw` (ISO `YYYY-MM-DD`, optionally
/// followed by a time, `DD.MM.YYYY`, or `DD.MM`) wins over `nominal`.
///
/// A `DD.MM` label takes the nominal year, rolling forward one year when the
/// result would land more than half a year in the past (a December grid
/// showing January dates).
#[must_use]
pub fn classify_date(raw: Option<&str>, nominal: NaiveDate) -> NaiveDate {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return nominal;
    };

    let iso = raw.get(..10).unwrap_or(raw);
    if let Ok(date) = NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        return date;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d.%m.%Y") {
        return date;
    }

    let mut parts = raw.split('.');
    let (Some(day), Some(month)) = (parts.next(), parts.next()) else {
        return nominal;
    };
    let (Ok(day), Ok(month)) = (day.trim().parse::<u32>(), month.trim().parse::<u32>()) else {
        return nominal;
    };
    let Some(date) = NaiveDate::from_ymd_opt(nominal.year(), month, day) else {
        return nominal;
    };
    if date < nominal - Duration::days(183) {
        date.with_year(nominal.year() + 1).unwrap_or(nominal)
    } else {
        date
    }
}

/// Whitespace-collapsed resource label, or `None` when blank.
#[must_use]
pub fn classify_resource_name(token: Option<&str>) -> Option<String> {
    let collapsed = token?.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// A candidate is plausible only with a classified time and either a
/// non-hour-like price or the explicit unknown-price marker.
#[must_use]
pub fn is_plausible_record(candidate: &BookingSlotCandidate) -> bool {
    let has_time = candidate
        .raw_time
        .as_deref()
        .and_then(classify_time)
        .is_some();
    if !has_time {
        return false;
    }
    match classify_price_field(candidate.raw_price.as_deref()) {
        Some(PriceField::Known(price)) => !price.is_hour_like(),
        Some(PriceField::Unknown) => true,
        None => false,
    }
}

/// Fully classified fields of a plausible candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub price: PriceField,
    pub duration_minutes: u32,
    pub provider_name: ProviderName,
    pub resource_name: Option<String>,
}

/// Applies every classifier to `candidate`, or returns `None` when it is not
/// plausible.
#[must_use]
pub fn classify_candidate(candidate: &BookingSlotCandidate) -> Option<ClassifiedSlot> {
    if !is_plausible_record(candidate) {
        return None;
    }
    let time = classify_time(candidate.raw_time.as_deref()?)?;
    let price = classify_price_field(candidate.raw_price.as_deref())?;
    Some(ClassifiedSlot {
        date: classify_date(candidate.raw_date.as_deref(), candidate.nominal_date),
        time,
        price,
        duration_minutes: classify_duration(candidate.raw_duration.as_deref().unwrap_or("")),
        provider_name: classify_provider(candidate.raw_provider.as_deref()),
        resource_name: classify_resource_name(candidate.raw_resource_name.as_deref()),
    })
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
