use super::*;

fn candidate(time: Option<&str>, price: Option<&str>) -> BookingSlotCandidate {
    BookingSlotCandidate {
        raw_time: time.map(str::to_string),
        raw_price: price.map(str::to_string),
        raw_duration: None,
        raw_provider: None,
        raw_resource_name: Some("Корт 1".to_string()),
        raw_date: None,
        nominal_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        source_selector: "[data-slot]".to_string(),
        page_url: "https://booking.example.com/company/1/select-time".to_string(),
    }
}

// ---------------------------------------------------------------------------
// classify_time
// ---------------------------------------------------------------------------

#[test]
fn every_valid_clock_value_round_trips_to_hh_mm() {
    for hour in 0..24 {
        for minute in [0, 1, 15, 30, 59] {
            let padded = format!("{hour:02}:{minute:02}");
            let short = format!("{hour}:{minute:02}");
            for token in [&padded, &short] {
                let time = classify_time(token)
                    .unwrap_or_else(|| panic!("{token} should classify as a time"));
                assert_eq!(time.format("%H:%M").to_string(), padded);
            }
        }
    }
}

#[test]
fn time_with_seconds_is_accepted() {
    let time = classify_time("07:30:15").unwrap();
    assert_eq!(time, NaiveTime::from_hms_opt(7, 30, 15).unwrap());
}

#[test]
fn time_rejects_out_of_range_and_malformed() {
    for token in ["24:00", "12:60", "7:5", "123:00", "12:00:61", "1500", "22", "", "ab:cd"] {
        assert!(classify_time(token).is_none(), "{token:?} should not be a time");
    }
}

#[test]
fn time_tolerates_surrounding_whitespace() {
    assert!(classify_time("  09:00 ").is_some());
}

// ---------------------------------------------------------------------------
// classify_price
// ---------------------------------------------------------------------------

#[test]
fn bare_hour_like_integers_are_never_prices() {
    for n in 0..=23 {
        assert!(
            classify_price(&n.to_string()).is_none(),
            "bare {n} must not classify as a price"
        );
    }
}

#[test]
fn bare_magnitude_above_hour_range_is_a_price() {
    let price = classify_price("1500").unwrap();
    assert_eq!(price.amount, Decimal::from(1500));
    assert_eq!(price.currency, "RUB");
    assert!(classify_price("24").is_some());
}

#[test]
fn thousands_separators_are_stripped() {
    assert_eq!(
        classify_price("12 500 руб").unwrap().amount,
        Decimal::from(12_500)
    );
    assert_eq!(
        classify_price("12\u{a0}500\u{a0}₽").unwrap().amount,
        Decimal::from(12_500)
    );
    assert_eq!(classify_price("$1,500").unwrap().amount, Decimal::from(1500));
    assert_eq!(
        classify_price("1.234,56 €").unwrap().amount,
        Decimal::new(123_456, 2)
    );
}

#[test]
fn decimal_comma_is_read_as_decimal_point() {
    let price = classify_price("1 500,50 ₽").unwrap();
    assert_eq!(price.amount, Decimal::new(150_050, 2));
}

#[test]
fn currency_markers_map_to_codes() {
    let cases = [
        ("1500 ₽", "RUB"),
        ("1500р.", "RUB"),
        ("1500 рублей", "RUB"),
        ("$25", "USD"),
        ("€ 40", "EUR"),
        ("3000 ₸", "KZT"),
        ("250 грн", "UAH"),
        ("£30", "GBP"),
    ];
    for (token, code) in cases {
        let price = classify_price(token).unwrap_or_else(|| panic!("{token} should parse"));
        assert_eq!(price.currency, code, "token {token}");
    }
}

#[test]
fn from_prefix_and_per_hour_suffix_are_tolerated() {
    assert_eq!(
        classify_price("от 2 000 ₽").unwrap().amount,
        Decimal::from(2000)
    );
    assert_eq!(
        classify_price("1800 ₽ / час").unwrap().amount,
        Decimal::from(1800)
    );
}

#[test]
fn currency_marker_is_decisive_even_for_small_amounts() {
    let price = classify_price("22 ₽").unwrap();
    assert_eq!(price.amount, Decimal::from(22));
    assert!(price.is_hour_like());
}

#[test]
fn price_rejects_times_names_and_unknown_units() {
    for token in ["22:00", "Анна Иванова", "—", "", "22 шт", "#22", "2 гостя", "abc"] {
        assert!(classify_price(token).is_none(), "{token:?} should not be a price");
    }
}

#[test]
fn unmarked_small_decimal_is_rejected() {
    assert!(classify_price("12.30").is_none());
}

#[test]
fn amounts_are_rounded_to_cents() {
    let price = classify_price("1500.5051 ₽").unwrap();
    assert_eq!(price.amount, Decimal::new(150_051, 2));

    // Stored as 1.00, which reads as a clock hour.
    let price = classify_price("$0.9999").unwrap();
    assert_eq!(price.amount, Decimal::ONE);
    assert!(price.is_hour_like());
    assert!(!is_plausible_record(&candidate(Some("10:00"), Some("$0.9999"))));
}

#[test]
fn amounts_beyond_storage_range_are_rejected() {
    assert!(classify_price("9999999999 ₽").is_some());
    assert!(classify_price("99999999999 ₽").is_none());
}

#[test]
fn price_field_distinguishes_known_unknown_and_invalid() {
    assert!(matches!(
        classify_price_field(Some("1500 ₽")),
        Some(PriceField::Known(_))
    ));
    assert_eq!(
        classify_price_field(Some("Цена по запросу")),
        Some(PriceField::Unknown)
    );
    assert_eq!(classify_price_field(Some("22")), None);
    assert_eq!(classify_price_field(None), None);
}

// ---------------------------------------------------------------------------
// classify_duration
// ---------------------------------------------------------------------------

#[test]
fn empty_and_invalid_durations_default_to_sixty() {
    assert_eq!(classify_duration(""), 60);
    assert_eq!(classify_duration("invalid"), 60);
    assert_eq!(classify_duration("   "), 60);
}

#[test]
fn compound_and_single_unit_durations() {
    assert_eq!(classify_duration("1 ч 30 мин"), 90);
    assert_eq!(classify_duration("45 мин"), 45);
    assert_eq!(classify_duration("2 часа"), 120);
    assert_eq!(classify_duration("1h 30m"), 90);
    assert_eq!(classify_duration("1.5 ч"), 90);
    assert_eq!(classify_duration("90 min"), 90);
}

#[test]
fn duration_is_clamped_and_never_zero() {
    assert_eq!(classify_duration("12 ч"), MAX_DURATION_MINUTES);
    assert_eq!(classify_duration("0 мин"), 60);
}

#[test]
fn bare_number_duration_uses_default() {
    assert_eq!(classify_duration("90"), 60);
}

#[test]
fn oversized_hours_fall_back_to_default() {
    assert_eq!(classify_duration("79228162514264337593543950335 ч"), 60);
    assert_eq!(classify_duration("99999999999999999999999999999999 ч"), 60);
}

// ---------------------------------------------------------------------------
// classify_provider
// ---------------------------------------------------------------------------

#[test]
fn provider_accepts_multi_word_names() {
    assert_eq!(
        classify_provider(Some("  Анна   Иванова ")),
        ProviderName::Named("Анна Иванова".to_string())
    );
}

#[test]
fn provider_rejects_placeholders_numbers_and_short_tokens() {
    for token in ["—", "-", "12345", "Ан", "", "22:00", "1500 ₽"] {
        assert_eq!(
            classify_provider(Some(token)),
            ProviderName::Unspecified,
            "{token:?} should be unspecified"
        );
    }
    assert_eq!(classify_provider(None), ProviderName::Unspecified);
}

// ---------------------------------------------------------------------------
// classify_date
// ---------------------------------------------------------------------------

#[test]
fn date_prefers_parseable_raw_value() {
    let nominal = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert_eq!(
        classify_date(Some("2026-10-21"), nominal),
        NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()
    );
    assert_eq!(
        classify_date(Some("2026-10-21T00:00:00"), nominal),
        NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()
    );
    assert_eq!(
        classify_date(Some("22.10.2026"), nominal),
        NaiveDate::from_ymd_opt(2026, 10, 22).unwrap()
    );
    assert_eq!(
        classify_date(Some("23.10"), nominal),
        NaiveDate::from_ymd_opt(2026, 10, 23).unwrap()
    );
}

#[test]
fn short_date_rolls_into_next_year() {
    let nominal = NaiveDate::from_ymd_opt(2026, 12, 30).unwrap();
    assert_eq!(
        classify_date(Some("02.01"), nominal),
        NaiveDate::from_ymd_opt(2027, 1, 2).unwrap()
    );
}

#[test]
fn unparseable_date_falls_back_to_nominal() {
    let nominal = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert_eq!(classify_date(Some("Пн"), nominal), nominal);
    assert_eq!(classify_date(Some("31.02"), nominal), nominal);
    assert_eq!(classify_date(None, nominal), nominal);
}

// ---------------------------------------------------------------------------
// is_plausible_record / classify_candidate
// ---------------------------------------------------------------------------

#[test]
fn plausible_requires_time_and_price_or_unknown_marker() {
    assert!(is_plausible_record(&candidate(Some("22:00"), Some("1500 ₽"))));
    assert!(is_plausible_record(&candidate(Some("22:00"), Some("по запросу"))));
    assert!(!is_plausible_record(&candidate(Some("22:00"), None)));
    assert!(!is_plausible_record(&candidate(Some("22:00"), Some("—"))));
    assert!(!is_plausible_record(&candidate(None, Some("1500 ₽"))));
    assert!(!is_plausible_record(&candidate(Some("1500"), Some("22:00"))));
}

#[test]
fn hour_like_price_with_marker_is_not_plausible() {
    assert!(!is_plausible_record(&candidate(Some("07:30"), Some("22 ₽"))));
}

#[test]
fn swapped_time_and_price_columns_are_rejected() {
    // A mis-ordered row where the price cell holds "22" and the time cell the amount.
    assert!(!is_plausible_record(&candidate(Some("1500 ₽"), Some("22"))));
}

#[test]
fn classify_candidate_fills_every_field() {
    let mut c = candidate(Some("22:00"), Some("1500 ₽"));
    c.raw_duration = Some("1 ч 30 мин".to_string());
    c.raw_provider = Some("Анна Иванова".to_string());
    c.raw_date = Some("2026-10-20".to_string());

    let slot = classify_candidate(&c).unwrap();
    assert_eq!(slot.time, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
    assert_eq!(slot.date, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    assert_eq!(slot.duration_minutes, 90);
    assert_eq!(
        slot.provider_name,
        ProviderName::Named("Анна Иванова".to_string())
    );
    assert_eq!(slot.resource_name.as_deref(), Some("Корт 1"));
    assert!(matches!(slot.price, PriceField::Known(ref p) if p.amount == Decimal::from(1500)));
}

#[test]
fn classify_candidate_rejects_implausible() {
    assert!(classify_candidate(&candidate(Some("07:30"), Some("22 ₽"))).is_none());
}
