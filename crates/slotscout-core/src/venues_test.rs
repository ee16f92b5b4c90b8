use super::*;

#[test]
fn flow_kind_parses_kebab_and_snake_case() {
    assert_eq!(
        "direct-booking".parse::<FlowKind>().unwrap(),
        FlowKind::DirectBooking
    );
    assert_eq!(
        "service_menu".parse::<FlowKind>().unwrap(),
        FlowKind::ServiceMenu
    );
    assert_eq!(
        " Multi-Branch ".parse::<FlowKind>().unwrap(),
        FlowKind::MultiBranch
    );
    assert!("widget".parse::<FlowKind>().is_err());
}

#[test]
fn flow_kind_display_round_trips() {
    for kind in [
        FlowKind::DirectBooking,
        FlowKind::ServiceMenu,
        FlowKind::MultiBranch,
    ] {
        assert_eq!(kind.to_string().parse::<FlowKind>().unwrap(), kind);
    }
}

#[test]
fn infer_direct_booking_from_select_time_path() {
    assert_eq!(
        FlowKind::infer_from_url("https://n1.booking.example.com/company/42/select-time"),
        Some(FlowKind::DirectBooking)
    );
}

#[test]
fn infer_service_menu_from_path() {
    assert_eq!(
        FlowKind::infer_from_url("https://booking.example.com/company/42/select-services"),
        Some(FlowKind::ServiceMenu)
    );
}

#[test]
fn infer_multi_branch_from_group_segment() {
    assert_eq!(
        FlowKind::infer_from_url("https://booking.example.com/group/7/select-city"),
        Some(FlowKind::MultiBranch)
    );
}

#[test]
fn infer_multi_branch_wins_over_services() {
    assert_eq!(
        FlowKind::infer_from_url("https://booking.example.com/branches/services"),
        Some(FlowKind::MultiBranch)
    );
}

#[test]
fn infer_reads_hash_routes() {
    assert_eq!(
        FlowKind::infer_from_url("https://widget.example.com/#/company/42/menu"),
        Some(FlowKind::ServiceMenu)
    );
}

#[test]
fn infer_returns_none_for_unknown_shape() {
    assert_eq!(FlowKind::infer_from_url("https://example.com/about"), None);
    assert_eq!(FlowKind::infer_from_url("not a url"), None);
}

#[test]
fn parse_venues_resolves_explicit_and_inferred_kinds() {
    let yaml = r"
venues:
  - id: arena-north
    url: https://booking.example.com/company/1/anything
    flow_kind: direct-booking
  - id: padel-club
    url: https://booking.example.com/company/2/select-services
    selector_profile: legacy-v1
";
    let catalog = parse_venues(yaml).unwrap();
    assert_eq!(catalog.venues.len(), 2);
    assert_eq!(
        catalog.venues[0].flow_kind,
        Some(FlowKind::DirectBooking)
    );
    assert_eq!(catalog.venues[0].selector_profile_id, DEFAULT_PROFILE_ID);
    assert_eq!(catalog.venues[1].flow_kind, Some(FlowKind::ServiceMenu));
    assert_eq!(catalog.venues[1].selector_profile_id, "legacy-v1");
    assert!(catalog.warnings.is_empty());
}

#[test]
fn unknown_flow_kind_is_a_warning_not_an_error() {
    let yaml = r"
venues:
  - id: odd-venue
    url: https://booking.example.com/company/3/select-time
    flow_kind: widget
";
    let catalog = parse_venues(yaml).unwrap();
    assert_eq!(catalog.venues[0].flow_kind, None);
    assert_eq!(catalog.warnings.len(), 1);
    assert!(catalog.warnings[0].contains("odd-venue"));
}

#[test]
fn uninferable_url_without_kind_is_a_warning() {
    let yaml = r"
venues:
  - id: mystery
    url: https://example.com/about
";
    let catalog = parse_venues(yaml).unwrap();
    assert_eq!(catalog.venues[0].flow_kind, None);
    assert_eq!(catalog.warnings.len(), 1);
}

#[test]
fn duplicate_venue_ids_are_rejected() {
    let yaml = r"
venues:
  - id: a
    url: https://booking.example.com/select-time
  - id: a
    url: https://booking.example.com/select-time
";
    let err = parse_venues(yaml).unwrap_err();
    assert!(err.to_string().contains("duplicate venue id"));
}

#[test]
fn blank_venue_id_is_rejected() {
    let yaml = r"
venues:
  - id: '  '
    url: https://booking.example.com/select-time
";
    let err = parse_venues(yaml).unwrap_err();
    assert!(err.to_string().contains("non-empty"));
}

#[test]
fn non_http_url_is_rejected() {
    let yaml = r"
venues:
  - id: ftp-venue
    url: ftp://booking.example.com/select-time
";
    let err = parse_venues(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("http(s)")));
}

#[test]
fn selector_profile_overrides_are_kept() {
    let yaml = r#"
venues:
  - id: a
    url: https://booking.example.com/select-time
selector_profiles:
  legacy-v1:
    resources: [".staff-card", "[data-resource]"]
"#;
    let catalog = parse_venues(yaml).unwrap();
    let legacy = &catalog.profile_overrides["legacy-v1"];
    assert_eq!(
        legacy["resources"],
        vec![".staff-card".to_string(), "[data-resource]".to_string()]
    );
}

#[test]
fn load_venues_reports_missing_file() {
    let err = load_venues(Path::new("/nonexistent/venues.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::VenuesFileIo { .. }));
}

#[test]
fn catalog_lookup_by_id() {
    let yaml = r"
venues:
  - id: arena-north
    url: https://booking.example.com/select-time
";
    let catalog = parse_venues(yaml).unwrap();
    assert!(catalog.venue("arena-north").is_some());
    assert!(catalog.venue("missing").is_none());
}
