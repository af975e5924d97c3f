// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capability registry

mod common;

use common::FakeEngine;
use vidpipe::registry::filters::FilterSpecError;
use vidpipe::registry::{DeviceClass, FilterRegistry, SourceRegistry, parse_filter_spec, sinks};

#[test]
fn test_custom_kernel_parses_row_major() {
    let spec = parse_filter_spec("blur/123456789").unwrap();
    assert_eq!(spec.name, "blur");
    assert_eq!(spec.coefficients, Some([[1, 2, 3], [4, 5, 6], [7, 8, 9]]));
}

#[test]
fn test_malformed_kernels_are_rejected() {
    assert_eq!(
        parse_filter_spec("blur/12345678"),
        Err(FilterSpecError::BadCoefficients("12345678".to_string()))
    );
    assert_eq!(
        parse_filter_spec("blur/12345678a"),
        Err(FilterSpecError::BadCoefficients("12345678a".to_string()))
    );
    assert_eq!(parse_filter_spec("/123456789"), Err(FilterSpecError::EmptyName));
}

#[test]
fn test_filters_follow_available_plugins() {
    let all = FilterRegistry::discover(&FakeEngine::default());
    assert_eq!(all.count(), 2);
    assert_eq!(all.position("filter2d"), Some(0));
    assert_eq!(all.position("Optical Flow"), Some(1));
    assert_eq!(all.modes(0), &["HW", "SW"]);
    assert!(all.modes(5).is_empty());

    let none = FilterRegistry::discover(&FakeEngine::with_plugins(Vec::new()));
    assert_eq!(none.count(), 0);
    assert_eq!(none.position("filter2d"), None);
}

#[test]
fn test_sources_lookup_by_name_and_class() {
    let sources = SourceRegistry::from_classes([DeviceClass::Csi, DeviceClass::Tpg], true);
    assert_eq!(sources.index_of_name("mipi"), Some(0));
    assert_eq!(sources.index_of_name("tpg"), Some(1));
    assert_eq!(sources.index_of_class(DeviceClass::File), Some(2));
    assert_eq!(sources.index_of_name("hdmi"), None);

    let without_file = SourceRegistry::from_classes([DeviceClass::Csi], false);
    assert_eq!(without_file.count(), 1);
    assert!(!without_file.is_terminal_file(0));
}

#[test]
fn test_sink_names_resolve_drivers() {
    assert!(sinks::find_by_name("hdmi").is_some());
    assert!(sinks::find_by_name("vga").is_none());
}
