mod common;

use common::{BASE, FakeServer, viewer_page};
use slide_ripper::{RipError, config::Config, fetch::MetadataFetcher};

fn fetcher() -> MetadataFetcher {
    let mut cfg = Config::default();
    cfg.source.base_url = BASE.into();
    MetadataFetcher::new(&cfg).unwrap()
}

#[test]
fn parses_width_and_height() {
    let (w, h) = fetcher().parse(&viewer_page(98304, 73728)).unwrap();
    assert_eq!((w, h), (98304, 73728));
}

#[test]
fn missing_field_is_a_parse_error() {
    let err = fetcher().parse(r#"height: "1024""#).unwrap_err();
    assert!(matches!(err, RipError::Parse(_)), "{err}");

    let err = fetcher().parse(r#"width: "1024", height: "tall""#).unwrap_err();
    assert!(matches!(err, RipError::Parse(_)), "{err}");
}

#[test]
fn oversized_number_is_a_parse_error() {
    let err = fetcher()
        .parse(r#"height: "99999999999999", width: "10""#)
        .unwrap_err();
    assert!(matches!(err, RipError::Parse(_)), "{err}");
}

#[test]
fn fetch_goes_through_the_client_once() {
    let server = FakeServer::new().with_image("S-12", 2048, 1536);
    let (w, h) = fetcher().fetch(&server, "S-12").unwrap();
    assert_eq!((w, h), (2048, 1536));
    assert_eq!(server.metadata_calls(), 1);
}

#[test]
fn unknown_image_is_a_network_error() {
    let server = FakeServer::new();
    let err = fetcher().fetch(&server, "missing").unwrap_err();
    assert!(matches!(err, RipError::Network { .. }), "{err}");
}

#[test]
fn bad_pattern_is_rejected_up_front() {
    let err = MetadataFetcher::with_patterns(BASE, "height: \"(\\d+", "width").unwrap_err();
    assert!(matches!(err, RipError::Config(_)), "{err}");
}
