use super::{Destination, RouteDescriptor, RoutePattern, RouteTable};
use crate::dispatcher::{ActionDescriptor, Controller};
use crate::error::{ConstructionError, PatternError};
use crate::results::ActionReturn;
use crate::services::Resolver;
use http::Method;

fn noop(name: &str) -> Destination {
    Destination::handler(name, |_| Ok(()))
}

#[test]
fn test_root_pattern_matches_root_only() {
    let p = RoutePattern::parse("/").unwrap();
    assert!(p.match_path("/").is_some());
    assert!(p.match_path("").is_some());
    assert!(p.match_path("/a").is_none());
}

#[test]
fn test_literal_segments_ignore_case() {
    let p = RoutePattern::parse("/api/links").unwrap();
    assert!(p.match_path("/API/Links").is_some());
    assert!(p.match_path("/api/links/").is_some());
}

#[test]
fn test_parameter_value_keeps_case() {
    let p = RoutePattern::parse("/api/links/{id}").unwrap();
    let data = p.match_path("/api/Links/AbC").unwrap();
    assert_eq!(data.get("id"), Some("AbC"));
    assert_eq!(data.get("ID"), Some("AbC"));
}

#[test]
fn test_parameter_rejects_empty_segment() {
    let p = RoutePattern::parse("/a/{id}/b").unwrap();
    assert!(p.match_path("/a//b").is_none());
}

#[test]
fn test_parameter_value_is_percent_decoded() {
    let p = RoutePattern::parse("/tags/{tag}").unwrap();
    let data = p.match_path("/tags/rust%20lang").unwrap();
    assert_eq!(data.get("tag"), Some("rust lang"));
}

#[test]
fn test_catch_all_binds_remainder() {
    let p = RoutePattern::parse("/files/{*rest}").unwrap();
    assert_eq!(p.match_path("/files/a/b/c").unwrap().get("rest"), Some("a/b/c"));
    assert_eq!(p.match_path("/files/").unwrap().get("rest"), Some(""));
    assert_eq!(p.match_path("/files").unwrap().get("rest"), Some(""));
    assert!(p.match_path("/other/a").is_none());
}

#[test]
fn test_segment_count_mismatch() {
    let p = RoutePattern::parse("/a/b").unwrap();
    assert!(p.match_path("/a").is_none());
    assert!(p.match_path("/a/b/c").is_none());
}

#[test]
fn test_catch_all_must_be_last() {
    let err = RoutePattern::parse("/files/{*rest}/meta").unwrap_err();
    assert!(matches!(err, PatternError::CatchAllNotLast { .. }));
}

#[test]
fn test_malformed_patterns_rejected() {
    assert!(matches!(
        RoutePattern::parse("/a/{}").unwrap_err(),
        PatternError::EmptyParameterName { .. }
    ));
    assert!(matches!(
        RoutePattern::parse("/a/{id").unwrap_err(),
        PatternError::UnterminatedParameter { .. }
    ));
    assert!(matches!(
        RoutePattern::parse("/a/{a}{b}").unwrap_err(),
        PatternError::UnterminatedParameter { .. }
    ));
    assert!(matches!(
        RoutePattern::parse("/a/{*rest}}").unwrap_err(),
        PatternError::UnterminatedParameter { .. }
    ));
    assert!(matches!(
        RoutePattern::parse("/a/{id}/b/{ID}").unwrap_err(),
        PatternError::DuplicateParameter { .. }
    ));
}

#[test]
fn test_first_registered_wins() {
    let mut table = RouteTable::new();
    table.map(Method::GET, "/items/{id}", noop("by_id")).unwrap();
    table.map(Method::GET, "/items/latest", noop("latest")).unwrap();
    let m = table.try_match(&Method::GET, "/items/latest").unwrap();
    assert_eq!(m.destination.name(), "by_id");
}

#[test]
fn test_method_filter_is_case_insensitive() {
    let mut table = RouteTable::new();
    table.map(Method::POST, "/items", noop("create")).unwrap();
    let lower = Method::from_bytes(b"post").unwrap();
    assert!(table.try_match(&lower, "/items").is_some());
    assert!(table.try_match(&Method::GET, "/items").is_none());
}

#[test]
fn test_fallback_only_when_nothing_matches() {
    let mut table = RouteTable::new();
    table.map(Method::GET, "/home", noop("home")).unwrap();
    table.register_fallback(noop("spa"));
    let direct = table.try_match(&Method::GET, "/home").unwrap();
    assert_eq!(direct.destination.name(), "home");
    assert!(!direct.is_fallback());
    let other = table.try_match(&Method::GET, "/anything/else").unwrap();
    assert_eq!(other.destination.name(), "spa");
    assert!(other.is_fallback());
    assert!(other.route_data.is_empty());
}

#[test]
fn test_fallback_last_registration_wins() {
    let mut table = RouteTable::new();
    table.register_fallback(noop("first"));
    table.register_fallback(noop("second"));
    assert_eq!(table.fallback().unwrap().name(), "second");
}

#[test]
fn test_pattern_introspection() {
    let pattern = RoutePattern::parse("/users/{id}/files/{*path}").unwrap();
    assert_eq!(pattern.parameter_names().collect::<Vec<_>>(), ["id", "path"]);
    assert!(pattern.has_catch_all());

    let plain = RoutePattern::parse("/users/{id}").unwrap();
    assert!(!plain.has_catch_all());
    assert_eq!(RoutePattern::parse("/").unwrap().parameter_names().count(), 0);
}

struct Widgets;

impl Controller for Widgets {
    fn construct(_resolver: &dyn Resolver) -> Result<Self, ConstructionError> {
        Ok(Self)
    }

    fn actions() -> Vec<ActionDescriptor> {
        vec![ActionDescriptor::builder::<Self>("Widgets.get")
            .get()
            .route("/widgets/{Id}")
            .route_param::<u32>("id", "id")
            .route_param::<u32>("owner", "owner")
            .param::<u32>("page")
            .handle(|_, _| Ok(ActionReturn::Null))]
    }
}

#[test]
fn test_unmatched_route_hints_are_reported() {
    let action = Widgets::actions().remove(0);
    let route = RouteDescriptor::new(Method::GET, "/widgets/{Id}", Destination::action(action)).unwrap();
    assert_eq!(route.unmatched_route_hints(), ["owner"]);

    let handler = RouteDescriptor::new(Method::GET, "/widgets", noop("list")).unwrap();
    assert!(handler.unmatched_route_hints().is_empty());
}
