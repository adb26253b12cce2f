//! End-to-end lifecycle scenarios: phase ordering, disablement, failure
//! unwinding, and composition-time errors.

mod common;

use common::{argv, entries, journal, ProbeFeature};
use keel::{ApplicationServer, Error, FeatureDescriptor};

#[tokio::test]
async fn resolved_order_honors_constraints_and_stop_reverses() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("client").starts_after("config"),
            // The last feature in resolved order carries the process's work
            // and requests shutdown when it finishes.
            Box::new(ProbeFeature::new("client", &j).request_shutdown_on_start()),
        )
        .feature(
            FeatureDescriptor::new("log"),
            Box::new(ProbeFeature::new("log", &j)),
        )
        .feature(
            FeatureDescriptor::new("config").starts_after("log"),
            Box::new(ProbeFeature::new("config", &j)),
        )
        .build()
        .unwrap();

    server.run(argv()).await.unwrap();

    assert_eq!(
        server.resolved_order().unwrap(),
        ["log", "config", "client"]
    );
    assert_eq!(
        entries(&j),
        [
            "log:collect",
            "config:collect",
            "client:collect",
            "log:load",
            "config:load",
            "client:load",
            "log:validate",
            "config:validate",
            "client:validate",
            "log:prepare",
            "config:prepare",
            "client:prepare",
            "log:start",
            "config:start",
            "client:start",
            "client:stop",
            "config:stop",
            "log:stop",
        ]
    );
}

#[tokio::test]
async fn unconstrained_features_keep_registration_order() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("c"),
            Box::new(ProbeFeature::new("c", &j)),
        )
        .feature(
            FeatureDescriptor::new("a"),
            Box::new(ProbeFeature::new("a", &j)),
        )
        .feature(
            FeatureDescriptor::new("b"),
            Box::new(ProbeFeature::new("b", &j)),
        )
        .build()
        .unwrap();

    let order = server.resolve_order().unwrap();
    assert_eq!(order, ["c", "a", "b"]);
    // Resolving again yields the identical order.
    assert_eq!(server.resolve_order().unwrap(), order);
}

#[tokio::test]
async fn constraint_on_unregistered_feature_is_ignored() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("a").starts_after("ghost"),
            Box::new(ProbeFeature::new("a", &j)),
        )
        .build()
        .unwrap();

    assert_eq!(server.resolve_order().unwrap(), ["a"]);
}

#[tokio::test]
async fn dependency_cycle_aborts_before_any_phase() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("a").starts_after("b"),
            Box::new(ProbeFeature::new("a", &j)),
        )
        .feature(
            FeatureDescriptor::new("b").starts_after("a"),
            Box::new(ProbeFeature::new("b", &j)),
        )
        .build()
        .unwrap();

    let err = server.run(argv()).await.unwrap_err();
    assert!(matches!(err, Error::DependencyCycle(_)));
    assert!(entries(&j).is_empty(), "no phase may run after a cycle");
}

#[tokio::test]
async fn duplicate_name_fails_registration_before_any_phase() {
    let j = journal();
    let result = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("x"),
            Box::new(ProbeFeature::new("x", &j)),
        )
        .feature(
            FeatureDescriptor::new("x"),
            Box::new(ProbeFeature::new("x", &j)),
        )
        .build();

    assert!(matches!(result, Err(Error::DuplicateFeature(name)) if name == "x"));
    assert!(entries(&j).is_empty());
}

#[tokio::test]
async fn disabled_feature_still_collects_and_validates_but_nothing_else() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("a"),
            Box::new(ProbeFeature::new("a", &j).disable_self()),
        )
        .feature(
            FeatureDescriptor::new("b").starts_after("a"),
            Box::new(ProbeFeature::new("b", &j).request_shutdown_on_start()),
        )
        .build()
        .unwrap();

    server.run(argv()).await.unwrap();

    let calls = entries(&j);
    assert!(calls.contains(&"a:collect".to_string()));
    assert!(calls.contains(&"a:validate".to_string()));
    assert!(!calls.contains(&"a:prepare".to_string()));
    assert!(!calls.contains(&"a:start".to_string()));
    assert!(!calls.contains(&"a:stop".to_string()));
    // The disabled feature still occupies its slot in the resolved order.
    assert_eq!(server.resolved_order().unwrap(), ["a", "b"]);
}

#[tokio::test]
async fn optional_feature_failing_validation_is_disabled_not_fatal() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("flaky").optional(true),
            Box::new(ProbeFeature::new("flaky", &j).fail_validate()),
        )
        .feature(
            FeatureDescriptor::new("main"),
            Box::new(ProbeFeature::new("main", &j).request_shutdown_on_start()),
        )
        .build()
        .unwrap();

    server.run(argv()).await.unwrap();

    let calls = entries(&j);
    assert!(calls.contains(&"flaky:validate".to_string()));
    assert!(!calls.contains(&"flaky:prepare".to_string()));
    assert!(calls.contains(&"main:start".to_string()));
}

#[tokio::test]
async fn required_feature_failing_validation_is_fatal() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("strict"),
            Box::new(ProbeFeature::new("strict", &j).fail_validate()),
        )
        .feature(
            FeatureDescriptor::new("later").starts_after("strict"),
            Box::new(ProbeFeature::new("later", &j)),
        )
        .build()
        .unwrap();

    let err = server.run(argv()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidOptions { feature, .. } if feature == "strict"));

    let calls = entries(&j);
    assert!(!calls.iter().any(|c| c.ends_with(":prepare")));
    assert!(!calls.iter().any(|c| c.ends_with(":start")));
    assert!(!calls.iter().any(|c| c.ends_with(":stop")));
}

#[tokio::test]
async fn prepare_failure_unwinds_prepared_features_in_reverse() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("a"),
            Box::new(ProbeFeature::new("a", &j)),
        )
        .feature(
            FeatureDescriptor::new("b").starts_after("a"),
            Box::new(ProbeFeature::new("b", &j)),
        )
        .feature(
            FeatureDescriptor::new("p").starts_after("b"),
            Box::new(ProbeFeature::new("p", &j).fail_prepare()),
        )
        .feature(
            FeatureDescriptor::new("c").starts_after("p"),
            Box::new(ProbeFeature::new("c", &j)),
        )
        .build()
        .unwrap();

    let err = server.run(argv()).await.unwrap_err();
    assert!(matches!(err, Error::PrepareFailed { feature, .. } if feature == "p"));

    let calls = entries(&j);
    // Everything before p completed prepare and is stopped, in reverse.
    let stops: Vec<_> = calls.iter().filter(|c| c.ends_with(":stop")).collect();
    assert_eq!(stops, ["b:stop", "a:stop"]);
    // p attempted prepare but never completed it, so it gets no stop.
    assert!(calls.contains(&"p:prepare".to_string()));
    assert!(!calls.contains(&"p:stop".to_string()));
    // Features after p receive no calls past validation at all.
    assert!(!calls.contains(&"c:prepare".to_string()));
    assert!(!calls.contains(&"c:start".to_string()));
    assert!(!calls.contains(&"c:stop".to_string()));
    // No feature was started.
    assert!(!calls.iter().any(|c| c.ends_with(":start")));
}

#[tokio::test]
async fn start_failure_stops_the_partially_started_feature_too() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("base"),
            Box::new(ProbeFeature::new("base", &j)),
        )
        .feature(
            FeatureDescriptor::new("broken").starts_after("base"),
            Box::new(ProbeFeature::new("broken", &j).fail_start()),
        )
        .build()
        .unwrap();

    let err = server.run(argv()).await.unwrap_err();
    assert!(matches!(err, Error::StartFailed { feature, .. } if feature == "broken"));

    let stops: Vec<_> = entries(&j)
        .into_iter()
        .filter(|c| c.ends_with(":stop"))
        .collect();
    // 'broken' completed prepare, so its stop must tolerate the partial
    // start and runs before its dependency's.
    assert_eq!(stops, ["broken:stop", "base:stop"]);
}

#[tokio::test]
async fn run_can_only_be_called_once() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("a"),
            Box::new(ProbeFeature::new("a", &j).request_shutdown_on_start()),
        )
        .build()
        .unwrap();

    server.run(argv()).await.unwrap();
    assert!(server.run(argv()).await.is_err());
}

#[tokio::test]
async fn unknown_feature_lookup_fails_but_disabled_lookup_succeeds() {
    let j = journal();
    let mut server = ApplicationServer::builder()
        .name("test")
        .feature(
            FeatureDescriptor::new("a"),
            Box::new(ProbeFeature::new("a", &j).disable_self()),
        )
        .feature(
            FeatureDescriptor::new("b"),
            Box::new(ProbeFeature::new("b", &j).request_shutdown_on_start()),
        )
        .build()
        .unwrap();

    server.run(argv()).await.unwrap();

    assert!(matches!(
        server.registry().feature("ghost"),
        Err(Error::UnknownFeature(_))
    ));
    // Disabled features remain valid lookup targets.
    assert!(server.registry().feature("a").is_ok());
    assert!(!server.registry().is_enabled("a").unwrap());
}
