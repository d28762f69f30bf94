//! End-to-end dispatch behaviour: routing, ignore rules, registration
//! lifecycle, fault policies and determinism

mod common;

use assay_core::{
    Collector, CollectorError, CollectorOutput, Deadline, DispatchContext, DocumentIndex,
    FaultPolicy, FailureStage, Interest, TimeoutMode, Token, Warehouse, WarehouseConfig,
    WarehouseError,
};
use common::{sample_tokens, Fault, FaultyCollector, TextCollector, SAMPLE_SOURCE};
use serde_json::json;

fn warehouse(config: WarehouseConfig) -> Warehouse {
    Warehouse::new(&sample_tokens(), SAMPLE_SOURCE, config).unwrap()
}

fn texts(warehouse: &mut Warehouse, collector: TextCollector) -> Vec<serde_json::Value> {
    let name = collector.name().to_string();
    warehouse.register(collector).unwrap();
    let extraction = warehouse.dispatch_all().unwrap();
    extraction.results[&name].items.clone()
}

#[test]
fn test_routes_only_subscribed_types() {
    let mut w = warehouse(WarehouseConfig::default());
    assert_eq!(
        texts(&mut w, TextCollector::new("text")),
        vec![json!("A"), json!("one"), json!("quoted"), json!("B")]
    );
}

#[test]
fn test_ignore_subtree_skips_blockquote_contents() {
    let mut w = warehouse(WarehouseConfig::default());
    let collector =
        TextCollector::with_interest("outside", Interest::new(["text"]).ignoring(["blockquote_open"]));
    assert_eq!(
        texts(&mut w, collector),
        vec![json!("A"), json!("one"), json!("B")]
    );
}

#[test]
fn test_ignore_rules_are_per_collector() {
    let mut w = warehouse(WarehouseConfig::default());
    w.register(TextCollector::with_interest(
        "no_headings",
        Interest::new(["text"]).ignoring(["heading"]),
    ))
    .unwrap();
    w.register(TextCollector::new("everything")).unwrap();

    let extraction = w.dispatch_all().unwrap();
    assert_eq!(extraction.results["no_headings"].items, vec![json!("one"), json!("quoted")]);
    assert_eq!(extraction.results["everything"].count, 4);
}

/// Records the open-block depth and quote membership of every text token
struct ContextProbe {
    seen: Vec<(usize, bool)>,
}

impl Collector for ContextProbe {
    fn name(&self) -> &str {
        "probe"
    }

    fn interest(&self) -> Interest {
        Interest::new(["text"])
    }

    fn should_process(&self, _index: usize, token: &Token, _ctx: &DispatchContext<'_>) -> bool {
        token.content() != "B"
    }

    fn on_token(
        &mut self,
        _index: usize,
        _token: &Token,
        ctx: &DispatchContext<'_>,
        _warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError> {
        self.seen.push((ctx.depth(), ctx.is_inside("blockquote")));
        Ok(())
    }

    fn finalize(
        &mut self,
        _warehouse: &DocumentIndex,
        _deadline: &Deadline,
    ) -> Result<CollectorOutput, CollectorError> {
        let mut items = assay_core::CappedItems::new(10);
        for entry in self.seen.drain(..) {
            items.push(entry);
        }
        Ok(items.take_output().map_err(anyhow::Error::from)?)
    }
}

#[test]
fn test_context_and_predicate() {
    let mut w = warehouse(WarehouseConfig::default());
    w.register(ContextProbe { seen: Vec::new() }).unwrap();
    let extraction = w.dispatch_all().unwrap();

    assert_eq!(
        extraction.results["probe"].items,
        vec![json!([1, false]), json!([1, false]), json!([2, true])]
    );
    assert_eq!(extraction.stats.skipped_predicate, 1);
}

#[test]
fn test_registration_after_dispatch_is_rejected() {
    let mut w = warehouse(WarehouseConfig::default());
    w.register(TextCollector::new("first")).unwrap();
    w.dispatch_all().unwrap();

    let err = w.register(TextCollector::new("late")).unwrap_err();
    assert!(matches!(err, WarehouseError::RegistrationClosed { .. }));
    assert!(err.to_string().contains("late"));
}

#[test]
fn test_dispatch_twice_is_rejected() {
    let mut w = warehouse(WarehouseConfig::default());
    w.dispatch_all().unwrap();
    assert!(matches!(w.dispatch_all(), Err(WarehouseError::AlreadyDispatched)));
}

#[test]
fn test_caps_truncate_output() {
    let mut w = warehouse(WarehouseConfig::default());
    w.register(TextCollector::capped("capped", 2)).unwrap();
    let extraction = w.dispatch_all().unwrap();

    let output = &extraction.results["capped"];
    assert_eq!(output.count, 2);
    assert_eq!(output.items.len(), 2);
    assert!(output.truncated);
    assert_eq!(output.max_allowed, 2);
}

#[test]
fn test_lenient_policy_drops_failing_collectors() {
    let mut w = warehouse(WarehouseConfig::default());
    w.register(FaultyCollector::new("errors", Fault::ErrorOnToken)).unwrap();
    w.register(FaultyCollector::new("panics", Fault::PanicOnToken)).unwrap();
    w.register(FaultyCollector::new("finalize_errors", Fault::ErrorOnFinalize))
        .unwrap();
    w.register(FaultyCollector::new("finalize_panics", Fault::PanicOnFinalize))
        .unwrap();
    w.register(TextCollector::new("healthy")).unwrap();

    let extraction = w.dispatch_all().unwrap();

    assert_eq!(extraction.results.len(), 1);
    assert_eq!(extraction.results["healthy"].count, 4);

    let failed: Vec<(&str, FailureStage)> = extraction
        .failures
        .iter()
        .map(|f| (f.collector.as_str(), f.stage))
        .collect();
    assert_eq!(
        failed,
        vec![
            ("errors", FailureStage::Dispatch),
            ("panics", FailureStage::Dispatch),
            ("finalize_errors", FailureStage::Finalize),
            ("finalize_panics", FailureStage::Finalize),
        ]
    );
    assert!(extraction.failures[1].message.contains("collector bug"));
}

#[test]
fn test_strict_policy_propagates_first_error() {
    let mut w = warehouse(WarehouseConfig::strict());
    w.register(TextCollector::new("healthy")).unwrap();
    w.register(FaultyCollector::new("broken", Fault::ErrorOnToken)).unwrap();

    match w.dispatch_all() {
        Err(WarehouseError::Collector { name, source }) => {
            assert_eq!(name, "broken");
            assert!(matches!(source, CollectorError::Failed(_)));
        }
        other => panic!("expected collector error, got {other:?}"),
    }
}

#[test]
fn test_strict_policy_lets_panics_propagate() {
    let mut w = warehouse(WarehouseConfig::strict());
    w.register(FaultyCollector::new("panics", Fault::PanicOnToken)).unwrap();

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| w.dispatch_all()));
    assert!(caught.is_err());
}

#[test]
fn test_finalize_timeout_is_recorded() {
    for mode in [TimeoutMode::Cooperative, TimeoutMode::Preemptive] {
        let mut config = WarehouseConfig::default();
        config.timeout.mode = mode;
        config.timeout.budget_ms = 10;

        let mut w = warehouse(config);
        w.register(FaultyCollector::new("spinner", Fault::SpinInFinalize)).unwrap();
        w.register(FaultyCollector::new("sleeper", Fault::SleepInFinalize)).unwrap();
        w.register(TextCollector::new("healthy")).unwrap();

        let extraction = w.dispatch_all().unwrap();
        assert!(extraction.results.contains_key("healthy"), "{mode:?}");
        assert_eq!(extraction.failures.len(), 2, "{mode:?}");
        assert!(extraction.failures.iter().all(|f| f.timed_out), "{mode:?}");
    }
}

#[test]
fn test_strict_timeout_is_an_error() {
    let mut config = WarehouseConfig::strict();
    config.timeout.mode = TimeoutMode::Cooperative;
    config.timeout.budget_ms = 5;

    let mut w = warehouse(config);
    w.register(FaultyCollector::new("sleeper", Fault::SleepInFinalize)).unwrap();
    match w.dispatch_all() {
        Err(WarehouseError::Collector { source, .. }) => assert!(source.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn test_output_is_byte_identical_across_runs() {
    let run = || {
        let mut w = warehouse(WarehouseConfig::default());
        w.register(TextCollector::new("b_text")).unwrap();
        w.register(TextCollector::with_interest(
            "a_outside",
            Interest::new(["text"]).ignoring(["blockquote"]),
        ))
        .unwrap();
        w.register(FaultyCollector::new("broken", Fault::ErrorOnToken)).unwrap();
        w.dispatch_all().unwrap().to_json().unwrap()
    };

    let first = run();
    for _ in 0..5 {
        assert_eq!(run(), first);
    }
    // Results are keyed by name in sorted order
    assert!(first.find("a_outside").unwrap() < first.find("b_text").unwrap());
}

#[test]
fn test_config_from_toml_drives_policy() {
    let config = WarehouseConfig::from_toml_str(
        r#"
        fault_policy = "strict"

        [timeout]
        mode = "off"
        "#,
    )
    .unwrap();
    assert_eq!(config.fault_policy, FaultPolicy::Strict);

    let mut w = warehouse(config);
    w.register(FaultyCollector::new("broken", Fault::ErrorOnFinalize)).unwrap();
    assert!(w.dispatch_all().is_err());
}
