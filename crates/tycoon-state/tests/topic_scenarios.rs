#![forbid(unsafe_code)]

//! Integration scenarios: pages wired to all three topics at once.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use tracing::Level;
use tycoon_reactive::{HostWatcher, ObserverScope, Revision, Scheduler};
use tycoon_state::{
    IndicatorView, PersistenceTopic, QueryParams, QueryTopic, SaveIndicator, SaveIndicatorConfig,
    SaveStatus, SimulationStore,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
struct Firm {
    name: &'static str,
    sector: &'static str,
    cash: i64,
}

#[derive(Debug, Clone, Default)]
struct World {
    firms: Vec<Firm>,
    day: u32,
}

fn world() -> World {
    World {
        firms: vec![
            Firm {
                name: "Acme",
                sector: "retail",
                cash: 100,
            },
            Firm {
                name: "Borealis",
                sector: "energy",
                cash: 300,
            },
            Firm {
                name: "Cobalt",
                sector: "retail",
                cash: 50,
            },
        ],
        day: 1,
    }
}

/// A page that shows firms of the selected sector, richest first.
fn visible_firms(store: &SimulationStore<World>, query: &QueryTopic) -> Vec<&'static str> {
    let sector = query.with_params(|p| p.get("sector").map(str::to_owned));
    let mut firms: Vec<Firm> = store.with(|w| {
        w.firms
            .iter()
            .filter(|f| sector.as_deref().is_none_or(|s| s == f.sector))
            .cloned()
            .collect()
    });
    firms.sort_by(|a, b| b.cash.cmp(&a.cash));
    firms.into_iter().map(|f| f.name).collect()
}

#[test]
fn page_rerenders_from_both_topics() {
    init_tracing();
    let sched = Scheduler::new();
    let store = SimulationStore::new(&sched, world());
    let query = QueryTopic::from_query("?sector=retail");
    let renders = Rc::new(RefCell::new(Vec::new()));

    let mut scope = ObserverScope::new();
    {
        let (r, s, q) = (Rc::clone(&renders), store.clone(), query.clone());
        scope.observe(store.topic(), move |_| r.borrow_mut().push(visible_firms(&s, &q)));
        let (r, s, q) = (Rc::clone(&renders), store.clone(), query.clone());
        scope.observe(query.topic(), move |()| r.borrow_mut().push(visible_firms(&s, &q)));
    }

    // One simulated day: several edits, one render.
    store.mutate(|w| w.firms[2].cash += 500);
    store.mutate(|w| w.firms[0].cash -= 20);
    store.mutate(|w| w.day += 1);
    sched.run_microtasks().unwrap();
    assert_eq!(*renders.borrow(), vec![vec!["Cobalt", "Acme"]]);

    query.navigate("?sector=energy");
    assert_eq!(renders.borrow().last(), Some(&vec!["Borealis"]));
    assert_eq!(renders.borrow().len(), 2);

    drop(scope);
    query.navigate("");
    store.mutate(|w| w.day += 1);
    sched.run_microtasks().unwrap();
    assert_eq!(renders.borrow().len(), 2);
}

#[test]
fn host_sees_game_revision_via_bridge() {
    let sched = Scheduler::new();
    let store = SimulationStore::new(&sched, world());
    let bridge = store.bridge("gameRevision");
    let host = HostWatcher::new();
    bridge.property().watch(&host);

    for _ in 0..3 {
        store.mutate(|w| w.day += 1);
        store.mutate(|w| w.firms[1].cash += 10);
        sched.run_microtasks().unwrap();
    }
    assert_eq!(host.renders(), 3);
    assert_eq!(host.last_seen(), Some(Revision::new(3)));
    assert_eq!(store.with(|w| w.day), 4);
}

#[test]
fn save_cycle_scenario() {
    init_tracing();
    let sched = Scheduler::new();
    let persistence = PersistenceTopic::new();
    let indicator = SaveIndicator::new(
        &sched,
        SaveIndicatorConfig::new().with_reset_after(Duration::from_secs(2)),
    );
    persistence.subscribe(&indicator);
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&log);
    let _sub = persistence.subscribe_fn(move |s| l.borrow_mut().push(*s));

    persistence.report(SaveStatus::Saving);
    let p = persistence.clone();
    sched.set_timeout(Duration::from_millis(10), move || {
        p.report(SaveStatus::Saved);
    });

    sched.advance(Duration::from_millis(10)).unwrap();
    assert_eq!(indicator.view(), IndicatorView::Saved);
    sched.run_until_idle().unwrap();

    assert_eq!(*log.borrow(), vec![SaveStatus::Saving, SaveStatus::Saved]);
    assert_eq!(indicator.saved_seen(), 1);
    assert_eq!(indicator.view(), IndicatorView::Hidden);
    assert_eq!(sched.now(), Duration::from_millis(2_010));
}

proptest! {
    // Parsing is total and never yields more pairs than non-empty segments.
    #[test]
    fn query_parse_is_total(raw in ".{0,64}") {
        let params = QueryParams::parse(&raw);
        let body = raw.strip_prefix('?').unwrap_or(&raw);
        let segments = body.split('&').filter(|s| !s.is_empty()).count();
        prop_assert_eq!(params.len(), segments);
    }
}
