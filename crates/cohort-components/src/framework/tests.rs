//! Unit tests for the component framework.

use std::sync::{Arc, Mutex};

use cohort_types::{JobId, ProcessIdentity};
use mockall::mock;
use rstest::{fixture, rstest};

use super::*;
use crate::catalog::ComponentDescriptor;
use crate::category::CategoryPolicy;
use crate::component::{CommunicatorScope, ComponentMetadata, ContactAttribute};

#[derive(Clone, Default)]
struct Ledger(Arc<Mutex<Vec<String>>>);

impl Ledger {
    fn record(&self, entry: String) {
        self.0.lock().expect("ledger mutex poisoned").push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().expect("ledger mutex poisoned").clone()
    }
}

struct Scripted {
    metadata: ComponentMetadata,
    priority: Option<u32>,
    max_members: Option<usize>,
    ledger: Ledger,
}

impl Component for Scripted {
    fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    fn query(&self, hints: &SelectionHints) -> Option<Priority> {
        if let (Some(limit), Some(scope)) = (self.max_members, hints.communicator())
            && scope.size() > limit
        {
            return None;
        }
        self.priority.map(Priority::new)
    }

    fn close(&mut self) {
        self.ledger.record(format!("close:{}", self.metadata.name()));
    }
}

fn scripted(
    name: &str,
    category: Category,
    priority: Option<u32>,
    max_members: Option<usize>,
    ledger: &Ledger,
) -> ComponentDescriptor {
    let metadata = ComponentMetadata::new(name, "1.0", category);
    let produced = metadata.clone();
    let ledger = ledger.clone();
    ComponentDescriptor::new(metadata, move || {
        Ok(Box::new(Scripted {
            metadata: produced.clone(),
            priority,
            max_members,
            ledger: ledger.clone(),
        }))
    })
}

fn failing(name: &str, category: Category, error: ComponentError) -> ComponentDescriptor {
    ComponentDescriptor::new(ComponentMetadata::new(name, "1.0", category), move || {
        Err(error.clone())
    })
}

#[fixture]
fn ledger() -> Ledger {
    Ledger::default()
}

fn framework_with(descriptors: Vec<ComponentDescriptor>) -> ComponentFramework {
    let mut catalog = ComponentCatalog::new();
    for descriptor in descriptors {
        catalog.register(descriptor).expect("register descriptor");
    }
    ComponentFramework::new(catalog, FrameworkPolicy::default())
}

// ---------------------------------------------------------------------------
// Open
// ---------------------------------------------------------------------------

#[rstest]
fn unavailable_candidates_are_skipped(ledger: Ledger) {
    let mut framework = framework_with(vec![
        failing(
            "ib",
            Category::Transport,
            ComponentError::unavailable("ib", "no adapters"),
        ),
        scripted("tcp", Category::Transport, Some(10), None, &ledger),
    ]);
    let opened = framework.open(Category::Transport).expect("open");
    assert_eq!(opened, 1);
}

#[rstest]
fn fatal_construction_closes_earlier_candidates(ledger: Ledger) {
    let mut framework = framework_with(vec![
        scripted("tcp", Category::Transport, Some(10), None, &ledger),
        failing(
            "broken",
            Category::Transport,
            ComponentError::operation("broken", "open", "bad state"),
        ),
    ]);
    let error = framework
        .open(Category::Transport)
        .expect_err("fatal construction must fail");
    assert!(matches!(error, ComponentError::Construction { ref name, .. } if name == "broken"));
    assert_eq!(ledger.entries(), vec![String::from("close:tcp")]);
}

#[rstest]
fn opening_twice_is_rejected(ledger: Ledger) {
    let mut framework = framework_with(vec![scripted(
        "tcp",
        Category::Transport,
        Some(1),
        None,
        &ledger,
    )]);
    framework.open(Category::Transport).expect("first open");
    assert_eq!(
        framework.open(Category::Transport),
        Err(ComponentError::AlreadyOpened {
            category: Category::Transport
        })
    );
}

// ---------------------------------------------------------------------------
// Select
// ---------------------------------------------------------------------------

#[test]
fn select_before_open_is_rejected() {
    let mut framework = framework_with(Vec::new());
    let error = framework
        .select(Category::MemoryPool, &SelectionHints::default())
        .expect_err("select before open must fail");
    assert_eq!(
        error,
        ComponentError::NotOpened {
            category: Category::MemoryPool
        }
    );
}

#[rstest]
fn single_winner_keeps_highest_priority_and_closes_losers(ledger: Ledger) {
    let mut framework = framework_with(vec![
        scripted("tcp", Category::Transport, Some(10), None, &ledger),
        scripted("shm", Category::Transport, Some(40), None, &ledger),
        scripted("self", Category::Transport, None, None, &ledger),
    ]);
    framework.open(Category::Transport).expect("open");
    let winners = framework
        .select(Category::Transport, &SelectionHints::default())
        .expect("select");
    assert_eq!(winners.names(), vec!["shm"]);
    assert_eq!(
        winners.primary().map(Winner::priority),
        Some(Priority::new(40))
    );
    let mut closed = ledger.entries();
    closed.sort();
    assert_eq!(closed, vec![String::from("close:self"), String::from("close:tcp")]);
}

#[rstest]
fn ties_go_to_the_earliest_registered(ledger: Ledger) {
    let mut framework = framework_with(vec![
        scripted("first", Category::MemoryPool, Some(5), None, &ledger),
        scripted("second", Category::MemoryPool, Some(5), None, &ledger),
    ]);
    framework.open(Category::MemoryPool).expect("open");
    let winners = framework
        .select(Category::MemoryPool, &SelectionHints::default())
        .expect("select");
    assert_eq!(winners.names(), vec!["first"]);
}

#[rstest]
fn ranked_categories_keep_every_acceptor(ledger: Ledger) {
    let mut framework = framework_with(vec![
        scripted("basic", Category::Collective, Some(10), None, &ledger),
        scripted("tuned", Category::Collective, Some(30), None, &ledger),
        scripted("self", Category::Collective, Some(75), Some(1), &ledger),
    ]);
    framework.open(Category::Collective).expect("open");
    let winners = framework
        .select(Category::Collective, &SelectionHints::default())
        .expect("select");
    assert_eq!(winners.names(), vec!["self", "tuned", "basic"]);
}

#[rstest]
#[case(Category::Transport, true)]
#[case(Category::Allocator, false)]
fn empty_selection_fails_only_for_mandatory_categories(
    ledger: Ledger,
    #[case] category: Category,
    #[case] fails: bool,
) {
    let mut framework = framework_with(vec![scripted("shy", category, None, None, &ledger)]);
    framework.open(category).expect("open");
    let outcome = framework.select(category, &SelectionHints::default());
    if fails {
        assert_eq!(outcome, Err(ComponentError::NoViableComponent { category }));
    } else {
        assert!(outcome.expect("optional category").is_empty());
    }
}

#[rstest]
fn selecting_twice_is_rejected(ledger: Ledger) {
    let mut framework = framework_with(vec![scripted(
        "basic",
        Category::Collective,
        Some(1),
        None,
        &ledger,
    )]);
    framework.open(Category::Collective).expect("open");
    framework
        .select(Category::Collective, &SelectionHints::default())
        .expect("first select");
    assert_eq!(
        framework.select(Category::Collective, &SelectionHints::default()),
        Err(ComponentError::AlreadySelected {
            category: Category::Collective
        })
    );
}

// ---------------------------------------------------------------------------
// Per-communicator selection
// ---------------------------------------------------------------------------

#[rstest]
fn communicator_selection_filters_by_scope(ledger: Ledger) {
    let mut framework = framework_with(vec![
        scripted("basic", Category::Collective, Some(10), None, &ledger),
        scripted("self", Category::Collective, Some(75), Some(1), &ledger),
    ]);
    framework.open(Category::Collective).expect("open");
    framework
        .select(Category::Collective, &SelectionHints::default())
        .expect("select");

    let world = SelectionHints::default().with_communicator(CommunicatorScope::new("world", 4));
    let self_only = SelectionHints::default().with_communicator(CommunicatorScope::new("self", 1));
    let world_set = framework
        .select_for_communicator(Category::Collective, &world)
        .expect("world selection");
    let self_set = framework
        .select_for_communicator(Category::Collective, &self_only)
        .expect("self selection");

    assert_eq!(world_set.names(), vec!["basic"]);
    assert_eq!(self_set.names(), vec!["self", "basic"]);
    assert_eq!(
        framework
            .winners(Category::Collective)
            .expect("winners")
            .len(),
        2
    );
}

#[test]
fn communicator_selection_requires_prior_selection() {
    let framework = framework_with(Vec::new());
    assert_eq!(
        framework.select_for_communicator(Category::Collective, &SelectionHints::default()),
        Err(ComponentError::NotSelected {
            category: Category::Collective
        })
    );
}

// ---------------------------------------------------------------------------
// Deferred activation
// ---------------------------------------------------------------------------

#[rstest]
fn deferred_category_activates_on_first_use(ledger: Ledger) {
    let mut framework = framework_with(vec![scripted(
        "romio",
        Category::Io,
        Some(10),
        None,
        &ledger,
    )]);
    framework.defer(Category::Io).expect("defer");
    assert!(framework.is_dormant(Category::Io));

    let first = framework
        .ensure_available(Category::Io, &SelectionHints::default())
        .expect("activation");
    let second = framework
        .ensure_available(Category::Io, &SelectionHints::default())
        .expect("idempotent");
    assert_eq!(first, second);
    assert!(!framework.is_dormant(Category::Io));
}

#[rstest]
fn failed_activation_stays_dormant(ledger: Ledger) {
    let policy = FrameworkPolicy::default().with(
        Category::Topology,
        CategoryPolicy::new(SelectionPolicy::RankedMulti, true, Activation::Deferred),
    );
    let mut catalog = ComponentCatalog::new();
    catalog
        .register(scripted("cart", Category::Topology, None, None, &ledger))
        .expect("register");
    let mut framework = ComponentFramework::new(catalog, policy);
    framework.defer(Category::Topology).expect("defer");

    let error = framework
        .ensure_available(Category::Topology, &SelectionHints::default())
        .expect_err("mandatory empty category fails");
    assert_eq!(
        error,
        ComponentError::NoViableComponent {
            category: Category::Topology
        }
    );
    assert!(framework.is_dormant(Category::Topology));
}

#[test]
fn eager_category_is_not_activated_lazily() {
    let mut framework = framework_with(Vec::new());
    assert_eq!(
        framework.ensure_available(Category::Transport, &SelectionHints::default()),
        Err(ComponentError::NotOpened {
            category: Category::Transport
        })
    );
}

// ---------------------------------------------------------------------------
// Winner access
// ---------------------------------------------------------------------------

mock! {
    Engine {}
    impl Component for Engine {
        fn metadata(&self) -> &ComponentMetadata;
        fn query(&self, hints: &SelectionHints) -> Option<Priority>;
        fn enable(&mut self, enabled: bool) -> Result<(), ComponentError>;
        fn add_procs(&mut self, peers: &[ProcessIdentity]) -> Result<(), ComponentError>;
        fn contact_attributes(&self) -> Vec<ContactAttribute>;
        fn close(&mut self);
    }
}

fn engine_descriptor() -> ComponentDescriptor {
    let metadata = ComponentMetadata::new("mock-engine", "1.0", Category::Transport);
    let produced = metadata.clone();
    ComponentDescriptor::new(metadata, move || {
        let mut engine = MockEngine::new();
        engine.expect_metadata().return_const(produced.clone());
        engine
            .expect_query()
            .returning(|_| Some(Priority::new(1)));
        engine
            .expect_enable()
            .withf(|enabled| *enabled)
            .times(1)
            .returning(|_| Ok(()));
        engine
            .expect_add_procs()
            .withf(|peers| peers.len() == 3)
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_close().never();
        Ok(Box::new(engine))
    })
}

#[test]
fn winner_hooks_are_reachable_through_the_framework() {
    let mut framework = framework_with(vec![engine_descriptor()]);
    framework.open(Category::Transport).expect("open");
    framework
        .select(Category::Transport, &SelectionHints::default())
        .expect("select");

    let peers = ProcessIdentity::job_members(JobId::new(1), 3);
    framework
        .with_winner_mut(Category::Transport, |engine| engine.enable(true))
        .expect("winner present")
        .expect("enable succeeds");
    framework
        .with_winner_mut(Category::Transport, |engine| engine.add_procs(&peers))
        .expect("winner present")
        .expect("add_procs succeeds");
    let selections = framework.selections();
    assert_eq!(selections.len(), 1);
    assert_eq!(
        selections.first().and_then(WinnerSet::primary).map(|winner| winner.name()),
        Some("mock-engine")
    );
}

#[test]
fn winner_access_requires_selection() {
    let mut framework = framework_with(Vec::new());
    let outcome = framework.with_winner_mut(Category::Transport, |_| ());
    assert_eq!(
        outcome,
        Err(ComponentError::NotSelected {
            category: Category::Transport
        })
    );
}
