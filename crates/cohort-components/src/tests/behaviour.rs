//! Behaviour-driven tests for component selection.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::{
    Category, Component, ComponentCatalog, ComponentDescriptor, ComponentError,
    ComponentFramework, ComponentMetadata, FrameworkPolicy, Priority, SelectionHints, WinnerSet,
};

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TestWorld {
    catalog: ComponentCatalog,
    framework: Option<ComponentFramework>,
    outcome: Option<Result<WinnerSet, ComponentError>>,
}

#[fixture]
fn world() -> TestWorld {
    TestWorld::default()
}

struct Fixed {
    metadata: ComponentMetadata,
    priority: Option<u32>,
}

impl Component for Fixed {
    fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    fn query(&self, _hints: &SelectionHints) -> Option<Priority> {
        self.priority.map(Priority::new)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn register(world: &mut TestWorld, name: &str, category: Category, priority: Option<u32>) {
    let metadata = ComponentMetadata::new(name.trim_matches('"'), "1.0", category);
    let produced = metadata.clone();
    world
        .catalog
        .register(ComponentDescriptor::new(metadata, move || {
            Ok(Box::new(Fixed {
                metadata: produced.clone(),
                priority,
            }))
        }))
        .expect("register candidate");
}

fn framework(world: &mut TestWorld) -> &mut ComponentFramework {
    let catalog = world.catalog.clone();
    world
        .framework
        .get_or_insert_with(|| ComponentFramework::new(catalog, FrameworkPolicy::default()))
}

fn assert_winner(world: &TestWorld, expected: &str) {
    let winners = world
        .outcome
        .as_ref()
        .expect("no outcome captured")
        .as_ref()
        .expect("expected selection to succeed");
    assert_eq!(
        winners.primary().map(crate::Winner::name),
        Some(expected.trim_matches('"'))
    );
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("a transport candidate {name} with priority {priority}")]
fn given_transport(world: &mut TestWorld, name: String, priority: u32) {
    register(world, &name, Category::Transport, Some(priority));
}

#[given("a transport candidate {name} that declines selection")]
fn given_declining_transport(world: &mut TestWorld, name: String) {
    register(world, &name, Category::Transport, None);
}

#[given("an unavailable transport candidate {name}")]
fn given_unavailable_transport(world: &mut TestWorld, name: String) {
    let label = name.trim_matches('"').to_owned();
    let metadata = ComponentMetadata::new(label.clone(), "1.0", Category::Transport);
    world
        .catalog
        .register(ComponentDescriptor::new(metadata, move || {
            Err(ComponentError::unavailable(label.clone(), "hardware absent"))
        }))
        .expect("register candidate");
}

#[given("an io candidate {name} with priority {priority}")]
fn given_io(world: &mut TestWorld, name: String, priority: u32) {
    register(world, &name, Category::Io, Some(priority));
}

#[given("the io category is deferred")]
fn given_io_deferred(world: &mut TestWorld) {
    framework(world).defer(Category::Io).expect("defer io");
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the transport category is opened and selected")]
fn when_transport_selected(world: &mut TestWorld) {
    let framework = framework(world);
    let outcome = framework
        .open(Category::Transport)
        .and_then(|_| framework.select(Category::Transport, &SelectionHints::default()));
    world.outcome = Some(outcome);
}

#[when("io is requested")]
fn when_io_requested(world: &mut TestWorld) {
    let outcome = framework(world).ensure_available(Category::Io, &SelectionHints::default());
    world.outcome = Some(outcome);
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the transport winner is {name}")]
fn then_transport_winner(world: &mut TestWorld, name: String) {
    assert_winner(world, &name);
}

#[then("the io winner is {name}")]
fn then_io_winner(world: &mut TestWorld, name: String) {
    assert_winner(world, &name);
}

#[then("selection fails with no viable component")]
fn then_no_viable(world: &mut TestWorld) {
    let error = world
        .outcome
        .as_ref()
        .expect("no outcome captured")
        .as_ref()
        .expect_err("expected selection to fail");
    assert!(
        matches!(error, ComponentError::NoViableComponent { .. }),
        "expected NoViableComponent, got: {error}"
    );
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/component_selection.feature")]
fn component_selection_behaviour(world: TestWorld) {
    let _ = world;
}
