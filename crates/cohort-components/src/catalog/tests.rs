//! Unit tests for the component catalog.

use rstest::{fixture, rstest};

use super::*;
use crate::component::{Priority, SelectionHints};

struct Inert(ComponentMetadata);

impl Component for Inert {
    fn metadata(&self) -> &ComponentMetadata {
        &self.0
    }

    fn query(&self, _hints: &SelectionHints) -> Option<Priority> {
        Some(Priority::new(1))
    }
}

fn descriptor(name: &str, category: Category) -> ComponentDescriptor {
    let meta = ComponentMetadata::new(name, "1.0", category);
    let produced = meta.clone();
    ComponentDescriptor::new(meta, move || Ok(Box::new(Inert(produced.clone()))))
}

#[fixture]
fn populated_catalog() -> ComponentCatalog {
    let mut catalog = ComponentCatalog::new();
    catalog
        .register(descriptor("tcp", Category::Transport))
        .expect("register tcp");
    catalog
        .register(descriptor("shm", Category::Transport))
        .expect("register shm");
    catalog
        .register(descriptor("basic", Category::Collective))
        .expect("register basic");
    catalog
}

#[test]
fn new_catalog_is_empty() {
    let catalog = ComponentCatalog::new();
    assert!(catalog.is_empty());
    assert!(catalog.for_category(Category::Transport).is_empty());
}

#[rstest]
fn registration_order_is_preserved(populated_catalog: ComponentCatalog) {
    let names: Vec<_> = populated_catalog
        .for_category(Category::Transport)
        .iter()
        .map(ComponentDescriptor::name)
        .collect();
    assert_eq!(names, vec!["tcp", "shm"]);
    assert_eq!(populated_catalog.len(), 3);
}

#[rstest]
fn duplicate_names_are_rejected_within_a_category(mut populated_catalog: ComponentCatalog) {
    let error = populated_catalog
        .register(descriptor("tcp", Category::Transport))
        .expect_err("duplicate should fail");
    assert!(matches!(error, ComponentError::Descriptor { .. }));
    assert!(error.to_string().contains("already registered"));
}

#[rstest]
fn same_name_is_allowed_across_categories(mut populated_catalog: ComponentCatalog) {
    populated_catalog
        .register(descriptor("basic", Category::Topology))
        .expect("distinct category");
    assert!(populated_catalog.get(Category::Topology, "basic").is_some());
}

#[test]
fn invalid_metadata_is_rejected() {
    let mut catalog = ComponentCatalog::new();
    let error = catalog
        .register(descriptor("", Category::Io))
        .expect_err("blank name should fail");
    assert!(matches!(error, ComponentError::Descriptor { .. }));
}

#[rstest]
fn instantiate_invokes_factory(populated_catalog: ComponentCatalog) {
    let component = populated_catalog
        .get(Category::Collective, "basic")
        .expect("descriptor")
        .instantiate()
        .expect("factory succeeds");
    assert_eq!(component.metadata().name(), "basic");
}
