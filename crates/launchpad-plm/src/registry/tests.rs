//! Unit tests for the component registry.

use rstest::{fixture, rstest};

use super::*;
use crate::testing::ScriptedBackend;

#[fixture]
fn populated_registry() -> ComponentRegistry {
    ComponentRegistry::new()
        .with(ScriptedBackend::new("scheduler-a", 75))
        .and_then(|r| r.with(ScriptedBackend::new("daemon-tree", 50)))
        .and_then(|r| r.with(ScriptedBackend::new("generic-shell", 10)))
        .expect("register scripted backends")
}

#[test]
fn new_registry_is_empty() {
    let registry = ComponentRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.enumerate().len(), 0);
}

#[rstest]
fn enumerate_preserves_registration_order(populated_registry: ComponentRegistry) {
    let names: Vec<&str> = populated_registry
        .enumerate()
        .map(BackendDescriptor::name)
        .collect();
    assert_eq!(names, vec!["scheduler-a", "daemon-tree", "generic-shell"]);
    assert_eq!(populated_registry.len(), 3);
}

#[rstest]
fn get_finds_registered_descriptor(populated_registry: ComponentRegistry) {
    let descriptor = populated_registry.get("daemon-tree").expect("daemon-tree");
    assert_eq!(descriptor.name(), "daemon-tree");
    assert!(populated_registry.get("missing").is_none());
}

#[rstest]
fn register_rejects_duplicate_names(mut populated_registry: ComponentRegistry) {
    let err = populated_registry
        .register(Box::new(ScriptedBackend::new("generic-shell", 99)))
        .expect_err("duplicate should fail");
    assert!(matches!(err, PlmError::DuplicateBackend { ref name } if name == "generic-shell"));
    assert_eq!(populated_registry.len(), 3);
}

#[test]
fn register_rejects_blank_names() {
    let mut registry = ComponentRegistry::new();
    let err = registry
        .register(Box::new(ScriptedBackend::new("  ", 1)))
        .expect_err("blank name should fail");
    assert!(matches!(err, PlmError::InvalidDescriptor { .. }));
    assert!(registry.is_empty());
}

#[rstest]
#[case::space("generic shell")]
#[case::dot("sched.a")]
#[case::non_ascii("sch\u{e9}d")]
fn register_rejects_names_outside_the_parameter_alphabet(#[case] name: &str) {
    let mut registry = ComponentRegistry::new();
    let err = registry
        .register(Box::new(ScriptedBackend::new(name, 1)))
        .expect_err("malformed name should fail");
    assert!(matches!(err, PlmError::InvalidDescriptor { .. }));
}

#[rstest]
#[case::dash_and_underscore("a-b", "a_b")]
#[case::letter_case("scheduler-A", "scheduler-a")]
fn register_rejects_names_sharing_a_parameter_component(
    #[case] first: &str,
    #[case] second: &str,
) {
    let mut registry = ComponentRegistry::new()
        .with(ScriptedBackend::new(first, 1))
        .expect("first backend registers");
    let err = registry
        .register(Box::new(ScriptedBackend::new(second, 2)))
        .expect_err("colliding component should fail");
    assert!(
        matches!(err, PlmError::InvalidDescriptor { ref message } if message.contains(first)),
        "unexpected error: {err}"
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn builtin_registry_lists_backends_in_preference_order() {
    let registry = ComponentRegistry::builtin().expect("builtin registry");
    let names: Vec<&str> = registry.enumerate().map(BackendDescriptor::name).collect();
    assert_eq!(names, vec!["slurm", "pbs", "lsf", "ssh"]);
    let slurm = registry.get("slurm").expect("slurm registered");
    assert!(slurm.flags().checkpoint_ready);
}
