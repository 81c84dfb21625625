//! Unit tests for the built-in launcher backends.

use std::num::NonZeroUsize;

use rstest::{fixture, rstest};

use super::*;
use crate::backend::{BackendDescriptor, Eligibility, LauncherBackend, PLM_FRAMEWORK};
use crate::environment::{MockEnvironmentProbe, StaticEnvironment};
use crate::error::LaunchError;
use crate::params::{OverrideSource, ParamOrigin, ParameterStore};

/// Registers and opens a backend against a fresh store.
fn prepare<B: LauncherBackend>(mut backend: B, overrides: &[&str]) -> (B, ParameterStore) {
    let mut store = ParameterStore::new();
    let component = backend.descriptor().param_component();
    backend
        .register_parameters(&mut store.scope(PLM_FRAMEWORK, component))
        .expect("register parameters");
    let source = OverrideSource::parse(overrides).expect("parse overrides");
    store.resolve(&[&source]).expect("resolve overrides");
    store.freeze();
    backend.open(&store).expect("open backend");
    (backend, store)
}

fn commands(eligibility: &Eligibility, request: &DaemonLaunch) -> Vec<String> {
    let Eligibility::Eligible { module, .. } = eligibility else {
        panic!("expected an eligible backend");
    };
    module
        .launch_commands(request)
        .expect("launch commands")
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[fixture]
fn two_nodes() -> DaemonLaunch {
    DaemonLaunch::new(
        "prted",
        vec!["--uri".into(), "tcp://head:5000".into()],
        vec!["n01".into(), "n02".into()],
    )
}

// ---------------------------------------------------------------------------
// Slurm
// ---------------------------------------------------------------------------

#[test]
fn slurm_registers_args_and_warning_parameters() {
    let (_, store) = prepare(SlurmBackend::new(), &[]);
    let args = store.entry("plm_slurm_args").expect("args parameter");
    assert_eq!(args.value(), &crate::params::ParamValue::Unset);
    let warning = store.entry("plm_slurm_warning").expect("warning parameter");
    assert_eq!(warning.value(), &crate::params::ParamValue::Bool(true));
    assert_eq!(warning.origin(), ParamOrigin::Default);
}

#[test]
fn slurm_is_ineligible_without_a_job_id() {
    let (backend, store) = prepare(SlurmBackend::new(), &[]);
    let eligibility = backend.query(&StaticEnvironment::new(), &store);
    assert!(matches!(eligibility, Eligibility::Ineligible));
}

#[test]
fn slurm_reads_the_job_id_through_the_probe() {
    let (backend, store) = prepare(SlurmBackend::new(), &[]);
    let mut probe = MockEnvironmentProbe::new();
    probe
        .expect_is_set()
        .times(1)
        .returning(|key| key == "SLURM_JOBID");
    probe
        .expect_var()
        .times(1)
        .returning(|key| (key == "SLURM_JOBID").then(|| "4242".to_owned()));
    let eligibility = backend.query(&probe, &store);
    assert_eq!(eligibility.priority(), Some(SLURM_PRIORITY));
}

#[rstest]
#[case::slurm(Box::new(SlurmBackend::new()), SLURM_PRIORITY)]
#[case::pbs(Box::new(PbsBackend::new()), PBS_PRIORITY)]
#[case::lsf(Box::new(LsfBackend::new()), LSF_PRIORITY)]
fn present_signals_count_even_when_unreadable(
    #[case] backend: Box<dyn LauncherBackend>,
    #[case] priority: i32,
) {
    let mut probe = MockEnvironmentProbe::new();
    probe.expect_is_set().returning(|_| true);
    probe.expect_var().returning(|_| None);
    let eligibility = backend.query(&probe, &ParameterStore::new());
    assert_eq!(eligibility.priority(), Some(priority));
}

#[rstest]
fn slurm_builds_a_single_srun_step(two_nodes: DaemonLaunch) {
    let (backend, store) = prepare(SlurmBackend::new(), &["plm_slurm_args=--exclusive --mpi=none"]);
    let env = StaticEnvironment::new().with_var("SLURM_JOBID", "7");
    let eligibility = backend.query(&env, &store);
    assert_eq!(
        commands(&eligibility, &two_nodes),
        vec![
            "srun --ntasks-per-node=1 --kill-on-bad-exit --nodes=2 --nodelist=n01,n02 \
             --exclusive --mpi=none prted --uri tcp://head:5000"
        ]
    );
}

#[test]
fn slurm_rejects_an_empty_allocation() {
    let (backend, store) = prepare(SlurmBackend::new(), &[]);
    let env = StaticEnvironment::new().with_var("SLURM_JOBID", "7");
    let Eligibility::Eligible { module, .. } = backend.query(&env, &store) else {
        panic!("slurm should be eligible");
    };
    let err = module
        .launch_commands(&DaemonLaunch::new("prted", Vec::new(), Vec::new()))
        .expect_err("empty allocation should fail");
    assert_eq!(
        err,
        LaunchError::EmptyAllocation {
            backend: "slurm".into()
        }
    );
}

#[rstest]
#[case::nodes("--nodes=4", vec!["--nodes=4"])]
#[case::short_flag("-N", vec!["-N"])]
#[case::attached_node_count("-N4", vec!["-N4"])]
#[case::attached_node_list("-wnode[1-2]", vec!["-wnode[1-2]"])]
#[case::unrelated("--exclusive", vec![])]
#[case::prefix_only("--nodesfile=x", vec![])]
fn slurm_detects_overridden_options(#[case] custom: &str, #[case] expected: Vec<&str>) {
    let module = slurm::SlurmModule::for_tests(vec![custom.to_owned()]);
    assert_eq!(module.overridden_options(), expected);
}

// ---------------------------------------------------------------------------
// PBS
// ---------------------------------------------------------------------------

#[rstest]
#[case::neither(&[], false)]
#[case::job_only(&[("PBS_JOBID", "12.head")], false)]
#[case::environment_only(&[("PBS_ENVIRONMENT", "PBS_BATCH")], false)]
#[case::both(&[("PBS_JOBID", "12.head"), ("PBS_ENVIRONMENT", "PBS_BATCH")], true)]
fn pbs_requires_both_signals(#[case] vars: &[(&str, &str)], #[case] eligible: bool) {
    let (backend, store) = prepare(PbsBackend::new(), &[]);
    let env: StaticEnvironment = vars.iter().copied().collect();
    assert_eq!(backend.query(&env, &store).is_eligible(), eligible);
}

#[rstest]
fn pbs_spawns_one_task_per_node(two_nodes: DaemonLaunch) {
    let (backend, store) = prepare(PbsBackend::new(), &[]);
    let env = StaticEnvironment::new()
        .with_var("PBS_JOBID", "12.head")
        .with_var("PBS_ENVIRONMENT", "PBS_BATCH");
    assert_eq!(
        commands(&backend.query(&env, &store), &two_nodes),
        vec![
            "pbsdsh -h n01 prted --uri tcp://head:5000",
            "pbsdsh -h n02 prted --uri tcp://head:5000",
        ]
    );
}

// ---------------------------------------------------------------------------
// LSF
// ---------------------------------------------------------------------------

#[rstest]
fn lsf_launches_through_blaunch(two_nodes: DaemonLaunch) {
    let (backend, store) = prepare(LsfBackend::new(), &[]);
    assert!(!backend.query(&StaticEnvironment::new(), &store).is_eligible());

    let env = StaticEnvironment::new().with_var("LSB_JOBID", "88");
    let eligibility = backend.query(&env, &store);
    assert_eq!(eligibility.priority(), Some(LSF_PRIORITY));
    let Eligibility::Eligible { module, .. } = eligibility else {
        panic!("lsf should be eligible");
    };
    let launch = module.launch_commands(&two_nodes).expect("commands");
    let command = launch.first().expect("one command");
    assert_eq!(command.program(), "blaunch");
    assert_eq!(
        command.args(),
        ["-z", "n01 n02", "prted", "--uri", "tcp://head:5000"]
    );
}

// ---------------------------------------------------------------------------
// SSH
// ---------------------------------------------------------------------------

#[rstest]
fn ssh_is_always_eligible_at_low_priority(two_nodes: DaemonLaunch) {
    let (backend, store) = prepare(SshBackend::new(), &[]);
    let eligibility = backend.query(&StaticEnvironment::new(), &store);
    assert_eq!(eligibility.priority(), Some(SSH_PRIORITY));
    assert_eq!(
        commands(&eligibility, &two_nodes),
        vec![
            "ssh n01 prted --uri tcp://head:5000",
            "ssh n02 prted --uri tcp://head:5000",
        ]
    );
}

#[rstest]
fn ssh_uses_the_first_configured_agent(two_nodes: DaemonLaunch) {
    let (backend, store) = prepare(
        SshBackend::new(),
        &["plm_ssh_agent= : rsh -l batch : ssh", "plm_ssh_args=-n"],
    );
    let eligibility = backend.query(&StaticEnvironment::new(), &store);
    let rendered = commands(&eligibility, &two_nodes);
    assert_eq!(
        rendered.first().map(String::as_str),
        Some("rsh -l batch -n n01 prted --uri tcp://head:5000")
    );
}

#[rstest]
#[case::default(&[], Some(128))]
#[case::configured(&["plm_ssh_num_concurrent=4"], Some(4))]
fn ssh_limits_concurrent_agents(#[case] overrides: &[&str], #[case] expected: Option<usize>) {
    let (backend, store) = prepare(SshBackend::new(), overrides);
    let Eligibility::Eligible { module, .. } = backend.query(&StaticEnvironment::new(), &store)
    else {
        panic!("ssh should be eligible");
    };
    assert_eq!(module.max_concurrent().map(NonZeroUsize::get), expected);
}

#[rstest]
#[case::zero("0")]
#[case::negative("-3")]
fn ssh_open_fails_without_a_positive_concurrency(#[case] value: &str) {
    let mut backend = SshBackend::new();
    let mut store = ParameterStore::new();
    backend
        .register_parameters(&mut store.scope(PLM_FRAMEWORK, "ssh"))
        .expect("register");
    store
        .set_from_str("plm_ssh_num_concurrent", value, ParamOrigin::Override)
        .expect("set concurrency");
    let err = backend.open(&store).expect_err("open should fail");
    assert_eq!(err.backend, "ssh");
}

#[rstest]
fn single_step_launchers_leave_concurrency_unbounded(two_nodes: DaemonLaunch) {
    let (backend, store) = prepare(SlurmBackend::new(), &[]);
    let env = StaticEnvironment::new().with_var("SLURM_JOBID", "7");
    let Eligibility::Eligible { module, .. } = backend.query(&env, &store) else {
        panic!("slurm should be eligible");
    };
    assert!(module.launch_commands(&two_nodes).is_ok());
    assert!(module.max_concurrent().is_none());
}

#[test]
fn ssh_open_fails_without_an_agent() {
    let mut backend = SshBackend::new();
    let mut store = ParameterStore::new();
    backend
        .register_parameters(&mut store.scope(PLM_FRAMEWORK, "ssh"))
        .expect("register");
    store
        .set_from_str("plm_ssh_agent", " : ", ParamOrigin::Override)
        .expect("set agent");
    let err = backend.open(&store).expect_err("open should fail");
    assert_eq!(err.backend, "ssh");
    assert!(!backend.query(&StaticEnvironment::new(), &store).is_eligible());
}

#[test]
fn ssh_is_ineligible_after_close() {
    let (mut backend, store) = prepare(SshBackend::new(), &[]);
    backend.close();
    backend.close();
    assert!(!backend.query(&StaticEnvironment::new(), &store).is_eligible());
}

// ---------------------------------------------------------------------------
// Shared contract
// ---------------------------------------------------------------------------

#[rstest]
#[case::slurm(Box::new(SlurmBackend::new()))]
#[case::pbs(Box::new(PbsBackend::new()))]
#[case::lsf(Box::new(LsfBackend::new()))]
#[case::ssh(Box::new(SshBackend::new()))]
fn close_is_safe_without_open_and_repeatable(#[case] mut backend: Box<dyn LauncherBackend>) {
    backend.close();
    backend.close();
    let descriptor: BackendDescriptor = backend.descriptor();
    assert_eq!(descriptor.framework(), PLM_FRAMEWORK);
}

#[rstest]
#[case::slurm(Box::new(SlurmBackend::new()))]
#[case::pbs(Box::new(PbsBackend::new()))]
#[case::lsf(Box::new(LsfBackend::new()))]
fn resource_manager_backends_ignore_an_empty_environment(
    #[case] backend: Box<dyn LauncherBackend>,
) {
    let store = ParameterStore::new();
    let first = backend.query(&StaticEnvironment::new(), &store);
    let second = backend.query(&StaticEnvironment::new(), &store);
    assert!(matches!(first, Eligibility::Ineligible));
    assert!(matches!(second, Eligibility::Ineligible));
}
