//! Unit tests for the simulated registry.

use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::progress::CooperativeProgress;

#[fixture]
fn cluster() -> SimCluster {
    SimCluster::new(JobId::new(3), 2)
}

fn state_op(identity: ProcessIdentity, state: ProcessState) -> RegistryOp {
    RegistryOp::put(identity, STATE_KEY, vec![state.as_byte()])
}

fn bounded() -> WaitPolicy {
    WaitPolicy::new(Duration::from_millis(5)).with_deadline(Duration::from_secs(5))
}

#[rstest]
fn gate_releases_once_every_member_arrives(cluster: SimCluster) {
    let registry = cluster.registry();
    let members = cluster.members();
    let [first, second] = members.as_slice() else {
        panic!("expected two members");
    };

    registry
        .batch(&[state_op(*first, ProcessState::AtStage1)])
        .expect("first batch");
    assert!(!cluster
        .events()
        .contains(&RegistryEvent::Released { gate: BarrierGate::Stage1 }));

    registry
        .write(*second, STATE_KEY, &[ProcessState::AtStage1.as_byte()])
        .expect("second write");
    assert!(cluster
        .events()
        .contains(&RegistryEvent::Released { gate: BarrierGate::Stage1 }));
    assert_eq!(cluster.batches_for(*first), 1);
    assert_eq!(cluster.batches_for(*second), 0);
    assert_eq!(cluster.state_of(*second), Some(ProcessState::AtStage1));
}

#[rstest]
fn loopback_waits_for_release(cluster: SimCluster) {
    let registry = cluster.registry();
    let oob = cluster.oob();
    let members = cluster.members();

    let waiter = thread::spawn(move || {
        let mut delivered = Vec::new();
        let result = oob.xcast(
            BarrierGate::Stage2,
            &[],
            &mut |gate: BarrierGate, payload: &[u8]| delivered.push((gate, payload.len())),
            &CooperativeProgress::new(),
            bounded(),
        );
        (result, delivered)
    });

    for identity in members {
        registry
            .write(identity, STATE_KEY, &[ProcessState::AtStage2.as_byte()])
            .expect("state write");
    }

    let (result, delivered) = waiter.join().expect("waiter thread");
    result.expect("barrier released");
    assert_eq!(delivered, vec![(BarrierGate::Stage2, 0)]);
}

#[rstest]
fn loopback_times_out_when_peers_never_arrive(cluster: SimCluster) {
    let oob = cluster.oob();
    let progress = CooperativeProgress::new();
    let policy = WaitPolicy::new(Duration::from_millis(2)).with_deadline(Duration::from_millis(20));
    let error = oob
        .xcast(
            BarrierGate::Stage1,
            &[],
            &mut |_: BarrierGate, _: &[u8]| {},
            &progress,
            policy,
        )
        .expect_err("barrier must time out");
    assert!(matches!(error, OobError::Timeout { gate: BarrierGate::Stage1, .. }));
    assert!(progress.passes() > 0);
}

#[rstest]
fn injected_batch_failures_surface(cluster: SimCluster) {
    cluster.fail_batches("registry restarting");
    let error = cluster
        .registry()
        .batch(&[])
        .expect_err("batch must fail");
    assert_eq!(
        error,
        RegistryError::Unavailable {
            message: String::from("registry restarting")
        }
    );
}

#[rstest]
fn notify_all_forces_release(cluster: SimCluster) {
    cluster
        .registry()
        .notify_all(BarrierGate::Stage1)
        .expect("notify");
    assert_eq!(
        cluster.events(),
        vec![RegistryEvent::Released { gate: BarrierGate::Stage1 }]
    );
}
