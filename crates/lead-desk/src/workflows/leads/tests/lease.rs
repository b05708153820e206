use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Duration;

use super::common::*;
use crate::workflows::leads::{Clock, LeadId, LeadStatus, LeadStore, LeadWorkflowError};

#[test]
fn checkout_sets_both_lease_fields() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);

    let leased = harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("checkout succeeds");

    let lease = leased.lease.expect("lease recorded");
    assert_eq!(lease.checked_out_by, agent(AGENT_A));
    assert_eq!(lease.checked_out_at, start());
}

#[test]
fn checkout_of_missing_lead_is_not_found() {
    let harness = harness();
    match harness.service.checkout_lead(LeadId(404), &agent(AGENT_A)) {
        Err(LeadWorkflowError::NotFound(LeadId(404))) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn checkout_requires_assignment() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    let unassigned = harness.seed(2, None, 10);

    for id in [lead.id, unassigned.id] {
        match harness.service.checkout_lead(id, &agent(AGENT_B)) {
            Err(LeadWorkflowError::NotAssigned { lead, .. }) => assert_eq!(lead, id),
            other => panic!("expected not assigned, got {other:?}"),
        }
    }
}

#[test]
fn recheckout_by_holder_is_idempotent() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    let first = harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("first checkout");

    harness.clock.advance(Duration::minutes(5));
    let second = harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("re-checkout is a no-op");

    assert_eq!(first.lease, second.lease);
}

#[test]
fn second_agent_sees_already_leased_until_expiry() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("agent a checks out");

    // Lead handed to agent b while agent a is still working it.
    harness
        .service
        .assign_leads(&[lead.id], &agent(AGENT_B))
        .expect("reassign");

    harness.clock.advance(Duration::minutes(14));
    match harness.service.checkout_lead(lead.id, &agent(AGENT_B)) {
        Err(LeadWorkflowError::AlreadyLeased {
            holder, expires_at, ..
        }) => {
            assert_eq!(holder, agent(AGENT_A));
            assert_eq!(expires_at, start() + Duration::minutes(15));
        }
        other => panic!("expected already leased, got {other:?}"),
    }

    harness.clock.advance(Duration::minutes(1));
    let reclaimed = harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_B))
        .expect("expired lease is reclaimed");
    let lease = reclaimed.lease.expect("new lease");
    assert_eq!(lease.checked_out_by, agent(AGENT_B));
    assert_eq!(lease.checked_out_at, harness.clock.now());
}

#[test]
fn checkout_then_release_restores_unleased_state() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);

    harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("checkout");
    let released = harness
        .service
        .release_lead(lead.id, &agent(AGENT_A))
        .expect("release");
    assert!(released);

    let stored = harness
        .store
        .fetch_lead(lead.id)
        .expect("fetch")
        .expect("lead present");
    assert_eq!(stored, lead);
}

#[test]
fn release_by_non_holder_is_wrong_holder() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("checkout");

    match harness.service.release_lead(lead.id, &agent(AGENT_B)) {
        Err(LeadWorkflowError::WrongHolder { holder, .. }) => assert_eq!(holder, agent(AGENT_A)),
        other => panic!("expected wrong holder, got {other:?}"),
    }
    assert!(harness
        .store
        .fetch_lead(lead.id)
        .expect("fetch")
        .expect("present")
        .lease
        .is_some());
}

#[test]
fn release_of_unleased_lead_reports_false() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);

    let released = harness
        .service
        .release_lead(lead.id, &agent(AGENT_A))
        .expect("release is answered");
    assert!(!released);
}

#[test]
fn release_of_expired_lease_held_by_previous_assignee_reports_false() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("checkout");
    harness
        .service
        .assign_leads(&[lead.id], &agent(AGENT_B))
        .expect("reassign");
    harness.clock.advance(Duration::minutes(30));

    let released = harness
        .service
        .release_lead(lead.id, &agent(AGENT_B))
        .expect("expired lease reads as unleased");
    assert!(!released);
}

#[test]
fn holder_releasing_an_expired_lease_reports_false() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("checkout");
    harness.clock.advance(Duration::minutes(15));

    let released = harness
        .service
        .release_lead(lead.id, &agent(AGENT_A))
        .expect("release is answered");
    assert!(!released);

    let reclaimed = harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("stale lease is reclaimed");
    let lease = reclaimed.lease.expect("fresh lease");
    assert_eq!(lease.checked_out_at, harness.clock.now());
}

#[test]
fn release_of_live_lease_after_reassignment_is_still_wrong_holder() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("checkout");
    harness
        .service
        .assign_leads(&[lead.id], &agent(AGENT_B))
        .expect("reassign");
    harness.clock.advance(Duration::minutes(14));

    match harness.service.release_lead(lead.id, &agent(AGENT_B)) {
        Err(LeadWorkflowError::WrongHolder { holder, .. }) => assert_eq!(holder, agent(AGENT_A)),
        other => panic!("expected wrong holder, got {other:?}"),
    }
}

#[test]
fn concurrent_checkouts_yield_a_single_lease() {
    let harness = harness();
    let lead_id = harness.seed(1, Some(AGENT_A), 10).id;
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = harness.service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                service.checkout_lead(lead_id, &agent(AGENT_A))
            })
        })
        .collect();

    let leases: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread joins").expect("checkout succeeds"))
        .map(|lead| lead.lease.expect("leased"))
        .collect();

    assert!(leases.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn concurrent_agents_racing_an_expired_lease_produce_one_winner() {
    let harness = harness();
    let lead = harness.seed(1, Some(AGENT_A), 10);
    harness
        .service
        .checkout_lead(lead.id, &agent(AGENT_A))
        .expect("checkout");
    harness.clock.advance(Duration::minutes(20));
    let lead_id = lead.id;

    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|n| {
            let service = harness.service.clone();
            let store = harness.store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let me = agent(&format!("agent-{n}"));
                barrier.wait();
                // Each racer takes the assignment, then tries to lease.
                store.assign_lead(lead_id, &me).expect("assign");
                (me.clone(), service.checkout_lead(lead_id, &me))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread joins"))
        .collect();

    let winners: Vec<_> = results
        .iter()
        .filter_map(|(me, result)| result.as_ref().ok().map(|lead| (me, lead)))
        .collect();
    for (me, lead) in &winners {
        assert_eq!(
            &lead.lease.as_ref().expect("winner holds lease").checked_out_by,
            *me
        );
    }
    assert!(winners.len() <= 1, "at most one agent may win the lease");

    let stored = harness
        .store
        .fetch_lead(lead.id)
        .expect("fetch")
        .expect("present");
    if let Some((me, _)) = winners.first() {
        assert_eq!(&stored.lease.expect("lease").checked_out_by, *me);
    }
    for (_, result) in &results {
        if let Err(error) = result {
            assert!(matches!(
                error,
                LeadWorkflowError::AlreadyLeased { .. } | LeadWorkflowError::NotAssigned { .. }
            ));
        }
    }
    assert_eq!(stored.current_status, LeadStatus::New);
}
