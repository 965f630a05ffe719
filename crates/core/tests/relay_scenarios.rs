//! Observers attached to a live coordinator through the relay.

use async_trait::async_trait;
use scout_core::agents::{AgentCard, AgentError, AgentOutput, AgentRequest, StageAgent};
use scout_core::relay::{Observer, ObserverMessage, ProgressRelay, RelayConfig};
use scout_core::swarm::{Coordinator, CoordinatorConfig, NoopSink, Pipeline, StageName, StagePayload};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Holds its stage until the test opens the gate
struct GatedAgent {
    stage: StageName,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl StageAgent for GatedAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new("gated", self.stage, "waits for the test")
    }

    async fn invoke(&self, _request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(AgentOutput::complete(StagePayload::empty_for(self.stage)))
    }
}

fn gated_coordinator(gates: &HashMap<StageName, Arc<Notify>>) -> Arc<Coordinator> {
    let agents: Vec<Arc<dyn StageAgent>> = StageName::ALL
        .into_iter()
        .map(|stage| {
            Arc::new(GatedAgent {
                stage,
                gate: gates.get(&stage).cloned(),
            }) as Arc<dyn StageAgent>
        })
        .collect();
    let pipeline = Pipeline::standard(agents, None).unwrap();
    Coordinator::new(pipeline, CoordinatorConfig::default(), Arc::new(NoopSink))
}

async fn next(observer: &mut Observer) -> Option<ObserverMessage> {
    tokio::time::timeout(Duration::from_secs(5), observer.recv())
        .await
        .expect("observer timed out")
}

/// Progress sequences received until the stage starts running
async fn read_until_running(observer: &mut Observer, stage: StageName) -> Vec<u64> {
    let mut sequences = Vec::new();
    loop {
        match next(observer).await {
            Some(ObserverMessage::Progress {
                sequence,
                stage_name,
                status,
                ..
            }) => {
                sequences.push(sequence);
                if stage_name == stage.as_str() && status == scout_core::swarm::EventStatus::Running {
                    return sequences;
                }
            }
            Some(ObserverMessage::InitialState { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_two_observers_then_one_leaves() {
    let validation = Arc::new(Notify::new());
    let trend = Arc::new(Notify::new());
    let gates = HashMap::from([
        (StageName::Validation, validation.clone()),
        (StageName::TrendAnalysis, trend.clone()),
    ]);
    let coordinator = gated_coordinator(&gates);
    let relay = ProgressRelay::new(coordinator.clone(), RelayConfig::default());

    let id = coordinator.start("Acme Corp").await.unwrap();
    let mut first = relay.attach(&id);
    let mut second = relay.attach(&id);

    let mut since = Vec::new();
    for observer in [&mut first, &mut second] {
        match next(observer).await {
            Some(ObserverMessage::InitialState { sequence, .. }) => since.push(sequence),
            other => panic!("expected initial state, got {:?}", other),
        }
    }

    validation.notify_one();
    let seen_first = read_until_running(&mut first, StageName::TrendAnalysis).await;
    let seen_second = read_until_running(&mut second, StageName::TrendAnalysis).await;

    // Ordered and gap-free after each observer's snapshot, same end point
    assert_eq!(seen_first.last(), seen_second.last());
    for (start, seen) in [(since[0], &seen_first), (since[1], &seen_second)] {
        let expected: Vec<u64> = (start + 1..=*seen.last().unwrap()).collect();
        assert_eq!(*seen, expected);
    }

    relay.detach(&id, first.id);
    trend.notify_one();

    let mut last_sequence = *seen_second.last().unwrap();
    loop {
        match next(&mut second).await {
            Some(ObserverMessage::Progress { sequence, .. }) => {
                assert_eq!(sequence, last_sequence + 1);
                last_sequence = sequence;
            }
            Some(ObserverMessage::Completion { outcome, progress, .. }) => {
                assert_eq!(outcome, "completed");
                assert_eq!(progress, 100);
                break;
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(next(&mut second).await, None);
}

#[tokio::test]
async fn test_upstream_released_after_last_observer() {
    let gate = Arc::new(Notify::new());
    let coordinator = gated_coordinator(&HashMap::from([(StageName::Validation, gate.clone())]));
    let relay = ProgressRelay::new(coordinator.clone(), RelayConfig::default());

    let id = coordinator.start("Acme Corp").await.unwrap();
    let mut observer = relay.attach(&id);
    next(&mut observer).await;
    assert_eq!(coordinator.bus().subscriber_count(&id), 1);

    relay.detach(&id, observer.id);
    let mut released = false;
    for _ in 0..100 {
        if !coordinator.bus().has_channel(&id) {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released, "bus channel still open");

    let mut observer = relay.attach(&id);
    assert!(matches!(next(&mut observer).await, Some(ObserverMessage::InitialState { .. })));
    assert_eq!(coordinator.bus().subscriber_count(&id), 1);

    gate.notify_one();
    loop {
        match next(&mut observer).await {
            Some(ObserverMessage::Completion { .. }) => break,
            Some(_) => {}
            None => panic!("stream ended before completion"),
        }
    }
}

#[tokio::test]
async fn test_late_joiner_gets_completion() {
    let coordinator = gated_coordinator(&HashMap::new());
    let relay = ProgressRelay::new(coordinator.clone(), RelayConfig::default());

    let id = coordinator.start("Acme Corp").await.unwrap();
    coordinator.wait(&id).await.unwrap();

    let mut observer = relay.attach(&id);
    match next(&mut observer).await {
        Some(ObserverMessage::InitialState { progress, .. }) => assert_eq!(progress, 100),
        other => panic!("expected initial state, got {:?}", other),
    }
    assert!(matches!(next(&mut observer).await, Some(ObserverMessage::Completion { .. })));
    assert_eq!(next(&mut observer).await, None);
}
