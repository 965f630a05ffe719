//! End-to-end runs of the coordinator with scripted agents.

use async_trait::async_trait;
use scout_core::agents::{AgentCard, AgentError, AgentOutput, AgentRequest, StageAgent};
use scout_core::swarm::{
    Coordinator, CoordinatorConfig, EventStatus, NoopSink, Pipeline, ProgressEvent, SnapshotSink,
    SqliteSnapshotStore, StageName, StagePayload, StageStatus, TaskErrorKind, TaskStatus,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Records the order stages ran in; optionally fails one stage fatally
struct RecordingAgent {
    stage: StageName,
    log: Arc<Mutex<Vec<StageName>>>,
    fatal: bool,
}

#[async_trait]
impl StageAgent for RecordingAgent {
    fn card(&self) -> AgentCard {
        AgentCard::new("recording", self.stage, "records invocations")
    }

    async fn invoke(&self, request: AgentRequest<'_>) -> Result<AgentOutput, AgentError> {
        self.log.lock().unwrap().push(self.stage);
        // Later stages see everything before them
        assert_eq!(request.context.len(), StageName::ALL.iter().position(|s| *s == self.stage).unwrap());
        if self.fatal {
            return Err(AgentError::fatal(TaskErrorKind::AgentFailure, "no usable competitor data"));
        }
        Ok(AgentOutput::complete(StagePayload::empty_for(self.stage)))
    }
}

fn coordinator(
    fatal_stage: Option<StageName>,
    sink: Arc<dyn SnapshotSink>,
) -> (Arc<Coordinator>, Arc<Mutex<Vec<StageName>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let agents: Vec<Arc<dyn StageAgent>> = StageName::ALL
        .into_iter()
        .map(|stage| {
            Arc::new(RecordingAgent {
                stage,
                log: log.clone(),
                fatal: fatal_stage == Some(stage),
            }) as Arc<dyn StageAgent>
        })
        .collect();
    let pipeline = Pipeline::standard(agents, Some(Duration::from_secs(30))).unwrap();
    (Coordinator::new(pipeline, CoordinatorConfig::default(), sink), log)
}

async fn collect(mut events: broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut seen = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(event)) => {
                let terminal = event.is_terminal();
                seen.push(event);
                if terminal {
                    return seen;
                }
            }
            Ok(Err(_)) => return seen,
            Err(_) => panic!("timed out waiting for events"),
        }
    }
}

#[tokio::test]
async fn test_all_stages_succeed() {
    let (coordinator, log) = coordinator(None, Arc::new(NoopSink));
    let events = coordinator.bus().subscribe("acme").unwrap();
    coordinator.start_with_id("acme", "Acme Corp").await.unwrap();

    let events = collect(events).await;
    let task = coordinator.wait("acme").await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.context.len(), 8);
    assert_eq!(*log.lock().unwrap(), StageName::ALL.to_vec());

    assert_eq!(events.len(), 17);
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=17).collect::<Vec<_>>());
    assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));

    for (i, stage) in StageName::ALL.iter().enumerate() {
        let running = &events[i * 2];
        let completed = &events[i * 2 + 1];
        assert_eq!(running.stage_name, stage.as_str());
        assert_eq!(running.status, EventStatus::Running);
        assert_eq!(running.progress, stage.checkpoint());
        assert_eq!(completed.stage_name, stage.as_str());
        assert_eq!(completed.status, EventStatus::Completed);
    }

    let last = events.last().unwrap();
    assert!(last.is_pipeline_level());
    assert_eq!(last.status, EventStatus::Completed);
    assert_eq!(last.progress, 100);
    assert_eq!(last.data.as_ref().unwrap()["total_stages"], 8);
}

#[tokio::test]
async fn test_fatal_third_stage_stops_pipeline() {
    let (coordinator, log) = coordinator(Some(StageName::CompetitorDiscovery), Arc::new(NoopSink));
    let events = coordinator.bus().subscribe("acme").unwrap();
    coordinator.start_with_id("acme", "Acme Corp").await.unwrap();

    let events = collect(events).await;
    let task = coordinator.wait("acme").await.unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.context.len(), 2);
    assert_eq!(
        task.context.stages(),
        vec![StageName::Validation, StageName::SectorIdentification]
    );
    assert_eq!(log.lock().unwrap().len(), 3);
    assert!(task.stages[3..].iter().all(|s| s.status == StageStatus::Skipped));
    assert_eq!(task.stages[2].status, StageStatus::Failed);

    let error = task.error.unwrap();
    assert_eq!(error.stage, Some(StageName::CompetitorDiscovery));
    assert!(error.message.contains("no usable competitor data"));

    // running + completed twice, running + failed, pipeline failed
    assert_eq!(events.len(), 7);
    assert_eq!(events[5].status, EventStatus::Failed);
    assert_eq!(events[5].stage_name, "competitor_discovery");
    assert!(events[6].is_terminal());
    assert_eq!(events[6].data.as_ref().unwrap()["outcome"], "failed");
}

#[tokio::test]
async fn test_concurrent_tasks_run_independently() {
    let (coordinator, _) = coordinator(None, Arc::new(NoopSink));
    let mut ids = Vec::new();
    for subject in ["Acme", "Globex", "Initech", "Umbrella", "Hooli", "Soylent"] {
        ids.push(coordinator.start(subject).await.unwrap());
    }
    for id in &ids {
        let task = coordinator.wait(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }
    assert_eq!(coordinator.list().await.len(), 6);
}

#[tokio::test]
async fn test_final_snapshot_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteSnapshotStore::open_at(dir.path().join("scout.db")).unwrap());
    let (coordinator, _) = coordinator(Some(StageName::Validation), store.clone());

    let id = coordinator.start("Nonexistent Widgets").await.unwrap();
    let task = coordinator.wait(&id).await.unwrap();

    let stored = store.load(&id).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored, task);
}
