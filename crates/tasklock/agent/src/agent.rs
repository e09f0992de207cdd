//! Agent event loop.
//!
//! Everything that decides or enforces runs on the single task driving
//! [`Agent::run`]. Deferred continuations are timers that post back into the
//! same channel, so they are handled in order with everything else.

use std::sync::Arc;
use std::time::Duration;

use tasklock_core::{ScreenAction, classify};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::Config;
use crate::enforcer::{Continuation, EnforcementController, Scheduled, VerifyOutcome};
use crate::host::Host;
use crate::observer::{ForegroundObserver, Observation};
use crate::store::RestrictionStore;

/// Capacity of the agent's event channel.
pub const EVENT_BUFFER: usize = 256;

/// Input to the agent loop.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The host reported a focus or window change.
    WindowChanged { application_id: String },
    /// Periodic full window scan.
    Tick,
    /// A scheduled continuation is due.
    Continuation(Continuation),
    /// The user chose an action on the blocking screen.
    Action(ScreenAction),
    /// Stop monitoring.
    Shutdown,
}

/// The running agent.
pub struct Agent<H: ?Sized> {
    store: Arc<RestrictionStore>,
    observer: ForegroundObserver<H>,
    controller: EnforcementController<H>,
    own_application_id: String,
    scan_interval: Duration,
    events: mpsc::Sender<AgentEvent>,
    timers: JoinSet<()>,
}

impl<H: Host + ?Sized> Agent<H> {
    /// Create an agent. `events` must feed the receiver later passed to
    /// [`Agent::run`].
    pub fn new(
        host: Arc<H>,
        store: Arc<RestrictionStore>,
        config: &Config,
        events: mpsc::Sender<AgentEvent>,
    ) -> Self {
        Self {
            store,
            observer: ForegroundObserver::new(Arc::clone(&host), config.application_id.clone()),
            controller: EnforcementController::new(host, config.timing.clone()),
            own_application_id: config.application_id.clone(),
            scan_interval: config.timing.scan_interval(),
            events,
            timers: JoinSet::new(),
        }
    }

    /// Process events until `Shutdown` or until every sender is gone.
    ///
    /// Pending continuations are dropped on exit.
    pub async fn run(mut self, mut events: mpsc::Receiver<AgentEvent>) {
        let mut scan = tokio::time::interval(self.scan_interval);
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(application_id = %self.own_application_id, "agent running");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(AgentEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event),
                },
                _ = scan.tick() => self.handle(AgentEvent::Tick),
                Some(_) = self.timers.join_next(), if !self.timers.is_empty() => {}
            }
        }

        let pending = self.timers.len();
        self.timers.abort_all();
        tracing::info!(pending, "agent stopped");
    }

    /// Handle one event.
    pub fn handle(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::WindowChanged { application_id } => {
                let observations = self.observer.on_window_changed(&application_id);
                self.decide(observations);
            }
            AgentEvent::Tick => {
                let observations = self.observer.on_tick();
                self.decide(observations);
            }
            AgentEvent::Continuation(continuation) => match self.controller.fire(continuation) {
                Some(VerifyOutcome::Retried(report)) => {
                    tracing::info!(failed = ?report.failed, "re-check issued one more round");
                }
                Some(outcome) => tracing::debug!(outcome = ?outcome, "re-check done"),
                None => {}
            },
            AgentEvent::Action(action) => self.controller.handle_action(action),
            AgentEvent::Shutdown => {}
        }
    }

    fn decide(&mut self, observations: Vec<Observation>) {
        let state = self.store.current();
        if !state.active {
            return;
        }

        for observation in observations {
            let decision = classify(&state, &self.own_application_id, &observation.application_id);
            let scheduled = self
                .controller
                .enforce(&decision, &state.pending_tasks, Instant::now());
            for s in scheduled {
                self.schedule(s);
            }
        }
    }

    fn schedule(&mut self, scheduled: Scheduled) {
        let events = self.events.clone();
        self.timers.spawn(async move {
            tokio::time::sleep(scheduled.delay).await;
            if events
                .send(AgentEvent::Continuation(scheduled.continuation))
                .await
                .is_err()
            {
                tracing::debug!("agent gone, dropping continuation");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingConfig;
    use crate::storage::MemoryStore;
    use crate::testing::{Call, FakeHost};
    use tasklock_core::{RestrictionState, TaskSummary};

    fn config() -> Config {
        Config {
            application_id: "dev.tasklock.app".into(),
            timing: TimingConfig {
                scan_interval_ms: 60_000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn store(active: bool) -> Arc<RestrictionStore> {
        let store = Arc::new(RestrictionStore::activate(Box::new(MemoryStore::default())));
        store
            .replace(RestrictionState::new(
                ["com.a.b".to_string()],
                Vec::new(),
                active,
                vec![TaskSummary::new("1", "Read", "", true)],
                Vec::new(),
                Vec::new(),
            ))
            .unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_presents_and_rechecks() {
        let host = Arc::new(FakeHost::new());
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = Agent::new(host.clone(), store(true), &config(), tx.clone());
        let running = tokio::spawn(agent.run(rx));

        host.set_windows(&["com.a.b"]);
        tx.send(AgentEvent::WindowChanged {
            application_id: "com.a.b".into(),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        tx.send(AgentEvent::Shutdown).await.unwrap();
        running.await.unwrap();

        // Scan and notification name the same app: one round, plus one retry.
        assert_eq!(host.count(&Call::Home), 2);
        assert_eq!(host.count(&Call::Back), 3);
        assert_eq!(host.count(&Call::ShowFallback("com.a.b".into())), 1);
        assert_eq!(host.screens()[0].task_cards().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pending_timers() {
        let host = Arc::new(FakeHost::new());
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = Agent::new(host.clone(), store(true), &config(), tx.clone());
        let running = tokio::spawn(agent.run(rx));

        tx.send(AgentEvent::WindowChanged {
            application_id: "com.a.b".into(),
        })
        .await
        .unwrap();
        tx.send(AgentEvent::Shutdown).await.unwrap();
        running.await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(host.count(&Call::Home), 1);
        assert!(host.screens().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_state_blocks_nothing() {
        let host = Arc::new(FakeHost::new());
        host.set_windows(&["com.a.b"]);
        let (tx, _rx) = mpsc::channel(EVENT_BUFFER);
        let mut agent = Agent::new(host.clone(), store(false), &config(), tx);

        agent.handle(AgentEvent::WindowChanged {
            application_id: "com.a.b".into(),
        });
        agent.handle(AgentEvent::Tick);

        assert!(host.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_application_never_blocked() {
        let host = Arc::new(FakeHost::new());
        let (tx, _rx) = mpsc::channel(EVENT_BUFFER);
        let store = store(true);
        store
            .replace(RestrictionState::new(
                ["dev.tasklock.app".to_string()],
                Vec::new(),
                true,
                Vec::new(),
                ["dev.tasklock.app".to_string()],
                Vec::new(),
            ))
            .unwrap();
        let mut agent = Agent::new(host.clone(), store, &config(), tx);

        agent.handle(AgentEvent::WindowChanged {
            application_id: "dev.tasklock.app".into(),
        });

        assert!(host.calls().is_empty());
    }
}
