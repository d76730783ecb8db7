//! Session lifecycle: allocate, run on a background task, route state
//! reports, cancel, and clean up when the run ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use easel_core::canvas::StateSnapshot;
use easel_core::errors::GatewayError;
use easel_core::events::{CanvasEvent, EventSink};
use easel_core::ids::SessionId;
use easel_core::messages::ConversationTurn;
use easel_core::phase::RunPhase;
use easel_core::provider::LlmProvider;
use easel_core::security::ProviderConfig;
use easel_engine::error::EngineError;
use easel_engine::{
    create_canvas_registry, AgentConfig, AgentRunner, GetCanvasStateTool, PhaseHandle, SessionRegistry,
};
use easel_settings::EaselSettings;

/// Builds a chat-model client from resolved credentials and a model id.
pub type ProviderFactory =
    Arc<dyn Fn(&ProviderConfig, &str) -> Result<Arc<dyn LlmProvider>, GatewayError> + Send + Sync>;

/// Everything needed to start one agent run.
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    /// Caller-chosen id; a fresh one is allocated when absent.
    pub session_id: Option<SessionId>,
    pub prompt: String,
    /// Falls back to the provider entry's default model when empty.
    pub model_id: String,
    /// Id of a configured provider entry, or a bare provider kind.
    pub provider_ref: String,
    pub history: Vec<ConversationTurn>,
    pub initial_state: Option<StateSnapshot>,
}

pub trait AgentOrchestrator: Send + Sync {
    /// Register the session and launch its run. Returns as soon as the id
    /// is allocated; the run reports through the event sink.
    fn start_session(&self, request: StartRequest) -> Result<SessionId, EngineError>;
    /// Hand a UI snapshot to the session's mailbox.
    fn report_state(&self, session_id: &SessionId, snapshot: StateSnapshot) -> bool;
    fn cancel(&self, session_id: &SessionId) -> bool;
    fn phase(&self, session_id: &SessionId) -> Option<RunPhase>;
    fn active_count(&self) -> usize;
    fn cancel_all(&self) -> usize;
}

/// Wait until no run is active, for at most `limit`. Returns `false` if runs
/// were still going when the limit passed.
pub async fn wait_for_idle(orchestrator: &dyn AgentOrchestrator, limit: Duration) -> bool {
    let drained = async {
        while orchestrator.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(limit, drained).await.is_ok()
}

struct ActiveRun {
    cancel: CancellationToken,
    phase: PhaseHandle,
    _started_at: Instant,
}

pub struct EngineOrchestrator {
    settings: Arc<EaselSettings>,
    sessions: Arc<SessionRegistry>,
    sink: Arc<dyn EventSink>,
    factory: ProviderFactory,
    active_runs: Arc<DashMap<SessionId, ActiveRun>>,
}

impl EngineOrchestrator {
    pub fn new(settings: Arc<EaselSettings>, sessions: Arc<SessionRegistry>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            settings,
            sessions,
            sink,
            factory: Arc::new(easel_llm::create_provider),
            active_runs: Arc::new(DashMap::new()),
        }
    }

    /// Swap how chat-model clients are built.
    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Credentials and model for a start request. An unknown reference is
    /// treated as a provider kind with no key, so the factory reports it.
    fn resolve_provider(&self, provider_ref: &str, model_id: &str) -> (ProviderConfig, String) {
        match self.settings.provider(provider_ref) {
            Some(entry) => {
                let model = if model_id.trim().is_empty() {
                    entry.default_model.clone().unwrap_or_default()
                } else {
                    model_id.to_string()
                };
                (entry.to_provider_config(), model)
            }
            None => (
                ProviderConfig { kind: provider_ref.to_string(), api_key: None, base_url: None },
                model_id.to_string(),
            ),
        }
    }
}

impl AgentOrchestrator for EngineOrchestrator {
    fn start_session(&self, request: StartRequest) -> Result<SessionId, EngineError> {
        let session_id = request.session_id.clone().unwrap_or_default();
        let cancel = CancellationToken::new();
        let phase = PhaseHandle::new();

        // Check and claim under the entry's shard lock so two starts for the
        // same id cannot both register.
        let mailbox = match self.active_runs.entry(session_id.clone()) {
            Entry::Occupied(_) => {
                return Err(EngineError::Internal(format!("session {session_id} already has an active run")));
            }
            Entry::Vacant(slot) => {
                let mailbox = self.sessions.register(session_id.clone());
                slot.insert(ActiveRun { cancel: cancel.clone(), phase: phase.clone(), _started_at: Instant::now() });
                mailbox
            }
        };
        self.sink.emit(&session_id, CanvasEvent::Session { session_id: session_id.clone() });

        let agent = &self.settings.agent;
        let state_timeout = Duration::from_millis(agent.state_timeout_ms);
        let max_iterations = agent.max_iterations;
        let tool_timeout = Duration::from_secs(agent.tool_timeout_secs);
        let max_tokens = agent.max_tokens;
        let (provider_config, model) = self.resolve_provider(&request.provider_ref, &request.model_id);

        let factory = Arc::clone(&self.factory);
        let sink = Arc::clone(&self.sink);
        let sessions = Arc::clone(&self.sessions);
        let active_runs = Arc::clone(&self.active_runs);
        let id = session_id.clone();
        let span = tracing::info_span!("session", session_id = %session_id);

        info!(session_id = %session_id, provider = %request.provider_ref, model = %model, "starting session");

        tokio::spawn(
            async move {
                match factory(&provider_config, &model) {
                    Err(e) => {
                        warn!(error = %e, kind = e.error_kind(), retryable = e.is_retryable(), "could not build provider");
                        sink.emit(&id, CanvasEvent::Error { message: e.to_string() });
                        phase.set(RunPhase::Error);
                    }
                    Ok(provider) => {
                        let mut get_state = GetCanvasStateTool::new(mailbox, state_timeout).with_phase(phase.clone());
                        if let Some(snapshot) = request.initial_state.clone() {
                            get_state = get_state.with_cache(snapshot);
                        }
                        let tools = Arc::new(create_canvas_registry(get_state));
                        let config = AgentConfig::new(provider, tools)
                            .with_max_iterations(max_iterations)
                            .with_tool_timeout(tool_timeout)
                            .with_max_tokens(Some(max_tokens));
                        let runner = AgentRunner::new(id.clone(), config).with_phase(phase);

                        // Outcome already reported through the sink.
                        let _ = runner
                            .run(
                                &request.prompt,
                                &request.history,
                                request.initial_state.as_ref(),
                                Arc::clone(&sink),
                                &cancel,
                            )
                            .await;
                    }
                }

                // Unregister while the id is still claimed; a new start for
                // the same id must not have its mailbox removed.
                sessions.unregister(&id);
                active_runs.remove(&id);
            }
            .instrument(span),
        );

        Ok(session_id)
    }

    fn report_state(&self, session_id: &SessionId, snapshot: StateSnapshot) -> bool {
        self.sessions.deliver(session_id, snapshot)
    }

    fn cancel(&self, session_id: &SessionId) -> bool {
        match self.active_runs.get(session_id) {
            Some(run) => {
                info!(session_id = %session_id, "cancelling run");
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn phase(&self, session_id: &SessionId) -> Option<RunPhase> {
        self.active_runs.get(session_id).map(|run| run.phase.current())
    }

    fn active_count(&self) -> usize {
        self.active_runs.len()
    }

    fn cancel_all(&self) -> usize {
        let mut count = 0;
        for entry in self.active_runs.iter() {
            entry.cancel.cancel();
            count += 1;
        }
        count
    }
}
