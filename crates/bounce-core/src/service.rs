//! Service facade and serialized event loop.
//!
//! [`BounceService`] composes the three managers behind the message
//! protocol and owns the error boundary: component failures become
//! `{ok: false, error}` responses, never panics. [`run_service`] drives a
//! service from one queue of messages and alarm firings, so every
//! read-modify-write of the persisted record happens on a single task.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::access::TemporaryAccessManager;
use crate::alarms::AlarmScheduler;
use crate::error::Result;
use crate::messages::{Message, Response};
use crate::reconcile::{ReconcileReport, ReconciliationController};
use crate::rules::RuleEngine;
use crate::session::FocusSessionManager;
use crate::storage::{Config, FocusSession, StateStore, Task};

/// The engine behind the message protocol.
pub struct BounceService {
    session: FocusSessionManager,
    access: TemporaryAccessManager,
    reconcile: ReconciliationController,
}

impl BounceService {
    pub fn new(
        store: Arc<dyn StateStore>,
        engine: Arc<dyn RuleEngine>,
        alarms: Arc<dyn AlarmScheduler>,
        config: &Config,
    ) -> Self {
        Self {
            session: FocusSessionManager::new(
                Arc::clone(&store),
                Arc::clone(&engine),
                config.interstitial_url.clone(),
            ),
            access: TemporaryAccessManager::new(
                Arc::clone(&store),
                Arc::clone(&engine),
                Arc::clone(&alarms),
                config.default_allow_minutes,
            ),
            reconcile: ReconciliationController::new(
                store,
                engine,
                alarms,
                config.interstitial_url.clone(),
            ),
        }
    }

    /// Start a session; a fresh session invalidates every prior override,
    /// related to the new blacklist or not.
    pub fn start_focus(&self, tasks: Vec<Task>, domains: Vec<String>) -> Result<FocusSession> {
        let session = self.session.start(tasks, domains)?;
        self.access.clear_all()?;
        Ok(session)
    }

    /// Stop the session and drop every override with it.
    pub fn stop_focus(&self) -> Result<FocusSession> {
        let session = self.session.stop()?;
        self.access.clear_all()?;
        Ok(session)
    }

    pub fn focus_state(&self) -> Result<FocusSession> {
        self.session.focus_state()
    }

    /// Grant time-boxed access; returns the absolute expiry in epoch millis.
    pub fn request_temp_access(&self, domain: &str, minutes: Option<u64>) -> Result<i64> {
        self.access.grant(domain, minutes)
    }

    pub fn revoke_temp_access(&self, domain: &str) -> Result<()> {
        self.access.revoke(domain)
    }

    pub fn sanitizer_state(&self, domain: &str) -> Result<bool> {
        self.access
            .sanitize_enabled(domain, Utc::now().timestamp_millis())
    }

    /// Route a fired alarm to its owner. Unrelated names are ignored.
    pub fn handle_alarm(&self, name: &str) -> Result<bool> {
        self.access.handle_alarm(name)
    }

    /// Revoke every allow that is already past due.
    pub fn sweep_expired(&self) -> Result<Vec<String>> {
        self.access.sweep_expired(Utc::now().timestamp_millis())
    }

    pub fn on_install(&self) -> Result<ReconcileReport> {
        self.reconcile.on_install()
    }

    pub fn on_startup(&self) -> Result<ReconcileReport> {
        self.reconcile.on_startup()
    }

    /// Dispatch a parsed message; the error boundary lives here.
    pub fn dispatch(&self, message: Message) -> Response {
        match self.try_dispatch(message) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "message handling failed");
                Response::err(e.to_string())
            }
        }
    }

    fn try_dispatch(&self, message: Message) -> Result<Response> {
        match message {
            Message::StartFocus { payload } => Ok(Response::with_session(
                self.start_focus(payload.selected_tasks, payload.blacklist_domains)?,
            )),
            Message::StopFocus => Ok(Response::with_session(self.stop_focus()?)),
            Message::GetFocusState => Ok(Response::with_session(self.focus_state()?)),
            Message::RequestTempAccess { payload } => {
                self.request_temp_access(&payload.domain, payload.minutes)?;
                Ok(Response::ok())
            }
            Message::GetSanitizerState { payload } => Ok(Response::with_sanitizer(
                self.sanitizer_state(&payload.domain)?,
            )),
        }
    }

    /// Dispatch a raw JSON message. Unknown `type` values and malformed
    /// payloads come back as `{ok: false, error}` with no state change.
    pub fn dispatch_value(&self, value: &serde_json::Value) -> Response {
        match Message::parse(value) {
            Ok(message) => self.dispatch(message),
            Err(error) => Response::err(error),
        }
    }
}

/// A message paired with its reply slot.
pub struct ServiceCommand {
    pub message: Message,
    pub reply: oneshot::Sender<Response>,
}

/// Cheap-to-clone sender side of the service loop.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<ServiceCommand>,
}

impl ServiceHandle {
    /// Send a message and await its response.
    pub async fn send(&self, message: Message) -> Response {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(ServiceCommand { message, reply })
            .await
            .is_err()
        {
            return Response::err("Service loop has shut down");
        }
        reply_rx
            .await
            .unwrap_or_else(|_| Response::err("Service loop dropped the request"))
    }
}

/// Build the handle/receiver pair for [`run_service`].
pub fn service_channel() -> (ServiceHandle, mpsc::Receiver<ServiceCommand>) {
    let (tx, rx) = mpsc::channel(32);
    (ServiceHandle { tx }, rx)
}

/// Drive a service from its command queue and alarm firings until both
/// channels close. One consumer task means one writer: overlapping
/// operations cannot interleave their read-modify-write cycles.
pub async fn run_service(
    service: BounceService,
    mut commands: mpsc::Receiver<ServiceCommand>,
    mut alarms_fired: mpsc::UnboundedReceiver<String>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ServiceCommand { message, reply }) => {
                    let response = service.dispatch(message);
                    // A caller that gave up on the reply is not an error.
                    let _ = reply.send(response);
                }
                None => break,
            },
            fired = alarms_fired.recv() => match fired {
                Some(name) => {
                    if let Err(e) = service.handle_alarm(&name) {
                        warn!(alarm = %name, error = %e, "alarm handling failed");
                    }
                }
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    use crate::alarms::{ManualAlarmScheduler, TokioAlarmScheduler};
    use crate::rules::MemoryRuleEngine;
    use crate::storage::MemoryStore;

    fn service_with(
        alarms: Arc<dyn AlarmScheduler>,
    ) -> (Arc<MemoryStore>, Arc<MemoryRuleEngine>, BounceService) {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(MemoryRuleEngine::new());
        let service = BounceService::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&engine) as Arc<dyn RuleEngine>,
            alarms,
            &Config::default(),
        );
        (store, engine, service)
    }

    #[test]
    fn start_focus_clears_unrelated_overrides() {
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let (store, _, service) = service_with(alarms.clone());

        // An override from before the session, for a domain the new
        // blacklist never mentions.
        service.request_temp_access("reddit.com", Some(30)).unwrap();

        service
            .start_focus(Vec::new(), vec!["youtube.com".into()])
            .unwrap();

        let state = store.read().unwrap();
        assert!(state.temporary_allows.is_empty());
        assert!(alarms.is_empty());
        assert!(state.focus_session.active);
    }

    #[test]
    fn stop_focus_clears_rules_records_and_decision_cache() {
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let (store, engine, service) = service_with(alarms);

        service
            .start_focus(Vec::new(), vec!["youtube.com".into(), "tiktok.com".into()])
            .unwrap();
        service.request_temp_access("youtube.com", None).unwrap();

        let stopped = service.stop_focus().unwrap();
        assert!(!stopped.active);
        assert!(engine.is_empty());
        let state = store.read().unwrap();
        assert!(state.temporary_allows.is_empty());
        assert!(state.last_decision.is_none());
    }

    #[test]
    fn dispatch_maps_failures_to_error_responses() {
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let (_, _, service) = service_with(alarms);

        // Empty domain is rejected by the access manager.
        let response = service.dispatch_value(&json!({
            "type": "REQUEST_TEMP_ACCESS",
            "payload": {"domain": "   "}
        }));
        assert!(!response.ok);
        assert!(response.error.is_some());
    }

    #[test]
    fn dispatch_rejects_unknown_message_types() {
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let (store, _, service) = service_with(alarms);
        let before = store.read().unwrap();

        let response = service.dispatch_value(&json!({"type": "FROBNICATE"}));
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("Unknown message type"));
        assert_eq!(store.read().unwrap(), before);
    }

    #[test]
    fn protocol_round_trip_over_json() {
        let alarms = Arc::new(ManualAlarmScheduler::new());
        let (_, _, service) = service_with(alarms);

        let response = service.dispatch_value(&json!({
            "type": "START_FOCUS",
            "payload": {"selectedTasks": [], "blacklistDomains": ["youtube.com"]}
        }));
        assert!(response.ok);
        let session = response.focus_session.expect("session in response");
        assert!(session.active);

        let response = service.dispatch_value(&json!({
            "type": "GET_SANITIZER_STATE",
            "payload": {"domain": "www.youtube.com"}
        }));
        assert_eq!(response.sanitize_enabled, Some(false));

        service.request_temp_access("youtube.com", Some(5)).unwrap();
        let response = service.dispatch_value(&json!({
            "type": "GET_SANITIZER_STATE",
            "payload": {"domain": "www.youtube.com"}
        }));
        assert_eq!(response.sanitize_enabled, Some(true));
    }

    #[tokio::test]
    async fn service_loop_revokes_on_expiry() {
        let (alarms, fired_rx) = TokioAlarmScheduler::new();
        let alarms = Arc::new(alarms);
        let (store, engine, service) =
            service_with(Arc::clone(&alarms) as Arc<dyn AlarmScheduler>);
        let store_probe = Arc::clone(&store);
        let engine_probe = Arc::clone(&engine);

        let (handle, command_rx) = service_channel();
        let loop_task = tokio::spawn(run_service(service, command_rx, fired_rx));

        let response = handle
            .send(Message::StartFocus {
                payload: crate::messages::StartFocusPayload {
                    selected_tasks: Vec::new(),
                    blacklist_domains: vec!["youtube.com".into()],
                },
            })
            .await;
        assert!(response.ok);

        // Grant with an expiry that is already due; the alarm fires at once
        // and the loop revokes.
        let response = handle
            .send(Message::RequestTempAccess {
                payload: crate::messages::TempAccessPayload {
                    domain: "youtube.com".into(),
                    minutes: Some(0),
                },
            })
            .await;
        assert!(response.ok);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let state = store_probe.read().unwrap();
            if state.temporary_allows.is_empty() {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "expiry never revoked the allow"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Only the allow rule went away; the block rule is still live.
        assert_eq!(engine_probe.len(), 1);

        drop(handle);
        alarms.clear_all();
        loop_task.abort();
    }
}
