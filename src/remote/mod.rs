//! Remote rendering connection state machine.
//!
//! [`RemoteState`] is a pure transition core: it consumes backend notifications and the current
//! time and hands back the commands to issue. [`RemoteRendering`] binds it to a
//! [`RemoteRenderingBackend`] and plugs into the frame loop as a [`RemoteCompositor`].

pub mod backend;

pub use backend::{RemoteError, RemoteJournal, RemoteRenderingBackend, ScriptedRemoteBackend};

use crate::config::{RemoteConfig, VmSize};
use crate::render::{RemoteCompositor, RenderError, RenderResult};
use crate::vr::{DeviceContextHandle, NearFar, Pose, SpaceId};
use glam::Vec3;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Where a successfully loaded model is placed, relative to the app space origin.
pub const MODEL_ROOT_POSITION: Vec3 = Vec3::new(0.0, 0.0, -2.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    CreatingSession,
    StartingSession,
    Connecting,
    Connected,
    ConnectionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub u64);

/// Credentials and service endpoints a session is created or opened with.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub account_id: String,
    pub account_key: String,
    pub remote_rendering_domain: String,
    pub account_domain: String,
}

impl RemoteAccount {
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            account_id: config.account_id.clone(),
            account_key: config.account_key.clone(),
            remote_rendering_domain: config.remote_rendering_domain.clone(),
            account_domain: config.account_domain.clone(),
        }
    }
}

// Commands are debug-logged on submission; keep the key out of the log.
impl fmt::Debug for RemoteAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAccount")
            .field("account_id", &self.account_id)
            .field("account_key", &"<redacted>")
            .field("remote_rendering_domain", &self.remote_rendering_domain)
            .field("account_domain", &self.account_domain)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    OpenSession {
        account: RemoteAccount,
        session_id: String,
    },
    CreateSession {
        account: RemoteAccount,
        lease_minutes: u32,
        vm_size: VmSize,
    },
    QueryProperties { session_id: String },
    Connect,
    LoadModel { uri: String },
    PlaceModelRoot { position: Vec3 },
}

impl RemoteCommand {
    fn expects_completion(&self) -> bool {
        !matches!(self, RemoteCommand::PlaceModelRoot { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Starting,
    Ready,
    Error,
    Stopped,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Carries the session id on success.
    SessionCreated(Result<String, String>),
    Properties {
        result: Result<SessionStatus, String>,
        retry_delay: Duration,
    },
    ModelLoaded(Result<(), String>),
    Ack,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Completed {
        id: OperationId,
        completion: Completion,
    },
    ConnectionStatus {
        status: LinkStatus,
        error: Option<String>,
    },
    ModelProgress {
        id: OperationId,
        fraction: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    pub id: OperationId,
    pub command: RemoteCommand,
    pub issued_at: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCommand {
    pub id: OperationId,
    pub command: RemoteCommand,
}

/// Camera planes pushed to the service while connected. The service always wants `near < far`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub near: f32,
    pub far: f32,
    pub inverse_depth: bool,
    pub depth_enabled: bool,
}

impl CameraSettings {
    pub fn from_depth_range(range: NearFar) -> Self {
        Self {
            near: range.near.min(range.far),
            far: range.near.max(range.far),
            inverse_depth: range.is_reversed(),
            depth_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteState {
    config: RemoteConfig,
    status: ConnectionStatus,
    message: String,
    session_id: Option<String>,
    session_started: bool,
    is_connected: bool,
    properties_in_flight: bool,
    last_poll: Duration,
    poll_delay: Duration,
    session_starting_time: Duration,
    model_load_triggered: bool,
    model_load_finished: bool,
    model_progress: f32,
    model_error: Option<String>,
    next_operation: u64,
    pending: BTreeMap<OperationId, PendingOperation>,
}

impl RemoteState {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            poll_delay: config.status_poll_delay(),
            config: config.clone(),
            status: ConnectionStatus::Disconnected,
            message: String::new(),
            session_id: None,
            session_started: false,
            is_connected: false,
            properties_in_flight: false,
            last_poll: Duration::ZERO,
            session_starting_time: Duration::ZERO,
            model_load_triggered: false,
            model_load_finished: false,
            model_progress: 0.0,
            model_error: None,
            next_operation: 1,
            pending: BTreeMap::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn poll_delay(&self) -> Duration {
        self.poll_delay
    }

    pub fn model_progress(&self) -> f32 {
        self.model_progress
    }

    pub fn model_loaded(&self) -> bool {
        self.model_load_finished && self.model_error.is_none()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingOperation> {
        self.pending.values()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Opens the configured session or creates a fresh one.
    pub fn start(&mut self, now: Duration) -> Vec<IssuedCommand> {
        let account = RemoteAccount::from_config(&self.config);
        log::info!(
            "[remote] account {} on {}",
            account.account_id,
            account.remote_rendering_domain
        );
        let command = match &self.config.session_id {
            Some(session_id) if !session_id.is_empty() => RemoteCommand::OpenSession {
                account,
                session_id: session_id.clone(),
            },
            _ => RemoteCommand::CreateSession {
                account,
                lease_minutes: self.config.lease_minutes,
                vm_size: self.config.vm_size,
            },
        };
        self.set_status(ConnectionStatus::CreatingSession, "");
        vec![self.issue(command, now)]
    }

    /// Issues the periodic property query and the one-shot model load when due.
    pub fn poll(&mut self, now: Duration) -> Vec<IssuedCommand> {
        let mut issued = Vec::new();
        let Some(session_id) = self.session_id.clone() else {
            return issued;
        };

        if !self.session_started
            && !self.properties_in_flight
            && now.saturating_sub(self.last_poll) > self.poll_delay
        {
            self.last_poll = now;
            self.properties_in_flight = true;
            issued.push(self.issue(RemoteCommand::QueryProperties { session_id }, now));
        }

        if self.is_connected && !self.model_load_triggered {
            self.model_load_triggered = true;
            self.model_progress = 0.0;
            let uri = self.config.model_uri.clone();
            log::info!("[remote] loading model {uri}");
            issued.push(self.issue(RemoteCommand::LoadModel { uri }, now));
        }

        issued
    }

    pub fn apply(&mut self, notification: Notification, now: Duration) -> Vec<IssuedCommand> {
        match notification {
            Notification::Completed { id, completion } => {
                let Some(operation) = self.pending.remove(&id) else {
                    log::debug!("[remote] dropping completion for unknown operation {id:?}");
                    return Vec::new();
                };
                self.complete(operation, completion, now)
            }
            Notification::ModelProgress { id, fraction } => {
                if self.pending.contains_key(&id) {
                    self.model_progress = fraction.clamp(0.0, 1.0);
                } else {
                    log::debug!("[remote] dropping progress for unknown operation {id:?}");
                }
                Vec::new()
            }
            Notification::ConnectionStatus { status, error } => {
                self.connection_changed(status, error);
                Vec::new()
            }
        }
    }

    /// The overlay text, or `None` once the model is on screen.
    pub fn status_lines(&self, now: Duration) -> Option<Vec<String>> {
        if self.model_loaded() {
            return None;
        }

        let mut lines = Vec::new();
        match self.status {
            ConnectionStatus::CreatingSession => lines.push("Creating session...".to_string()),
            ConnectionStatus::StartingSession => {
                let elapsed = now.saturating_sub(self.session_starting_time).as_secs();
                lines.push("Starting session...".to_string());
                lines.push(format!(
                    "...this may take a while. Elapsed time: {elapsed}s"
                ));
            }
            ConnectionStatus::Connecting => lines.push("Connecting...".to_string()),
            ConnectionStatus::Connected => lines.push("Connected".to_string()),
            ConnectionStatus::ConnectionFailed => {
                lines.push("Failed to connect".to_string());
                lines.push(format!("Error: {}", self.message));
            }
            ConnectionStatus::Disconnected => lines.push("Disconnected".to_string()),
        }

        if self.model_load_triggered {
            match (&self.model_error, self.model_load_finished) {
                (Some(error), true) => lines.push(format!("Failed to load model: {error}")),
                _ => lines.push(format!(
                    "Loading model ({}%)",
                    (self.model_progress * 100.0) as i32
                )),
            }
        }
        Some(lines)
    }

    pub fn camera_settings(&self, range: NearFar) -> Option<CameraSettings> {
        self.is_connected
            .then(|| CameraSettings::from_depth_range(range))
    }

    fn issue(&mut self, command: RemoteCommand, now: Duration) -> IssuedCommand {
        let id = OperationId(self.next_operation);
        self.next_operation += 1;
        if command.expects_completion() {
            self.pending.insert(
                id,
                PendingOperation {
                    id,
                    command: command.clone(),
                    issued_at: now,
                },
            );
        }
        IssuedCommand { id, command }
    }

    fn set_status(&mut self, status: ConnectionStatus, message: &str) {
        if status != self.status {
            log::info!("[remote] {:?} -> {status:?}", self.status);
        }
        self.status = status;
        self.message = message.to_string();
    }

    fn complete(
        &mut self,
        operation: PendingOperation,
        completion: Completion,
        now: Duration,
    ) -> Vec<IssuedCommand> {
        match completion {
            Completion::SessionCreated(Ok(session_id)) => {
                log::info!("[remote] session {session_id} created");
                self.session_id = Some(session_id);
                self.session_starting_time = now;
                self.last_poll = now;
                self.set_status(ConnectionStatus::StartingSession, "");
                Vec::new()
            }
            Completion::SessionCreated(Err(error)) => {
                self.set_status(ConnectionStatus::ConnectionFailed, &error);
                Vec::new()
            }
            Completion::Properties {
                result,
                retry_delay,
            } => {
                self.poll_delay = retry_delay;
                self.properties_in_flight = false;
                match result {
                    Ok(SessionStatus::Ready) => {
                        self.session_started = true;
                        self.set_status(ConnectionStatus::Connecting, "");
                        vec![self.issue(RemoteCommand::Connect, now)]
                    }
                    Ok(SessionStatus::Starting) => Vec::new(),
                    Ok(SessionStatus::Error) => {
                        self.set_status(ConnectionStatus::ConnectionFailed, "Session error");
                        Vec::new()
                    }
                    Ok(SessionStatus::Stopped) => {
                        self.set_status(ConnectionStatus::ConnectionFailed, "Session stopped");
                        Vec::new()
                    }
                    Ok(SessionStatus::Expired) => {
                        self.set_status(ConnectionStatus::ConnectionFailed, "Session expired");
                        Vec::new()
                    }
                    Err(error) => {
                        self.set_status(ConnectionStatus::ConnectionFailed, &error);
                        Vec::new()
                    }
                }
            }
            Completion::ModelLoaded(result) => {
                self.model_load_finished = true;
                match result {
                    Ok(()) => {
                        self.model_error = None;
                        self.model_progress = 1.0;
                        log::info!("[remote] model loaded");
                        vec![self.issue(
                            RemoteCommand::PlaceModelRoot {
                                position: MODEL_ROOT_POSITION,
                            },
                            now,
                        )]
                    }
                    Err(error) => {
                        log::warn!("[remote] model load failed: {error}");
                        self.model_error = Some(error);
                        Vec::new()
                    }
                }
            }
            Completion::Ack => {
                log::debug!("[remote] {:?} acknowledged", operation.command);
                Vec::new()
            }
        }
    }

    fn connection_changed(&mut self, status: LinkStatus, error: Option<String>) {
        let message = error.clone().unwrap_or_default();
        match status {
            LinkStatus::Connecting => self.set_status(ConnectionStatus::Connecting, &message),
            LinkStatus::Connected => {
                let next = if error.is_none() {
                    ConnectionStatus::Connected
                } else {
                    ConnectionStatus::ConnectionFailed
                };
                self.set_status(next, &message);
                self.reset_model_load();
                self.is_connected = error.is_none();
            }
            LinkStatus::Disconnected => {
                let next = if error.is_none() {
                    ConnectionStatus::Disconnected
                } else {
                    ConnectionStatus::ConnectionFailed
                };
                self.set_status(next, &message);
                self.reset_model_load();
                self.is_connected = false;
            }
        }
    }

    fn reset_model_load(&mut self) {
        self.model_load_triggered = false;
        self.model_load_finished = false;
        self.model_error = None;
    }
}

/// A [`RemoteState`] driving a concrete backend, owned by the program for the app's lifetime.
pub struct RemoteRendering {
    state: RemoteState,
    backend: Box<dyn RemoteRenderingBackend>,
    published_app_space: Option<SpaceId>,
    status_lines: Option<Vec<String>>,
}

impl RemoteRendering {
    pub fn start(config: &RemoteConfig, backend: Box<dyn RemoteRenderingBackend>, now: Duration) -> Self {
        log::info!("[remote] starting with {}", backend.label());
        let mut remote = Self {
            state: RemoteState::new(config),
            backend,
            published_app_space: None,
            status_lines: None,
        };
        let issued = remote.state.start(now);
        remote.submit(issued);
        remote.status_lines = remote.state.status_lines(now);
        remote
    }

    pub fn state(&self) -> &RemoteState {
        &self.state
    }

    pub fn status_lines(&self) -> Option<&[String]> {
        self.status_lines.as_deref()
    }

    /// Runs once per frame while the XR session is running.
    pub fn update(&mut self, now: Duration, app_space: SpaceId, depth_range: NearFar) {
        self.backend.tick();
        for notification in self.backend.drain_notifications() {
            let issued = self.state.apply(notification, now);
            self.submit(issued);
        }
        let issued = self.state.poll(now);
        self.submit(issued);

        if self.state.session_id().is_some() && self.published_app_space != Some(app_space) {
            self.backend.update_app_space(app_space);
            self.published_app_space = Some(app_space);
        }

        if let Some(settings) = self.state.camera_settings(depth_range) {
            self.backend.apply_camera_settings(settings);
        }

        self.status_lines = self.state.status_lines(now);
    }

    pub fn position_status_overlay(&mut self, pose: Pose) {
        self.backend.position_status_overlay(pose);
    }

    fn submit(&mut self, issued: Vec<IssuedCommand>) {
        for IssuedCommand { id, command } in issued {
            log::debug!("[remote] submit {id:?} {command:?}");
            self.backend.submit(id, command);
        }
    }
}

impl RemoteCompositor for RemoteRendering {
    fn composite(&mut self, context: DeviceContextHandle) -> RenderResult<()> {
        if self.state.is_connected() {
            self.backend
                .blit_remote_frame(context)
                .map_err(|err| RenderError::Compositor(err.to_string()))?;
        }
        if let Some(lines) = &self.status_lines {
            self.backend
                .draw_status(context, lines)
                .map_err(|err| RenderError::Compositor(err.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RemoteRendering {
    fn drop(&mut self) {
        // In-flight completions are not awaited; late ones are dropped by the backend.
        let abandoned = self.state.pending_count();
        if abandoned > 0 {
            log::warn!("[remote] shutting down with {abandoned} operations in flight");
        }
        if self.state.session_id().is_some() {
            self.backend.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn config() -> RemoteConfig {
        RemoteConfig::default()
    }

    fn only(issued: Vec<IssuedCommand>) -> IssuedCommand {
        assert_eq!(issued.len(), 1, "expected one command, got {issued:?}");
        issued.into_iter().next().expect("one command")
    }

    fn created(state: &mut RemoteState, now: Duration) {
        let start = only(state.start(Duration::ZERO));
        state.apply(
            Notification::Completed {
                id: start.id,
                completion: Completion::SessionCreated(Ok("s-1".to_string())),
            },
            now,
        );
    }

    fn properties(id: OperationId, status: SessionStatus, retry: Duration) -> Notification {
        Notification::Completed {
            id,
            completion: Completion::Properties {
                result: Ok(status),
                retry_delay: retry,
            },
        }
    }

    #[test]
    fn start_creates_or_opens_a_session() {
        let mut state = RemoteState::new(&config());
        let issued = only(state.start(Duration::ZERO));
        assert_eq!(
            issued.command,
            RemoteCommand::CreateSession {
                account: RemoteAccount::from_config(&config()),
                lease_minutes: 10,
                vm_size: VmSize::Standard
            }
        );
        assert_eq!(state.status(), ConnectionStatus::CreatingSession);
        assert_eq!(state.pending_count(), 1);

        let reuse = RemoteConfig {
            session_id: Some("existing".to_string()),
            ..config()
        };
        let mut state = RemoteState::new(&reuse);
        assert_eq!(
            only(state.start(Duration::ZERO)).command,
            RemoteCommand::OpenSession {
                account: RemoteAccount::from_config(&reuse),
                session_id: "existing".to_string()
            }
        );
    }

    #[test]
    fn account_key_stays_out_of_debug_output() {
        let account = RemoteAccount::from_config(&RemoteConfig {
            account_id: "acct".to_string(),
            account_key: "hunter2".to_string(),
            ..config()
        });
        let rendered = format!("{account:?}");
        assert!(rendered.contains("acct"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn polls_are_throttled_by_the_delay() {
        let mut state = RemoteState::new(&config());
        created(&mut state, 5 * SECOND);
        assert_eq!(state.status(), ConnectionStatus::StartingSession);

        assert!(state.poll(10 * SECOND).is_empty());
        assert!(state.poll(15 * SECOND).is_empty());
        let query = only(state.poll(15 * SECOND + Duration::from_millis(1)));
        assert_eq!(
            query.command,
            RemoteCommand::QueryProperties {
                session_id: "s-1".to_string()
            }
        );
        assert!(state.poll(60 * SECOND).is_empty(), "query already in flight");

        state.apply(properties(query.id, SessionStatus::Starting, 2 * SECOND), 16 * SECOND);
        assert_eq!(state.poll_delay(), 2 * SECOND);
        assert_eq!(state.status(), ConnectionStatus::StartingSession);
        assert!(state.poll(17 * SECOND).is_empty());
        assert_eq!(state.poll(18 * SECOND).len(), 1);
    }

    #[test]
    fn ready_session_connects_and_loads_model_once() {
        let mut state = RemoteState::new(&config());
        created(&mut state, SECOND);
        let query = only(state.poll(20 * SECOND));

        let connect = only(state.apply(properties(query.id, SessionStatus::Ready, SECOND), 21 * SECOND));
        assert_eq!(connect.command, RemoteCommand::Connect);
        assert_eq!(state.status(), ConnectionStatus::Connecting);

        state.apply(
            Notification::ConnectionStatus {
                status: LinkStatus::Connected,
                error: None,
            },
            22 * SECOND,
        );
        assert!(state.is_connected());
        assert_eq!(state.status(), ConnectionStatus::Connected);

        let load = only(state.poll(23 * SECOND));
        assert_eq!(
            load.command,
            RemoteCommand::LoadModel {
                uri: "builtin://Engine".to_string()
            }
        );
        assert!(state.poll(24 * SECOND).is_empty());

        state.apply(
            Notification::ModelProgress {
                id: load.id,
                fraction: 0.5,
            },
            24 * SECOND,
        );
        assert_eq!(
            state.status_lines(24 * SECOND),
            Some(vec![
                "Connected".to_string(),
                "Loading model (50%)".to_string()
            ])
        );

        let place = only(state.apply(
            Notification::Completed {
                id: load.id,
                completion: Completion::ModelLoaded(Ok(())),
            },
            25 * SECOND,
        ));
        assert_eq!(
            place.command,
            RemoteCommand::PlaceModelRoot {
                position: MODEL_ROOT_POSITION
            }
        );
        assert!(state.model_loaded());
        assert_eq!(state.status_lines(25 * SECOND), None);
        assert_eq!(state.pending_count(), 1, "connect ack still outstanding");
    }

    #[test]
    fn terminal_session_states_fail_the_connection() {
        for (status, message) in [
            (SessionStatus::Error, "Session error"),
            (SessionStatus::Stopped, "Session stopped"),
            (SessionStatus::Expired, "Session expired"),
        ] {
            let mut state = RemoteState::new(&config());
            created(&mut state, SECOND);
            let query = only(state.poll(20 * SECOND));
            state.apply(properties(query.id, status, SECOND), 21 * SECOND);

            assert_eq!(state.status(), ConnectionStatus::ConnectionFailed);
            assert_eq!(state.message(), message);
            assert_eq!(
                state.status_lines(21 * SECOND),
                Some(vec![
                    "Failed to connect".to_string(),
                    format!("Error: {message}")
                ])
            );
        }
    }

    #[test]
    fn session_creation_failure_is_reported() {
        let mut state = RemoteState::new(&config());
        let start = only(state.start(Duration::ZERO));
        state.apply(
            Notification::Completed {
                id: start.id,
                completion: Completion::SessionCreated(Err("quota exceeded".to_string())),
            },
            SECOND,
        );
        assert_eq!(state.status(), ConnectionStatus::ConnectionFailed);
        assert_eq!(state.message(), "quota exceeded");
        assert!(state.poll(60 * SECOND).is_empty(), "no session to poll");
    }

    #[test]
    fn starting_status_reports_elapsed_seconds() {
        let mut state = RemoteState::new(&config());
        created(&mut state, 3 * SECOND);
        assert_eq!(
            state.status_lines(Duration::from_millis(10_900)),
            Some(vec![
                "Starting session...".to_string(),
                "...this may take a while. Elapsed time: 7s".to_string()
            ])
        );
    }

    #[test]
    fn unknown_completions_are_dropped() {
        let mut state = RemoteState::new(&config());
        state.start(Duration::ZERO);
        let issued = state.apply(
            Notification::Completed {
                id: OperationId(999),
                completion: Completion::SessionCreated(Ok("stray".to_string())),
            },
            SECOND,
        );
        assert!(issued.is_empty());
        assert_eq!(state.session_id(), None);
        assert_eq!(state.status(), ConnectionStatus::CreatingSession);
    }

    #[test]
    fn failed_connection_and_disconnect_reset_model_state() {
        let mut state = RemoteState::new(&config());
        state.apply(
            Notification::ConnectionStatus {
                status: LinkStatus::Connected,
                error: Some("handshake refused".to_string()),
            },
            SECOND,
        );
        assert!(!state.is_connected());
        assert_eq!(state.status(), ConnectionStatus::ConnectionFailed);

        state.apply(
            Notification::ConnectionStatus {
                status: LinkStatus::Disconnected,
                error: None,
            },
            SECOND,
        );
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            state.status_lines(SECOND),
            Some(vec!["Disconnected".to_string()])
        );
    }

    #[test]
    fn camera_settings_normalize_reversed_range() {
        let settings = CameraSettings::from_depth_range(NearFar {
            near: 20.0,
            far: 0.1,
        });
        assert_eq!(settings.near, 0.1);
        assert_eq!(settings.far, 20.0);
        assert!(settings.inverse_depth);
        assert!(settings.depth_enabled);
    }

    #[test]
    fn wrapper_runs_full_flow_against_scripted_backend() {
        let remote_config = RemoteConfig {
            status_poll_delay_ms: 0,
            ..config()
        };
        let backend = ScriptedRemoteBackend::new();
        let journal = backend.journal();
        let mut spaces = slotmap::SlotMap::<SpaceId, ()>::with_key();
        let app_space = spaces.insert(());
        let range = NearFar {
            near: 20.0,
            far: 0.1,
        };

        let mut remote = RemoteRendering::start(&remote_config, Box::new(backend), Duration::ZERO);
        for tick in 1..=6u64 {
            remote.update(Duration::from_millis(tick * 100), app_space, range);
        }

        assert!(remote.state().model_loaded());
        assert_eq!(remote.status_lines(), None);
        remote
            .composite(DeviceContextHandle(1))
            .expect("composite");

        let snapshot = journal.lock().expect("journal").clone();
        assert_eq!(snapshot.app_space_updates, vec![app_space]);
        assert_eq!(snapshot.model_root, Some(MODEL_ROOT_POSITION));
        assert_eq!(snapshot.blits, 1);
        assert!(snapshot.camera.is_some_and(|camera| camera.inverse_depth));

        drop(remote);
        assert!(journal.lock().expect("journal").disconnected);
    }
}
