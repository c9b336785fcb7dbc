use super::{
    CameraSettings, Completion, LinkStatus, Notification, OperationId, RemoteCommand,
    SessionStatus,
};
use crate::vr::{DeviceContextHandle, Pose, SpaceId};
use glam::Vec3;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote backend failure: {0}")]
    Backend(String),
    #[error("remote backend is disconnected")]
    Disconnected,
}

/// The cloud rendering service as seen from the frame loop.
///
/// Commands are fire-and-forget; their outcomes come back as [`Notification`]s carrying the
/// [`OperationId`] they were submitted with, after a later `tick`.
pub trait RemoteRenderingBackend {
    fn label(&self) -> &'static str;

    fn submit(&mut self, id: OperationId, command: RemoteCommand);
    /// Pumps the service connection so completions become drainable.
    fn tick(&mut self);
    fn drain_notifications(&mut self) -> Vec<Notification>;

    fn blit_remote_frame(&mut self, context: DeviceContextHandle) -> Result<(), RemoteError>;
    fn apply_camera_settings(&mut self, settings: CameraSettings);
    fn update_app_space(&mut self, space: SpaceId);

    fn position_status_overlay(&mut self, pose: Pose);
    fn draw_status(&mut self, context: DeviceContextHandle, lines: &[String]) -> Result<(), RemoteError>;

    fn disconnect(&mut self);
}

/// Everything a [`ScriptedRemoteBackend`] was asked to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteJournal {
    pub commands: Vec<RemoteCommand>,
    pub blits: usize,
    pub camera: Option<CameraSettings>,
    pub app_space_updates: Vec<SpaceId>,
    pub overlay_pose: Option<Pose>,
    pub overlay_draws: Vec<Vec<String>>,
    pub model_root: Option<Vec3>,
    pub disconnected: bool,
}

/// In-process service that answers every command on the following tick.
pub struct ScriptedRemoteBackend {
    session: Result<String, String>,
    properties: VecDeque<Result<SessionStatus, String>>,
    retry_delay: Duration,
    connection_error: Option<String>,
    model_progress: Vec<f32>,
    model_result: Result<(), String>,
    submitted: Vec<(OperationId, RemoteCommand)>,
    ready: Vec<Notification>,
    disconnected: bool,
    journal: Arc<Mutex<RemoteJournal>>,
}

impl ScriptedRemoteBackend {
    pub fn new() -> Self {
        Self {
            session: Ok("scripted-session".to_string()),
            properties: VecDeque::new(),
            retry_delay: Duration::ZERO,
            connection_error: None,
            model_progress: vec![0.25, 0.5, 1.0],
            model_result: Ok(()),
            submitted: Vec::new(),
            ready: Vec::new(),
            disconnected: false,
            journal: Arc::new(Mutex::new(RemoteJournal::default())),
        }
    }

    pub fn with_session_result(mut self, result: Result<String, String>) -> Self {
        self.session = result;
        self
    }

    /// Answers to successive property queries; once exhausted every query reports `Ready`.
    pub fn with_property_statuses(mut self, statuses: Vec<Result<SessionStatus, String>>) -> Self {
        self.properties = statuses.into();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_connection_error(mut self, error: impl Into<String>) -> Self {
        self.connection_error = Some(error.into());
        self
    }

    pub fn with_model_result(mut self, result: Result<(), String>) -> Self {
        self.model_result = result;
        self
    }

    pub fn journal(&self) -> Arc<Mutex<RemoteJournal>> {
        Arc::clone(&self.journal)
    }

    /// Delivers an out-of-band notification on the next drain.
    pub fn inject(&mut self, notification: Notification) {
        self.ready.push(notification);
    }

    fn record(&self, apply: impl FnOnce(&mut RemoteJournal)) {
        if let Ok(mut journal) = self.journal.lock() {
            apply(&mut journal);
        }
    }

    fn answer(&mut self, id: OperationId, command: RemoteCommand) {
        let completed = |completion| Notification::Completed { id, completion };
        match command {
            RemoteCommand::CreateSession { .. } => {
                let result = self.session.clone();
                self.ready.push(completed(Completion::SessionCreated(result)));
            }
            RemoteCommand::OpenSession { session_id, .. } => {
                let result = self.session.clone().map(|_| session_id);
                self.ready.push(completed(Completion::SessionCreated(result)));
            }
            RemoteCommand::QueryProperties { .. } => {
                let result = self.properties.pop_front().unwrap_or(Ok(SessionStatus::Ready));
                self.ready.push(completed(Completion::Properties {
                    result,
                    retry_delay: self.retry_delay,
                }));
            }
            RemoteCommand::Connect => {
                self.ready.push(Notification::ConnectionStatus {
                    status: LinkStatus::Connecting,
                    error: None,
                });
                self.ready.push(Notification::ConnectionStatus {
                    status: LinkStatus::Connected,
                    error: self.connection_error.clone(),
                });
                self.ready.push(completed(Completion::Ack));
            }
            RemoteCommand::LoadModel { .. } => {
                for fraction in self.model_progress.clone() {
                    self.ready.push(Notification::ModelProgress { id, fraction });
                }
                let result = self.model_result.clone();
                self.ready.push(completed(Completion::ModelLoaded(result)));
            }
            RemoteCommand::PlaceModelRoot { position } => {
                self.record(|journal| journal.model_root = Some(position));
            }
        }
    }
}

impl Default for ScriptedRemoteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteRenderingBackend for ScriptedRemoteBackend {
    fn label(&self) -> &'static str {
        "Scripted Remote Backend"
    }

    fn submit(&mut self, id: OperationId, command: RemoteCommand) {
        self.record(|journal| journal.commands.push(command.clone()));
        if let RemoteCommand::PlaceModelRoot { .. } = command {
            self.answer(id, command);
        } else {
            self.submitted.push((id, command));
        }
    }

    fn tick(&mut self) {
        for (id, command) in std::mem::take(&mut self.submitted) {
            self.answer(id, command);
        }
    }

    fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.ready)
    }

    fn blit_remote_frame(&mut self, _context: DeviceContextHandle) -> Result<(), RemoteError> {
        if self.disconnected {
            return Err(RemoteError::Disconnected);
        }
        self.record(|journal| journal.blits += 1);
        Ok(())
    }

    fn apply_camera_settings(&mut self, settings: CameraSettings) {
        self.record(|journal| journal.camera = Some(settings));
    }

    fn update_app_space(&mut self, space: SpaceId) {
        self.record(|journal| journal.app_space_updates.push(space));
    }

    fn position_status_overlay(&mut self, pose: Pose) {
        self.record(|journal| journal.overlay_pose = Some(pose));
    }

    fn draw_status(&mut self, _context: DeviceContextHandle, lines: &[String]) -> Result<(), RemoteError> {
        if self.disconnected {
            return Err(RemoteError::Disconnected);
        }
        self.record(|journal| journal.overlay_draws.push(lines.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.submitted.clear();
        self.disconnected = true;
        self.record(|journal| journal.disconnected = true);
    }
}
