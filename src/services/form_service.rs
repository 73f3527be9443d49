use crate::config::{AppConfig, CloseBehavior};
use crate::models::{
    DocumentationPatch, NewDocumentation, NewVehicle, RecordFields, RecordKind, SubmittedRecord,
    VehiclePatch,
};
use crate::services::records::RecordStore;
use crate::services::storage::ObjectStorage;
use crate::staging::{AttachmentSet, PreviewProvider, StagedImage, StagingError, UploadTarget};
use crate::utils::validation::inspect_image;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum FormError {
    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("Invalid form data: {0}")]
    Validation(String),

    #[error("Failed to save the record. Please try again.")]
    RecordWriteFailure(String),

    #[error("Failed to load the record: {0}")]
    RecordReadFailure(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Form not found")]
    SessionNotFound,

    #[error("Form is closed")]
    SessionClosed,

    #[error("A submit is already in progress for this form")]
    SubmitInProgress,

    #[error("This form edits a {expected}, not a {actual}")]
    KindMismatch {
        expected: RecordKind,
        actual: RecordKind,
    },

    #[error("Form was closed before the submit finished; the result was discarded")]
    SubmitDiscarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Submitting,
    Closed,
}

/// A file as received from the client, before validation
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageView {
    Remote {
        url: String,
    },
    Local {
        preview_url: String,
        filename: String,
        content_type: String,
        size: usize,
        width: Option<u32>,
        height: Option<u32>,
    },
}

/// What the client renders for an open form
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FormView {
    pub session_id: Uuid,
    pub kind: RecordKind,
    pub record_id: Option<String>,
    pub max_images: usize,
    pub remaining_slots: usize,
    pub images: Vec<ImageView>,
    pub state: SessionState,
    pub error: Option<String>,
}

struct FormSession {
    id: Uuid,
    owner_id: String,
    kind: RecordKind,
    record_id: Option<String>,
    /// `None` once the form is closed and its previews released
    attachments: Option<AttachmentSet>,
    state: SessionState,
    error: Option<String>,
    last_activity: Instant,
    /// Held by a submit for its whole duration; `wait` closes queue on it
    submit_gate: Arc<Mutex<()>>,
}

impl FormSession {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn ensure_owner(&self, owner_id: &str) -> Result<(), FormError> {
        if self.owner_id != owner_id {
            return Err(FormError::SessionNotFound);
        }
        Ok(())
    }

    fn editable(&mut self) -> Result<&mut AttachmentSet, FormError> {
        match self.state {
            SessionState::Closed => return Err(FormError::SessionClosed),
            SessionState::Submitting => return Err(FormError::SubmitInProgress),
            SessionState::Open => {}
        }
        self.attachments.as_mut().ok_or(FormError::SessionClosed)
    }

    /// Idempotent; dropping the attachment set releases every remaining preview
    fn teardown(&mut self) {
        self.state = SessionState::Closed;
        self.attachments.take();
    }

    fn view(&self) -> FormView {
        let (max_images, remaining_slots, images) = match &self.attachments {
            Some(set) => (
                set.max_images(),
                set.remaining(),
                set.entries().iter().map(image_view).collect(),
            ),
            None => (0, 0, Vec::new()),
        };

        FormView {
            session_id: self.id,
            kind: self.kind,
            record_id: self.record_id.clone(),
            max_images,
            remaining_slots,
            images,
            state: self.state,
            error: self.error.clone(),
        }
    }
}

fn image_view(entry: &StagedImage) -> ImageView {
    match entry {
        StagedImage::Remote { url } => ImageView::Remote { url: url.clone() },
        StagedImage::Local(local) => {
            let file = local.file();
            ImageView::Local {
                preview_url: local.preview().url(),
                filename: file.filename.clone(),
                content_type: file.content_type.clone(),
                size: file.size(),
                width: file.dimensions.map(|(w, _)| w),
                height: file.dimensions.map(|(_, h)| h),
            }
        }
    }
}

/// Open edit forms and their image staging
pub struct FormService {
    sessions: DashMap<Uuid, Arc<Mutex<FormSession>>>,
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn ObjectStorage>,
    previews: Arc<dyn PreviewProvider>,
    config: AppConfig,
}

impl FormService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
        previews: Arc<dyn PreviewProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            records,
            storage,
            previews,
            config,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, id: Uuid) -> Result<Arc<Mutex<FormSession>>, FormError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(FormError::SessionNotFound)
    }

    /// Opens a form for a new record, or for an existing one seeded with its stored images
    pub async fn open(
        &self,
        owner_id: &str,
        kind: RecordKind,
        record_id: Option<&str>,
    ) -> Result<FormView, FormError> {
        if owner_id.trim().is_empty() {
            return Err(StagingError::MissingOwner.into());
        }

        let existing = match record_id {
            Some(id) => self.stored_image_urls(owner_id, kind, id).await?,
            None => Vec::new(),
        };

        let attachments = AttachmentSet::seeded(
            owner_id,
            self.config.max_images_for(kind),
            existing,
            self.previews.clone(),
        );
        let session = FormSession {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            kind,
            record_id: record_id.map(str::to_string),
            attachments: Some(attachments),
            state: SessionState::Open,
            error: None,
            last_activity: Instant::now(),
            submit_gate: Arc::new(Mutex::new(())),
        };

        let view = session.view();
        tracing::info!(
            "📝 Opened {} form {} for {} ({} existing image(s))",
            kind,
            session.id,
            owner_id,
            view.images.len()
        );
        self.sessions
            .insert(session.id, Arc::new(Mutex::new(session)));
        Ok(view)
    }

    async fn stored_image_urls(
        &self,
        owner_id: &str,
        kind: RecordKind,
        record_id: &str,
    ) -> Result<Vec<String>, FormError> {
        let urls = match kind {
            RecordKind::Documentation => self
                .records
                .get_documentation(owner_id, record_id)
                .await
                .map_err(|e| FormError::RecordReadFailure(e.to_string()))?
                .map(|doc| doc.image_urls),
            RecordKind::Vehicle => self
                .records
                .get_vehicle(record_id)
                .await
                .map_err(|e| FormError::RecordReadFailure(e.to_string()))?
                .map(|vehicle| vehicle.image_urls()),
        };
        urls.ok_or_else(|| FormError::RecordNotFound(record_id.to_string()))
    }

    pub async fn view(&self, owner_id: &str, id: Uuid) -> Result<FormView, FormError> {
        let session = self.session(id)?;
        let session = session.lock().await;
        session.ensure_owner(owner_id)?;
        Ok(session.view())
    }

    pub async fn kind(&self, owner_id: &str, id: Uuid) -> Result<RecordKind, FormError> {
        let session = self.session(id)?;
        let session = session.lock().await;
        session.ensure_owner(owner_id)?;
        Ok(session.kind)
    }

    /// Stages a batch of picked files: all of them, or none
    pub async fn add_files(
        &self,
        owner_id: &str,
        id: Uuid,
        files: Vec<UploadedFile>,
    ) -> Result<FormView, FormError> {
        let session = self.session(id)?;
        let mut session = session.lock().await;
        session.ensure_owner(owner_id)?;
        session.touch();

        match self.stage_files(&mut session, files) {
            Ok(count) => {
                session.error = None;
                tracing::info!("🖼️  Staged {} image(s) on form {}", count, id);
                Ok(session.view())
            }
            Err(e) => {
                tracing::warn!("Rejected image batch on form {}: {}", id, e);
                if matches!(e, FormError::Staging(_)) {
                    session.error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    fn stage_files(
        &self,
        session: &mut FormSession,
        files: Vec<UploadedFile>,
    ) -> Result<usize, FormError> {
        let max_size = self.config.max_image_size;
        let attachments = session.editable()?;

        // Capacity first: an oversized batch is reported as such even if it also holds junk
        attachments.check_capacity(files.len())?;

        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            let inspected = inspect_image(
                &file.filename,
                file.content_type.as_deref(),
                file.data,
                max_size,
            )
            .map_err(|e| StagingError::InvalidFile(format!("{}: {}", file.filename, e.message)))?;
            staged.push(inspected);
        }

        let count = staged.len();
        attachments.add_files(staged)?;
        Ok(count)
    }

    pub async fn remove_image(
        &self,
        owner_id: &str,
        id: Uuid,
        index: usize,
    ) -> Result<FormView, FormError> {
        let session = self.session(id)?;
        let mut session = session.lock().await;
        session.ensure_owner(owner_id)?;
        session.touch();

        session.editable()?.remove_at(index)?;
        Ok(session.view())
    }

    /// Uploads the staged files, then writes the record with the resolved URL list.
    ///
    /// Uploads run without holding the form, so a `detach` close can proceed meanwhile; the
    /// settled result is then discarded instead of written. On success the form is closed.
    pub async fn submit(
        &self,
        owner_id: &str,
        id: Uuid,
        fields: RecordFields,
    ) -> Result<SubmittedRecord, FormError> {
        let session = self.session(id)?;

        let (submission, target, record_id, _permit) = {
            let mut guard = session.lock().await;
            guard.ensure_owner(owner_id)?;
            guard.touch();

            if guard.kind != fields.kind() {
                return Err(FormError::KindMismatch {
                    expected: guard.kind,
                    actual: fields.kind(),
                });
            }
            match guard.state {
                SessionState::Closed => return Err(FormError::SessionClosed),
                SessionState::Submitting => return Err(FormError::SubmitInProgress),
                SessionState::Open => {}
            }

            if let Err(e) = fields.validate() {
                let err = FormError::Validation(e.to_string());
                guard.error = Some(err.to_string());
                return Err(err);
            }

            // A waiting close holds the gate while the form is still open
            let permit = guard
                .submit_gate
                .clone()
                .try_lock_owned()
                .map_err(|_| FormError::SessionClosed)?;

            let limits = self.config.limits_for(guard.kind);
            let target = UploadTarget::new(
                limits.bucket.as_str(),
                limits.path_prefix.as_str(),
                Some(guard.owner_id.as_str()),
            )?;
            let submission = guard
                .attachments
                .as_ref()
                .ok_or(FormError::SessionClosed)?
                .submission();

            guard.state = SessionState::Submitting;
            guard.error = None;
            (submission, target, guard.record_id.clone(), permit)
        };

        tracing::info!(
            "🚀 Submitting form {} ({} upload(s), {} kept image(s))",
            id,
            submission.upload_count(),
            submission.remote_urls().len()
        );

        // Uploads run one after another, each within the upstream timeout
        let upload_budget =
            self.config.upstream_timeout * submission.upload_count().max(1) as u32;
        let resolved = tokio::time::timeout(
            upload_budget,
            submission.resolve(self.storage.as_ref(), &target),
        )
        .await
        .unwrap_or_else(|_| {
            tracing::error!("Uploads for form {} timed out after {:?}", id, upload_budget);
            Err(StagingError::UploadFailure {
                path: target.bucket().to_string(),
                reason: format!("timed out after {:?}", upload_budget),
            })
        });

        let urls = {
            let mut guard = session.lock().await;
            if guard.state == SessionState::Closed {
                tracing::warn!(
                    "Form {} was closed during submit, discarding the result (uploaded objects stay orphaned)",
                    id
                );
                return Err(FormError::SubmitDiscarded);
            }
            match resolved {
                Ok(urls) => urls,
                Err(e) => {
                    guard.state = SessionState::Open;
                    guard.error = Some(e.to_string());
                    return Err(e.into());
                }
            }
        };

        let written = tokio::time::timeout(
            self.config.upstream_timeout,
            self.write_record(owner_id, record_id.as_deref(), fields, urls),
        )
        .await
        .unwrap_or_else(|_| {
            tracing::error!("Record write for form {} timed out", id);
            Err(FormError::RecordWriteFailure(format!(
                "timed out after {:?}",
                self.config.upstream_timeout
            )))
        });

        let mut guard = session.lock().await;
        match written {
            Ok(record) => {
                guard.teardown();
                drop(guard);
                self.sessions.remove(&id);
                tracing::info!("✅ Form {} saved record {}", id, record.id());
                Ok(record)
            }
            Err(e) => {
                if guard.state != SessionState::Closed {
                    guard.state = SessionState::Open;
                    guard.error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn write_record(
        &self,
        owner_id: &str,
        record_id: Option<&str>,
        fields: RecordFields,
        image_urls: Vec<String>,
    ) -> Result<SubmittedRecord, FormError> {
        let result = match (fields, record_id) {
            (RecordFields::Documentation(input), None) => self
                .records
                .insert_documentation(NewDocumentation::from_input(owner_id, input, image_urls))
                .await
                .map(SubmittedRecord::Documentation),
            (RecordFields::Documentation(input), Some(id)) => self
                .records
                .update_documentation(
                    owner_id,
                    id,
                    DocumentationPatch::from_input(input, image_urls),
                )
                .await
                .map(SubmittedRecord::Documentation),
            (RecordFields::Vehicle(input), None) => self
                .records
                .insert_vehicle(NewVehicle::from_input(input, image_urls))
                .await
                .map(SubmittedRecord::Vehicle),
            (RecordFields::Vehicle(input), Some(id)) => self
                .records
                .update_vehicle(id, VehiclePatch::from_input(input, image_urls))
                .await
                .map(SubmittedRecord::Vehicle),
        };

        result.map_err(|e| {
            tracing::error!("Record write failed: {:#}", e);
            FormError::RecordWriteFailure(e.to_string())
        })
    }

    /// Closes a form (cancel or teardown) and releases its previews
    pub async fn close(&self, owner_id: &str, id: Uuid) -> Result<(), FormError> {
        let session = self.session(id)?;
        let gate = {
            let guard = session.lock().await;
            guard.ensure_owner(owner_id)?;
            guard.submit_gate.clone()
        };

        match self.config.close_behavior {
            CloseBehavior::Detach => {
                let mut guard = session.lock().await;
                if guard.state == SessionState::Submitting {
                    tracing::info!("Closing form {} with a submit in flight, detaching it", id);
                }
                guard.teardown();
            }
            CloseBehavior::Wait => {
                let _permit = gate.lock_owned().await;
                session.lock().await.teardown();
            }
        }

        self.sessions.remove(&id);
        tracing::info!("🗑️  Closed form {}", id);
        Ok(())
    }

    /// Tears down open forms idle for at least `max_idle`; forms mid-submit are left alone
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let candidates: Vec<(Uuid, Arc<Mutex<FormSession>>)> = self
            .sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut closed = 0;
        for (id, session) in candidates {
            let Ok(mut guard) = session.try_lock() else {
                continue;
            };
            if guard.state == SessionState::Open && guard.last_activity.elapsed() >= max_idle {
                guard.teardown();
                drop(guard);
                self.sessions.remove(&id);
                closed += 1;
                tracing::info!("⏰ Closed idle form {}", id);
            }
        }
        closed
    }

    /// Tears down every form; used on process shutdown
    pub async fn shutdown(&self) -> usize {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;
        for id in ids {
            if let Some((_, session)) = self.sessions.remove(&id) {
                session.lock().await.teardown();
                closed += 1;
            }
        }
        closed
    }
}
