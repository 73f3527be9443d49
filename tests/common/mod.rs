#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use showroom_backend::config::{AppConfig, CloseBehavior};
use showroom_backend::models::{
    Documentation, DocumentationInput, DocumentationPatch, NewDocumentation, NewVehicle, Vehicle,
    VehicleInput, VehiclePatch,
};
use showroom_backend::services::form_service::UploadedFile;
use showroom_backend::services::records::{MemoryRecordStore, RecordStore};
use showroom_backend::services::storage::ObjectStorage;
use showroom_backend::staging::{
    PreviewHandle, PreviewProvider, PreviewStore, StagedFile, StagingError,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// 1x1 transparent PNG
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

pub const PUBLIC_BASE: &str = "https://cdn.test";

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("showroom_backend=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn test_config() -> AppConfig {
    AppConfig {
        record_store_backend: "memory".to_string(),
        jwt_secret: "test-secret".to_string(),
        admin_user_ids: vec!["admin".to_string()],
        close_behavior: CloseBehavior::Detach,
        ..AppConfig::default()
    }
}

pub fn staged(name: &str) -> StagedFile {
    StagedFile::new(name, "image/png", Bytes::from_static(TINY_PNG))
}

pub fn png_upload(name: &str) -> UploadedFile {
    UploadedFile {
        filename: name.to_string(),
        content_type: Some("image/png".to_string()),
        data: Bytes::from_static(TINY_PNG),
    }
}

pub fn doc_input(title: &str) -> DocumentationInput {
    DocumentationInput {
        title: title.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
        description: "Shadowed the service advisor".to_string(),
    }
}

pub fn vehicle_input() -> VehicleInput {
    VehicleInput {
        make: "Honda".to_string(),
        model: "City".to_string(),
        year: 2022,
        price: 850_000,
        mileage: "12,000 km".to_string(),
        category: "Sedan".to_string(),
        transmission: "Automatic".to_string(),
        fuel_type: "Petrol".to_string(),
    }
}

/// Object storage that records uploads and can fail or stall on demand
#[derive(Default)]
pub struct MockStorage {
    pub uploads: Mutex<Vec<(String, String, usize)>>,
    calls: AtomicUsize,
    /// 1-based upload call that fails
    fail_on_call: Option<usize>,
    /// When set, each upload waits here after signalling `started`
    hold: Option<Notify>,
    pub started: Notify,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn held() -> Self {
        Self {
            hold: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.notify_one();
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, path, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hold) = &self.hold {
            self.started.notify_one();
            hold.notified().await;
        }
        if self.fail_on_call == Some(call) {
            return Err(anyhow::anyhow!("simulated storage outage"));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), path.to_string(), data.len()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE, bucket, path)
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

/// Preview store that counts calls and can be told to fail
pub struct CountingPreviews {
    inner: PreviewStore,
    created: AtomicUsize,
    released: AtomicUsize,
    /// Number of creations that succeed before the next one fails
    fail_after: Option<usize>,
}

impl CountingPreviews {
    pub fn new() -> Self {
        Self {
            inner: PreviewStore::new().unwrap(),
            created: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::new()
        }
    }

    pub fn store(&self) -> &PreviewStore {
        &self.inner
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.inner.len()
    }

    /// Every handle ever created was released exactly once
    pub fn assert_balanced(&self) {
        assert_eq!(self.created(), self.released());
        assert!(self.inner.is_empty());
    }
}

impl PreviewProvider for CountingPreviews {
    fn create_preview(
        &self,
        owner_id: &str,
        file: &StagedFile,
    ) -> Result<PreviewHandle, StagingError> {
        if self.fail_after == Some(self.created()) {
            return Err(StagingError::Preview("disk full".to_string()));
        }
        let handle = self.inner.create_preview(owner_id, file)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn release_preview(&self, handle: PreviewHandle) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release_preview(handle);
    }
}

/// In-memory record store whose writes can be switched off
#[derive(Default)]
pub struct FlakyRecords {
    pub inner: MemoryRecordStore,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakyRecords {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("record store unavailable"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyRecords {
    async fn list_documentations(&self, owner_id: &str) -> anyhow::Result<Vec<Documentation>> {
        self.inner.list_documentations(owner_id).await
    }

    async fn get_documentation(
        &self,
        owner_id: &str,
        id: &str,
    ) -> anyhow::Result<Option<Documentation>> {
        self.inner.get_documentation(owner_id, id).await
    }

    async fn insert_documentation(&self, record: NewDocumentation) -> anyhow::Result<Documentation> {
        self.write()?;
        self.inner.insert_documentation(record).await
    }

    async fn update_documentation(
        &self,
        owner_id: &str,
        id: &str,
        patch: DocumentationPatch,
    ) -> anyhow::Result<Documentation> {
        self.write()?;
        self.inner.update_documentation(owner_id, id, patch).await
    }

    async fn delete_documentation(&self, owner_id: &str, id: &str) -> anyhow::Result<()> {
        self.write()?;
        self.inner.delete_documentation(owner_id, id).await
    }

    async fn list_vehicles(&self) -> anyhow::Result<Vec<Vehicle>> {
        self.inner.list_vehicles().await
    }

    async fn get_vehicle(&self, id: &str) -> anyhow::Result<Option<Vehicle>> {
        self.inner.get_vehicle(id).await
    }

    async fn insert_vehicle(&self, record: NewVehicle) -> anyhow::Result<Vehicle> {
        self.write()?;
        self.inner.insert_vehicle(record).await
    }

    async fn update_vehicle(&self, id: &str, patch: VehiclePatch) -> anyhow::Result<Vehicle> {
        self.write()?;
        self.inner.update_vehicle(id, patch).await
    }

    async fn delete_vehicle(&self, id: &str) -> anyhow::Result<()> {
        self.write()?;
        self.inner.delete_vehicle(id).await
    }

    fn backend(&self) -> &'static str {
        "flaky-memory"
    }
}
