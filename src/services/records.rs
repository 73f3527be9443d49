use crate::models::{
    Documentation, DocumentationPatch, NewDocumentation, NewVehicle, Vehicle, VehiclePatch,
};
use crate::services::supabase::{SupabaseClient, ensure_success};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

const DOCUMENTATIONS: &str = "ojt_documentations";
const VEHICLES: &str = "vehicles";

/// The hosted record store, seen from this service.
///
/// Updates are partial-field merges, deletes are unconditional by id, and nothing is retried.
/// Documentation calls are scoped to their owner.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_documentations(&self, owner_id: &str) -> Result<Vec<Documentation>>;
    async fn get_documentation(&self, owner_id: &str, id: &str) -> Result<Option<Documentation>>;
    async fn insert_documentation(&self, record: NewDocumentation) -> Result<Documentation>;
    async fn update_documentation(
        &self,
        owner_id: &str,
        id: &str,
        patch: DocumentationPatch,
    ) -> Result<Documentation>;
    async fn delete_documentation(&self, owner_id: &str, id: &str) -> Result<()>;

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>>;
    async fn get_vehicle(&self, id: &str) -> Result<Option<Vehicle>>;
    async fn insert_vehicle(&self, record: NewVehicle) -> Result<Vehicle>;
    async fn update_vehicle(&self, id: &str, patch: VehiclePatch) -> Result<Vehicle>;
    async fn delete_vehicle(&self, id: &str) -> Result<()>;

    fn backend(&self) -> &'static str;
}

/// PostgREST tables of the hosted project
pub struct SupabaseRecordStore {
    client: SupabaseClient,
}

impl SupabaseRecordStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.client.rest_url(table)?;
        let request = self
            .client
            .http()
            .get(url)
            .query(&[("select", "*")])
            .query(filters);

        let response = self.client.authorize(request).send().await?;
        let response = ensure_success(response, &format!("Select from {}", table)).await?;
        Ok(response.json().await?)
    }

    async fn insert<B, T>(&self, table: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.client.rest_url(table)?;
        let request = self
            .client
            .http()
            .post(url)
            .header("Prefer", "return=representation")
            .json(&[body]);

        let response = self.client.authorize(request).send().await?;
        let response = ensure_success(response, &format!("Insert into {}", table)).await?;
        let mut rows: Vec<T> = response.json().await?;
        rows.pop()
            .ok_or_else(|| anyhow!("Insert into {} returned no row", table))
    }

    async fn update<B, T>(&self, table: &str, filters: &[(&str, String)], body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.client.rest_url(table)?;
        let request = self
            .client
            .http()
            .patch(url)
            .query(filters)
            .header("Prefer", "return=representation")
            .json(body);

        let response = self.client.authorize(request).send().await?;
        let response = ensure_success(response, &format!("Update of {}", table)).await?;
        let mut rows: Vec<T> = response.json().await?;
        rows.pop()
            .ok_or_else(|| anyhow!("Update of {} matched no row", table))
    }

    async fn delete(&self, table: &str, filters: &[(&str, String)]) -> Result<()> {
        let url = self.client.rest_url(table)?;
        let request = self.client.http().delete(url).query(filters);

        let response = self.client.authorize(request).send().await?;
        ensure_success(response, &format!("Delete from {}", table)).await?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl RecordStore for SupabaseRecordStore {
    async fn list_documentations(&self, owner_id: &str) -> Result<Vec<Documentation>> {
        self.select(
            DOCUMENTATIONS,
            &[("user_id", eq(owner_id)), ("order", "date.desc".to_string())],
        )
        .await
    }

    async fn get_documentation(&self, owner_id: &str, id: &str) -> Result<Option<Documentation>> {
        let mut rows: Vec<Documentation> = self
            .select(DOCUMENTATIONS, &[("id", eq(id)), ("user_id", eq(owner_id))])
            .await?;
        Ok(rows.pop())
    }

    async fn insert_documentation(&self, record: NewDocumentation) -> Result<Documentation> {
        self.insert(DOCUMENTATIONS, &record).await
    }

    async fn update_documentation(
        &self,
        owner_id: &str,
        id: &str,
        patch: DocumentationPatch,
    ) -> Result<Documentation> {
        self.update(
            DOCUMENTATIONS,
            &[("id", eq(id)), ("user_id", eq(owner_id))],
            &patch,
        )
        .await
    }

    async fn delete_documentation(&self, owner_id: &str, id: &str) -> Result<()> {
        self.delete(DOCUMENTATIONS, &[("id", eq(id)), ("user_id", eq(owner_id))])
            .await
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.select(VEHICLES, &[("order", "created_at.desc".to_string())])
            .await
    }

    async fn get_vehicle(&self, id: &str) -> Result<Option<Vehicle>> {
        let mut rows: Vec<Vehicle> = self.select(VEHICLES, &[("id", eq(id))]).await?;
        Ok(rows.pop())
    }

    async fn insert_vehicle(&self, record: NewVehicle) -> Result<Vehicle> {
        self.insert(VEHICLES, &record).await
    }

    async fn update_vehicle(&self, id: &str, patch: VehiclePatch) -> Result<Vehicle> {
        self.update(VEHICLES, &[("id", eq(id))], &patch).await
    }

    async fn delete_vehicle(&self, id: &str) -> Result<()> {
        self.delete(VEHICLES, &[("id", eq(id))]).await
    }

    fn backend(&self) -> &'static str {
        "supabase"
    }
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct MemoryRecordStore {
    documentations: DashMap<String, Documentation>,
    vehicles: DashMap<String, Vehicle>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_documentation_patch(doc: &mut Documentation, patch: DocumentationPatch) {
    if let Some(title) = patch.title {
        doc.title = title;
    }
    if let Some(date) = patch.date {
        doc.date = date;
    }
    if let Some(description) = patch.description {
        doc.description = description;
    }
    if let Some(image_urls) = patch.image_urls {
        doc.image_urls = image_urls;
    }
    doc.updated_at = Utc::now();
}

fn apply_vehicle_patch(vehicle: &mut Vehicle, patch: VehiclePatch) {
    if let Some(make) = patch.make {
        vehicle.make = make;
    }
    if let Some(model) = patch.model {
        vehicle.model = model;
    }
    if let Some(year) = patch.year {
        vehicle.year = year;
    }
    if let Some(price) = patch.price {
        vehicle.price = price;
    }
    if let Some(mileage) = patch.mileage {
        vehicle.mileage = mileage;
    }
    if let Some(category) = patch.category {
        vehicle.category = category;
    }
    if let Some(transmission) = patch.transmission {
        vehicle.transmission = transmission;
    }
    if let Some(fuel_type) = patch.fuel_type {
        vehicle.fuel_type = fuel_type;
    }
    if let Some(image_url) = patch.image_url {
        vehicle.image_url = image_url;
    }
    if let Some(status) = patch.status {
        vehicle.status = status;
    }
    vehicle.updated_at = Utc::now();
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_documentations(&self, owner_id: &str) -> Result<Vec<Documentation>> {
        let mut docs: Vec<Documentation> = self
            .documentations
            .iter()
            .filter(|entry| entry.user_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        docs.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(docs)
    }

    async fn get_documentation(&self, owner_id: &str, id: &str) -> Result<Option<Documentation>> {
        Ok(self
            .documentations
            .get(id)
            .filter(|doc| doc.user_id == owner_id)
            .map(|doc| doc.value().clone()))
    }

    async fn insert_documentation(&self, record: NewDocumentation) -> Result<Documentation> {
        let now = Utc::now();
        let doc = Documentation {
            id: Uuid::new_v4().to_string(),
            user_id: record.user_id,
            title: record.title,
            date: record.date,
            description: record.description,
            image_urls: record.image_urls,
            created_at: now,
            updated_at: now,
        };
        self.documentations.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    async fn update_documentation(
        &self,
        owner_id: &str,
        id: &str,
        patch: DocumentationPatch,
    ) -> Result<Documentation> {
        let mut doc = self
            .documentations
            .get_mut(id)
            .filter(|doc| doc.user_id == owner_id)
            .ok_or_else(|| anyhow!("Update of {} matched no row", DOCUMENTATIONS))?;
        apply_documentation_patch(&mut doc, patch);
        Ok(doc.clone())
    }

    async fn delete_documentation(&self, owner_id: &str, id: &str) -> Result<()> {
        self.documentations
            .remove_if(id, |_, doc| doc.user_id == owner_id);
        Ok(())
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        vehicles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(vehicles)
    }

    async fn get_vehicle(&self, id: &str) -> Result<Option<Vehicle>> {
        Ok(self.vehicles.get(id).map(|v| v.value().clone()))
    }

    async fn insert_vehicle(&self, record: NewVehicle) -> Result<Vehicle> {
        let now = Utc::now();
        let vehicle = Vehicle {
            id: Uuid::new_v4().to_string(),
            make: record.make,
            model: record.model,
            year: record.year,
            price: record.price,
            mileage: record.mileage,
            category: record.category,
            transmission: record.transmission,
            fuel_type: record.fuel_type,
            image_url: record.image_url,
            status: record.status,
            created_at: now,
            updated_at: now,
        };
        self.vehicles.insert(vehicle.id.clone(), vehicle.clone());
        Ok(vehicle)
    }

    async fn update_vehicle(&self, id: &str, patch: VehiclePatch) -> Result<Vehicle> {
        let mut vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| anyhow!("Update of {} matched no row", VEHICLES))?;
        apply_vehicle_patch(&mut vehicle, patch);
        Ok(vehicle.clone())
    }

    async fn delete_vehicle(&self, id: &str) -> Result<()> {
        self.vehicles.remove(id);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
