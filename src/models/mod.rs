use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

pub const VEHICLE_MAKES: &[&str] = &[
    "Toyota",
    "Honda",
    "Ford",
    "Hyundai",
    "Mitsubishi",
    "Suzuki",
    "Nissan",
    "Mazda",
    "Chevrolet",
];
pub const VEHICLE_CATEGORIES: &[&str] = &["Sedan", "Hatchback", "SUV", "Van", "Pick up"];
pub const VEHICLE_TRANSMISSIONS: &[&str] = &["Automatic", "Manual"];
pub const VEHICLE_FUEL_TYPES: &[&str] = &["Petrol", "Diesel", "Hybrid", "Electric"];
pub const VEHICLE_MIN_YEAR: i32 = 1990;

/// The two editable entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Documentation,
    Vehicle,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Documentation => write!(f, "documentation"),
            RecordKind::Vehicle => write!(f, "vehicle"),
        }
    }
}

impl RecordKind {
    /// Most images the stored record can reference, if the row shape limits it
    pub fn image_cap(self) -> Option<usize> {
        match self {
            RecordKind::Documentation => None,
            RecordKind::Vehicle => Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Available,
    Sold,
}

impl VehicleStatus {
    pub fn toggled(self) -> Self {
        match self {
            VehicleStatus::Available => VehicleStatus::Sold,
            VehicleStatus::Sold => VehicleStatus::Available,
        }
    }
}

/// PostgREST returns `null` for empty array/text columns
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Row of `ojt_documentations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Documentation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `vehicles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vehicle {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: i64,
    pub mileage: String,
    pub category: String,
    pub transmission: String,
    pub fuel_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn image_urls(&self) -> Vec<String> {
        if self.image_url.is_empty() {
            Vec::new()
        } else {
            vec![self.image_url.clone()]
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct DocumentationInput {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub date: NaiveDate,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[validate(schema(function = "validate_vehicle_choices"))]
pub struct VehicleInput {
    pub make: String,
    #[validate(length(min = 1, message = "Model is required"))]
    pub model: String,
    #[validate(range(min = 1990, message = "Year must be 1990 or later"))]
    pub year: i32,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,
    #[validate(length(min = 1, message = "Mileage is required"))]
    pub mileage: String,
    pub category: String,
    pub transmission: String,
    pub fuel_type: String,
}

fn choice_error(code: &'static str, field: &str, value: &str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(format!("Unknown {}: '{}'", field, value).into());
    err
}

fn validate_vehicle_choices(input: &VehicleInput) -> Result<(), ValidationError> {
    if !VEHICLE_MAKES.contains(&input.make.as_str()) {
        return Err(choice_error("make", "make", &input.make));
    }
    if !VEHICLE_CATEGORIES.contains(&input.category.as_str()) {
        return Err(choice_error("category", "category", &input.category));
    }
    if !VEHICLE_TRANSMISSIONS.contains(&input.transmission.as_str()) {
        return Err(choice_error("transmission", "transmission", &input.transmission));
    }
    if !VEHICLE_FUEL_TYPES.contains(&input.fuel_type.as_str()) {
        return Err(choice_error("fuel_type", "fuel type", &input.fuel_type));
    }
    let max_year = Utc::now().year() + 1;
    if input.year > max_year {
        let mut err = ValidationError::new("year");
        err.message = Some(format!("Year cannot be later than {}", max_year).into());
        return Err(err);
    }
    Ok(())
}

/// Form fields submitted together with the staged images
#[derive(Debug, Clone)]
pub enum RecordFields {
    Documentation(DocumentationInput),
    Vehicle(VehicleInput),
}

impl RecordFields {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordFields::Documentation(_) => RecordKind::Documentation,
            RecordFields::Vehicle(_) => RecordKind::Vehicle,
        }
    }

    pub fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            RecordFields::Documentation(input) => input.validate(),
            RecordFields::Vehicle(input) => input.validate(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDocumentation {
    pub user_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub description: String,
    pub image_urls: Vec<String>,
}

/// Partial-field update; unset fields are left untouched by the store
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: i64,
    pub mileage: String,
    pub category: String,
    pub transmission: String,
    pub fuel_type: String,
    pub image_url: String,
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VehiclePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VehicleStatus>,
}

impl DocumentationPatch {
    pub fn from_input(input: DocumentationInput, image_urls: Vec<String>) -> Self {
        Self {
            title: Some(input.title),
            date: Some(input.date),
            description: Some(input.description),
            image_urls: Some(image_urls),
        }
    }
}

impl NewDocumentation {
    pub fn from_input(user_id: &str, input: DocumentationInput, image_urls: Vec<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: input.title,
            date: input.date,
            description: input.description,
            image_urls,
        }
    }
}

/// Vehicle forms are capped by `AppConfig::max_images_for`, so at most one URL arrives here
fn single_image(image_urls: Vec<String>) -> String {
    image_urls.into_iter().next().unwrap_or_default()
}

impl NewVehicle {
    pub fn from_input(input: VehicleInput, image_urls: Vec<String>) -> Self {
        Self {
            make: input.make,
            model: input.model,
            year: input.year,
            price: input.price,
            mileage: input.mileage,
            category: input.category,
            transmission: input.transmission,
            fuel_type: input.fuel_type,
            image_url: single_image(image_urls),
            status: VehicleStatus::Available,
        }
    }
}

impl VehiclePatch {
    pub fn from_input(input: VehicleInput, image_urls: Vec<String>) -> Self {
        Self {
            make: Some(input.make),
            model: Some(input.model),
            year: Some(input.year),
            price: Some(input.price),
            mileage: Some(input.mileage),
            category: Some(input.category),
            transmission: Some(input.transmission),
            fuel_type: Some(input.fuel_type),
            image_url: Some(single_image(image_urls)),
            status: None,
        }
    }

    pub fn status(status: VehicleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// A record as returned after a successful form submit
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum SubmittedRecord {
    Documentation(Documentation),
    Vehicle(Vehicle),
}

impl SubmittedRecord {
    pub fn id(&self) -> &str {
        match self {
            SubmittedRecord::Documentation(doc) => &doc.id,
            SubmittedRecord::Vehicle(vehicle) => &vehicle.id,
        }
    }
}
