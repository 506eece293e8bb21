//! Laboratory entities: samples, protocols, reports, notifications and
//! sensor readings, together with their insert and patch payloads.
//!
//! Insert payloads are deserialized straight from request bodies; owner
//! fields (`user_id`, `created_by`, `generated_by`) are skipped during
//! deserialization and filled in from the authenticated session.

use crate::serde_ext::{datetime_lenient, f64_lenient, opt_datetime_lenient, opt_f64};
use crate::LabError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = LabError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(LabError::ValidationError(format!(
                        concat!("unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Kind of material collected in the field
    SampleType {
        Water => "water",
        Soil => "soil",
        Plant => "plant",
        BiologicalFluid => "biological_fluid",
        Air => "air",
    }
);

text_enum!(
    SampleStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
    }
);

text_enum!(
    ProtocolStatus {
        Active => "active",
        Review => "review",
        Inactive => "inactive",
    }
);

text_enum!(
    ReportStatus {
        Draft => "draft",
        Completed => "completed",
        Shared => "shared",
    }
);

text_enum!(
    /// Notification category; the first three are emitted by the system,
    /// the rest by admin broadcasts
    NotificationKind {
        SampleEntry => "sample_entry",
        StatusUpdate => "status_update",
        ReportGenerated => "report_generated",
        Info => "info",
        Warning => "warning",
        Success => "success",
        Error => "error",
    }
);

impl Default for SampleStatus {
    fn default() -> Self {
        SampleStatus::Pending
    }
}

impl Default for ProtocolStatus {
    fn default() -> Self {
        ProtocolStatus::Active
    }
}

impl Default for ReportStatus {
    fn default() -> Self {
        ReportStatus::Draft
    }
}

// ============================================================================
// Samples
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: i32,
    /// Human-facing sample code (unique)
    pub sample_id: String,
    pub user_id: i32,
    pub sample_type: SampleType,
    pub collection_date: DateTime<Utc>,
    pub collection_time: String,
    pub location: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub geolocation: Option<serde_json::Value>,
    pub temperature: Option<f64>,
    pub ph: Option<f64>,
    pub salinity: Option<f64>,
    pub conductivity: Option<f64>,
    #[schema(value_type = Option<Object>)]
    pub field_conditions: Option<serde_json::Value>,
    pub status: SampleStatus,
    pub qr_code: Option<String>,
    pub barcode: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSample {
    #[validate(length(min = 1, max = 64, message = "Sample ID is required"))]
    pub sample_id: String,
    #[serde(skip)]
    pub user_id: i32,
    pub sample_type: SampleType,
    #[serde(deserialize_with = "datetime_lenient")]
    pub collection_date: DateTime<Utc>,
    #[validate(length(min = 1, message = "Collection time is required"))]
    pub collection_time: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub geolocation: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64")]
    #[validate(range(min = 0.0, max = 14.0, message = "pH must be between 0 and 14"))]
    pub ph: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub salinity: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub conductivity: Option<f64>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub field_conditions: Option<serde_json::Value>,
    #[serde(default)]
    pub status: SampleStatus,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SamplePatch {
    #[validate(length(min = 1, max = 64, message = "Sample ID must not be empty"))]
    pub sample_id: Option<String>,
    pub sample_type: Option<SampleType>,
    #[serde(default, deserialize_with = "opt_datetime_lenient")]
    pub collection_date: Option<DateTime<Utc>>,
    pub collection_time: Option<String>,
    pub location: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub geolocation: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64")]
    #[validate(range(min = 0.0, max = 14.0, message = "pH must be between 0 and 14"))]
    pub ph: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub salinity: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub conductivity: Option<f64>,
    #[schema(value_type = Option<Object>)]
    pub field_conditions: Option<serde_json::Value>,
    pub status: Option<SampleStatus>,
    pub qr_code: Option<String>,
    pub barcode: Option<String>,
}

impl Sample {
    pub fn from_new(id: i32, new: NewSample, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sample_id: new.sample_id,
            user_id: new.user_id,
            sample_type: new.sample_type,
            collection_date: new.collection_date,
            collection_time: new.collection_time,
            location: new.location,
            geolocation: new.geolocation,
            temperature: new.temperature,
            ph: new.ph,
            salinity: new.salinity,
            conductivity: new.conductivity,
            field_conditions: new.field_conditions,
            status: new.status,
            qr_code: new.qr_code,
            barcode: new.barcode,
            created_at,
        }
    }

    pub fn apply(&mut self, patch: &SamplePatch) {
        if let Some(v) = &patch.sample_id {
            self.sample_id = v.clone();
        }
        if let Some(v) = patch.sample_type {
            self.sample_type = v;
        }
        if let Some(v) = patch.collection_date {
            self.collection_date = v;
        }
        if let Some(v) = &patch.collection_time {
            self.collection_time = v.clone();
        }
        if patch.location.is_some() {
            self.location = patch.location.clone();
        }
        if patch.geolocation.is_some() {
            self.geolocation = patch.geolocation.clone();
        }
        if patch.temperature.is_some() {
            self.temperature = patch.temperature;
        }
        if patch.ph.is_some() {
            self.ph = patch.ph;
        }
        if patch.salinity.is_some() {
            self.salinity = patch.salinity;
        }
        if patch.conductivity.is_some() {
            self.conductivity = patch.conductivity;
        }
        if patch.field_conditions.is_some() {
            self.field_conditions = patch.field_conditions.clone();
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if patch.qr_code.is_some() {
            self.qr_code = patch.qr_code.clone();
        }
        if patch.barcode.is_some() {
            self.barcode = patch.barcode.clone();
        }
    }
}

// ============================================================================
// Protocols
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub id: i32,
    pub title: String,
    pub description: String,
    /// Experiment type or sample type the protocol applies to
    pub category: String,
    /// Step-by-step instructions
    pub content: String,
    pub status: ProtocolStatus,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProtocol {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    pub status: ProtocolStatus,
    #[serde(skip)]
    pub created_by: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolPatch {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub status: Option<ProtocolStatus>,
}

impl Protocol {
    pub fn from_new(id: i32, new: NewProtocol, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            description: new.description,
            category: new.category,
            content: new.content,
            status: new.status,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: &ProtocolPatch, now: DateTime<Utc>) {
        if let Some(v) = &patch.title {
            self.title = v.clone();
        }
        if let Some(v) = &patch.description {
            self.description = v.clone();
        }
        if let Some(v) = &patch.category {
            self.category = v.clone();
        }
        if let Some(v) = &patch.content {
            self.content = v.clone();
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        self.updated_at = now;
    }

    /// Case-insensitive match on title, description or category
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.category.to_lowercase().contains(&needle)
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i32,
    pub sample_id: i32,
    pub title: String,
    /// Charts and analysis results
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
    pub generated_by: i32,
    pub status: ReportStatus,
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    #[validate(range(min = 1, message = "Sample reference is required"))]
    pub sample_id: i32,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
    #[serde(skip)]
    pub generated_by: i32,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub pdf_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportPatch {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub content: Option<serde_json::Value>,
    pub status: Option<ReportStatus>,
    pub pdf_path: Option<String>,
}

impl Report {
    pub fn from_new(id: i32, new: NewReport, now: DateTime<Utc>) -> Self {
        Self {
            id,
            sample_id: new.sample_id,
            title: new.title,
            content: new.content,
            generated_by: new.generated_by,
            status: new.status,
            pdf_path: new.pdf_path,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: &ReportPatch, now: DateTime<Utc>) {
        if let Some(v) = &patch.title {
            self.title = v.clone();
        }
        if let Some(v) = &patch.content {
            self.content = v.clone();
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if patch.pdf_path.is_some() {
            self.pdf_path = patch.pdf_path.clone();
        }
        self.updated_at = now;
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl NewNotification {
    pub fn sample_submitted(user_id: i32, sample_code: &str) -> Self {
        Self {
            user_id,
            title: "Sample Submitted".to_string(),
            message: format!("Sample {sample_code} has been submitted successfully"),
            kind: NotificationKind::SampleEntry,
        }
    }

    pub fn report_generated(user_id: i32, report_title: &str) -> Self {
        Self {
            user_id,
            title: "Report Generated".to_string(),
            message: format!("Report \"{report_title}\" has been generated"),
            kind: NotificationKind::ReportGenerated,
        }
    }
}

impl Notification {
    pub fn from_new(id: i32, new: NewNotification, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            kind: new.kind,
            read: false,
            created_at: now,
        }
    }
}

// ============================================================================
// Sensor readings
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub id: i32,
    pub sample_id: i32,
    /// temperature, ph, conductivity, ...
    pub sensor_type: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSensorReading {
    #[validate(range(min = 1, message = "Sample reference is required"))]
    pub sample_id: i32,
    #[validate(length(min = 1, message = "Sensor type is required"))]
    pub sensor_type: String,
    #[serde(deserialize_with = "f64_lenient")]
    pub value: f64,
    #[validate(length(min = 1, message = "Unit is required"))]
    pub unit: String,
}

impl SensorReading {
    pub fn from_new(id: i32, new: NewSensorReading, now: DateTime<Utc>) -> Self {
        Self {
            id,
            sample_id: new.sample_id,
            sensor_type: new.sensor_type,
            value: new.value,
            unit: new.unit,
            timestamp: now,
        }
    }
}
