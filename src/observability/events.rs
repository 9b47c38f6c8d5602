//! Domain events reported through the service facade

use crate::logging::Metadata;
use serde_json::{json, Value};

/// A FHIR server interaction
#[derive(Debug, Clone, Default)]
pub struct FhirOperation {
    /// e.g. `create`, `read`, `search`, `transaction`
    pub operation: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub success: bool,
    pub duration_ms: Option<f64>,
    pub error: Option<String>,
    pub metadata: Metadata,
}

impl FhirOperation {
    pub fn new(operation: impl Into<String>, resource_type: impl Into<String>, success: bool) -> Self {
        Self {
            operation: operation.into(),
            resource_type: resource_type.into(),
            success,
            ..Self::default()
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn with_duration(mut self, millis: f64) -> Self {
        self.duration_ms = Some(millis);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub(crate) fn to_metadata(&self) -> Metadata {
        let mut meta = self.metadata.clone();
        meta.extend(object(json!({
            "operation": self.operation,
            "resourceType": self.resource_type,
            "success": self.success,
        })));
        insert_opt(&mut meta, "resourceId", self.resource_id.as_deref().map(Value::from));
        insert_opt(&mut meta, "duration", self.duration_ms.map(Value::from));
        insert_opt(&mut meta, "error", self.error.as_deref().map(Value::from));
        meta
    }

    pub(crate) fn failure_message(&self) -> String {
        let base = format!("FHIR {} {} failed", self.operation, self.resource_type);
        match &self.error {
            Some(e) => format!("{}: {}", base, e),
            None => base,
        }
    }
}

/// An outbound or inbound patient message (SMS, email, push, ...)
#[derive(Debug, Clone, Default)]
pub struct MessageEvent {
    /// e.g. `sent`, `delivered`, `bounced`
    pub event_type: String,
    pub message_id: String,
    pub channel: String,
    pub provider: String,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: Metadata,
}

impl MessageEvent {
    pub fn new(
        event_type: impl Into<String>,
        message_id: impl Into<String>,
        channel: impl Into<String>,
        provider: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            message_id: message_id.into(),
            channel: channel.into(),
            provider: provider.into(),
            success,
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub(crate) fn to_metadata(&self) -> Metadata {
        let mut meta = self.metadata.clone();
        meta.extend(object(json!({
            "eventType": self.event_type,
            "messageId": self.message_id,
            "channel": self.channel,
            "provider": self.provider,
            "success": self.success,
        })));
        insert_opt(&mut meta, "error", self.error.as_deref().map(Value::from));
        meta
    }

    pub(crate) fn failure_message(&self) -> String {
        match &self.error {
            Some(e) => format!("Message {} failed via {}: {}", self.event_type, self.channel, e),
            None => format!("Message {} failed via {}", self.event_type, self.channel),
        }
    }
}

/// A wearable device data pull
#[derive(Debug, Clone, Default)]
pub struct WearableSync {
    pub provider: String,
    pub device_id: String,
    pub patient_id: Option<String>,
    pub records_synced: u64,
    pub success: bool,
    pub duration_ms: Option<f64>,
    pub error: Option<String>,
    pub metadata: Metadata,
}

impl WearableSync {
    pub fn new(provider: impl Into<String>, device_id: impl Into<String>, success: bool) -> Self {
        Self {
            provider: provider.into(),
            device_id: device_id.into(),
            success,
            ..Self::default()
        }
    }

    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_records(mut self, records: u64) -> Self {
        self.records_synced = records;
        self
    }

    pub fn with_duration(mut self, millis: f64) -> Self {
        self.duration_ms = Some(millis);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub(crate) fn to_metadata(&self) -> Metadata {
        let mut meta = self.metadata.clone();
        meta.extend(object(json!({
            "provider": self.provider,
            "deviceId": self.device_id,
            "recordsSynced": self.records_synced,
            "success": self.success,
        })));
        insert_opt(&mut meta, "patientId", self.patient_id.as_deref().map(Value::from));
        insert_opt(&mut meta, "duration", self.duration_ms.map(Value::from));
        insert_opt(&mut meta, "error", self.error.as_deref().map(Value::from));
        meta
    }

    pub(crate) fn failure_message(&self) -> String {
        match &self.error {
            Some(e) => format!("Wearable sync failed for {}: {}", self.provider, e),
            None => format!("Wearable sync failed for {}", self.provider),
        }
    }
}

pub(crate) fn object(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        _ => Metadata::new(),
    }
}

fn insert_opt(meta: &mut Metadata, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        meta.insert(key.to_string(), value);
    }
}
