use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

/// Status every new client starts with. Callers cannot override it.
pub const DEFAULT_CLIENT_STATUS: &str = "Pendiente de contactar con";

/// Row of the `conversations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conversation plus the freshness flags recomputed on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub has_response: bool,
    pub last_message_time: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    /// Title when set, otherwise the channel address.
    pub fn display_name(&self) -> &str {
        self.conversation
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.conversation.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub conversation_id: String,
    pub sender_type: SenderType,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Projection used by the freshness lookups (`select=sender_type,created_at`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageStamp {
    pub sender_type: SenderType,
    pub created_at: DateTime<Utc>,
}

/// Row of the `clientes` table. Column names follow the store's headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "Nº ORDEN", deserialize_with = "string_or_number")]
    pub order_number: String,
    #[serde(rename = "NOMBRE COMPLETO", default)]
    pub full_name: String,
    #[serde(rename = "CONTRATO", default)]
    pub contract_id: Option<String>,
    #[serde(rename = "SERVICIO", default)]
    pub service_type: Option<String>,
    #[serde(rename = "TELEFONO", default)]
    pub phone: Option<String>,
    #[serde(rename = "TELEFONO FIJO", default)]
    pub landline: Option<String>,
    #[serde(rename = "DIRECCION", default)]
    pub address: Option<String>,
    #[serde(rename = "CODIGO POSTAL", default)]
    pub postal_code: Option<String>,
    #[serde(rename = "MUNICIPIO", default)]
    pub municipality: Option<String>,
    #[serde(rename = "ESTADO", default)]
    pub status: Option<String>,
    #[serde(rename = "ESTADO MENSAJE", default)]
    pub message_status: Option<String>,
    #[serde(rename = "FECHA", default)]
    pub registered_on: Option<String>,
    #[serde(rename = "FECHA ENVIO PLANTILLA", default)]
    pub template_sent_on: Option<String>,
}

/// Input of the add-client form.
///
/// Has no status field; new records always carry [`DEFAULT_CLIENT_STATUS`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct NewClient {
    #[validate(custom(function = "not_blank", message = "order number is required"))]
    pub order_number: String,
    #[validate(custom(function = "not_blank", message = "full name is required"))]
    pub full_name: String,
    pub contract_id: Option<String>,
    pub service_type: Option<String>,
    pub phone: Option<String>,
    pub landline: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub municipality: Option<String>,
}

impl NewClient {
    pub fn new(order_number: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            order_number: order_number.into(),
            full_name: full_name.into(),
            ..Default::default()
        }
    }

    /// Row payload for the `clientes` table, tagged with the owning user.
    pub fn into_record(self, owner_id: &str) -> Value {
        let mut record = serde_json::Map::new();
        record.insert("Nº ORDEN".into(), Value::String(self.order_number));
        record.insert("NOMBRE COMPLETO".into(), Value::String(self.full_name));
        record.insert("ESTADO".into(), Value::String(DEFAULT_CLIENT_STATUS.into()));
        record.insert("user_id".into(), Value::String(owner_id.to_string()));

        let optional = [
            ("CONTRATO", self.contract_id),
            ("SERVICIO", self.service_type),
            ("TELEFONO", self.phone),
            ("TELEFONO FIJO", self.landline),
            ("DIRECCION", self.address),
            ("CODIGO POSTAL", self.postal_code),
            ("MUNICIPIO", self.municipality),
        ];
        for (column, value) in optional {
            if let Some(value) = value {
                record.insert(column.into(), Value::String(value));
            }
        }

        Value::Object(record)
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: UserIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(UserIdentity),
    SignedOut,
}

/// Counters rendered above the dashboard tabs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_conversations: usize,
    pub with_response: usize,
    pub awaiting_response: usize,
    pub total_clients: u64,
}

impl DashboardStats {
    pub fn collect(conversations: &[ConversationSummary], total_clients: u64) -> Self {
        let with_response = conversations.iter().filter(|c| c.has_response).count();
        Self {
            total_conversations: conversations.len(),
            with_response,
            awaiting_response: conversations.len() - with_response,
            total_clients,
        }
    }
}

// Identifiers arrive as text or as integers depending on the table.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {}",
            other
        ))),
    }
}
