// tests/integration/mod.rs

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use whatsapp_manager::models::internal::UserIdentity;
use whatsapp_manager::storage::gateway::{
    DataGateway, Filter, GatewayError, QueryResult, TableQuery, CLIENTS,
};
use whatsapp_manager::sync::{SyncSettings, SyncViewModel};

// ============================================
// Public modules (test files)
// ============================================
pub mod clients;

pub const OWNER: &str = "owner-1";

// ============================================
// In-memory gateway
// ============================================

/// Evaluates [`TableQuery`]s against rows held in memory, the way the hosted
/// store would: owner/eq filters, case-insensitive substring, order, range,
/// exact count.
pub struct MemoryGateway {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    user: Mutex<Option<UserIdentity>>,
    failing: AtomicBool,
    log: Mutex<Vec<TableQuery>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            user: Mutex::new(Some(UserIdentity {
                id: OWNER.to_string(),
                email: Some("owner@example.com".to_string()),
            })),
            failing: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, table: &str, row: Value) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sign_out(&self) {
        *self.user.lock().unwrap() = None;
    }

    pub fn queries_on(&self, table: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.table == table)
            .count()
    }

    pub fn total_queries(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { column, value } => text(&row[column.as_str()]) == *value,
        Filter::ILike { column, needle } => text(&row[column.as_str()])
            .to_lowercase()
            .contains(&needle.to_lowercase()),
    }
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn query(&self, query: TableQuery) -> Result<QueryResult, GatewayError> {
        self.log.lock().unwrap().push(query.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::ApiError {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }

        let mut rows: Vec<Value> = self
            .tables
            .lock()
            .unwrap()
            .get(&query.table)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = text(&a[order.column.as_str()]).cmp(&text(&b[order.column.as_str()]));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        let total = query.count_exact.then_some(rows.len() as u64);

        let rows = match (query.range, query.limit) {
            (Some(range), _) => rows
                .into_iter()
                .skip(range.from as usize)
                .take(range.len() as usize)
                .collect(),
            (None, Some(limit)) => rows.into_iter().take(limit as usize).collect(),
            (None, None) => rows,
        };

        Ok(QueryResult { rows, total })
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::ApiError {
                status: 503,
                message: "gateway unavailable".to_string(),
            });
        }

        let mut row = record;
        if table == CLIENTS {
            row["FECHA"] = json!(chrono::Utc::now().to_rfc3339());
            row["ESTADO MENSAJE"] = json!("PENDIENTE");
        }
        self.push(table, row.clone());
        Ok(row)
    }

    async fn current_user(&self) -> Result<Option<UserIdentity>, GatewayError> {
        Ok(self.user.lock().unwrap().clone())
    }
}

// ============================================
// Shared Test Helpers
// ============================================

pub fn client_row(n: usize, name: &str, owner: &str) -> Value {
    json!({
        "Nº ORDEN": format!("{}", 1000 + n),
        "NOMBRE COMPLETO": name,
        "TELEFONO": format!("600{:06}", n),
        "ESTADO": "ACTIVO",
        "ESTADO MENSAJE": "ENVIADO",
        "FECHA": format!("2024-01-01T{:02}:{:02}:00+00:00", n / 60, n % 60),
        "user_id": owner,
    })
}

/// `count` clients named `Client 1..=count` for the test owner, plus a few
/// belonging to somebody else.
pub fn seed_clients(gateway: &MemoryGateway, count: usize) {
    for n in 1..=count {
        gateway.push(CLIENTS, client_row(n, &format!("Client {}", n), OWNER));
    }
    for n in 1..=3 {
        gateway.push(CLIENTS, client_row(500 + n, &format!("Foreign {}", n), "owner-2"));
    }
}

pub fn conversation_row(id: &str, updated_at: &str) -> Value {
    json!({
        "id": id,
        "title": null,
        "user_id": OWNER,
        "created_at": "2024-05-01T08:00:00+00:00",
        "updated_at": updated_at,
    })
}

pub fn message_row(id: u64, conversation_id: &str, sender: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "conversation_id": conversation_id,
        "sender_type": sender,
        "content": format!("message {}", id),
        "created_at": created_at,
    })
}

pub fn model_with(gateway: Arc<dyn DataGateway>) -> SyncViewModel {
    SyncViewModel::new(gateway, SyncSettings::default())
}

pub fn model_refreshing_every(gateway: Arc<dyn DataGateway>, secs: u64) -> SyncViewModel {
    SyncViewModel::new(
        gateway,
        SyncSettings {
            refresh_interval: Duration::from_secs(secs),
            ..SyncSettings::default()
        },
    )
}

pub fn names(clients: &[whatsapp_manager::Client]) -> Vec<String> {
    clients.iter().map(|c| c.full_name.clone()).collect()
}

// ============================================
// Gated gateway
// ============================================

/// Wraps a [`MemoryGateway`] and can park the next query after it has been
/// evaluated, so its (by then stale) result is delivered only on release.
pub struct GatedGateway {
    pub inner: Arc<MemoryGateway>,
    gate: Mutex<Option<Arc<Notify>>>,
    parked: AtomicBool,
}

impl GatedGateway {
    pub fn new(inner: Arc<MemoryGateway>) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
            parked: AtomicBool::new(false),
        }
    }

    /// Parks the next query; release it with `notify_one` on the returned handle.
    pub fn hold_next(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        self.parked.store(false, Ordering::SeqCst);
        notify
    }

    /// Yields until the held query is parked.
    pub async fn wait_parked(&self) {
        while !self.parked.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl DataGateway for GatedGateway {
    async fn query(&self, query: TableQuery) -> Result<QueryResult, GatewayError> {
        let gate = self.gate.lock().unwrap().take();
        let result = self.inner.query(query).await;
        if let Some(gate) = gate {
            self.parked.store(true, Ordering::SeqCst);
            gate.notified().await;
        }
        result
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, GatewayError> {
        self.inner.insert(table, record).await
    }

    async fn current_user(&self) -> Result<Option<UserIdentity>, GatewayError> {
        self.inner.current_user().await
    }
}
