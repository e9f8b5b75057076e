use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use crate::models::internal::{AuthEvent, Session, UserIdentity};
use crate::storage::gateway::{
    DataGateway, Filter, GatewayError, IdentityProvider, QueryResult, TableQuery,
};

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// HTTP client for a PostgREST + GoTrue style hosted backend.
pub struct RestGateway {
    base_url: String,
    anon_key: String,
    client: Client,
    session: RwLock<Option<Session>>,
    auth_events: broadcast::Sender<AuthEvent>,
}

impl RestGateway {
    pub fn new(base_url: String, anon_key: String) -> Self {
        let (auth_events, _) = broadcast::channel(16);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            client: Client::new(),
            session: RwLock::new(None),
            auth_events,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, operation: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, operation)
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Adds the project key and the bearer token of the current session,
    /// falling back to the anon key when signed out.
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());

        request
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn store_session(&self, session: Session) {
        let user = session.user.clone();
        *self.session.write().await = Some(session);
        tracing::info!("Signed in as {}", user.id);
        // No subscribers is not an error.
        let _ = self.auth_events.send(AuthEvent::SignedIn(user));
    }
}

async fn api_error(response: Response) -> GatewayError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    GatewayError::ApiError { status, message }
}

/// Column names with spaces or non-ASCII characters must be quoted in
/// `order` clauses.
fn quote_column(column: &str) -> String {
    if column
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        column.to_string()
    } else {
        format!("\"{}\"", column)
    }
}

/// Builds the query-string pairs for a [`TableQuery`].
pub fn query_params(query: &TableQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.select.clone())];

    for filter in &query.filters {
        match filter {
            Filter::Eq { column, value } => {
                params.push((column.clone(), format!("eq.{}", value)));
            }
            Filter::ILike { column, needle } => {
                params.push((column.clone(), format!("ilike.%{}%", needle)));
            }
        }
    }

    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push((
            "order".to_string(),
            format!("{}.{}", quote_column(&order.column), direction),
        ));
    }

    match (query.range, query.limit) {
        (Some(range), _) => {
            params.push(("offset".to_string(), range.from.to_string()));
            params.push(("limit".to_string(), range.len().to_string()));
        }
        (None, Some(limit)) => params.push(("limit".to_string(), limit.to_string())),
        (None, None) => {}
    }

    params
}

/// Extracts the total from a `Content-Range` header such as `0-9/25` or `*/0`.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl DataGateway for RestGateway {
    async fn query(&self, query: TableQuery) -> Result<QueryResult, GatewayError> {
        let url = self.table_url(&query.table);
        let mut request = self.client.get(&url).query(&query_params(&query));
        if query.count_exact {
            request = request.header("Prefer", "count=exact");
        }

        let response = self.authorized(request).await.send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let total = if query.count_exact {
            let header = response
                .headers()
                .get("content-range")
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| {
                    GatewayError::InvalidResponse("missing Content-Range header".to_string())
                })?;
            let total = parse_content_range(header).ok_or_else(|| {
                GatewayError::InvalidResponse(format!("unparseable Content-Range: {}", header))
            })?;
            Some(total)
        } else {
            None
        };

        let rows: Vec<Value> = response.json().await?;
        tracing::trace!("Fetched {} rows from {}", rows.len(), query.table);

        Ok(QueryResult { rows, total })
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, GatewayError> {
        let url = self.table_url(table);
        let request = self
            .client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(&vec![record]);

        let response = self.authorized(request).await.send().await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let mut rows: Vec<Value> = response.json().await?;
                if rows.is_empty() {
                    return Err(GatewayError::InvalidResponse(format!(
                        "insert into {} returned no rows",
                        table
                    )));
                }
                tracing::debug!("Inserted row into {}", table);
                Ok(rows.swap_remove(0))
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn current_user(&self) -> Result<Option<UserIdentity>, GatewayError> {
        if self.session.read().await.is_none() {
            return Ok(None);
        }

        let request = self.client.get(self.auth_url("user"));
        let response = self.authorized(request).await.send().await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::warn!("Session rejected by identity provider");
                Ok(None)
            }
            _ => Err(api_error(response).await),
        }
    }
}

#[async_trait]
impl IdentityProvider for RestGateway {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, GatewayError> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&PasswordCredentials { email, password });

        let response = self.authorized(request).await.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let session: Session = response.json().await?;
        self.store_session(session.clone()).await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserIdentity>, GatewayError> {
        let request = self
            .client
            .post(self.auth_url("signup"))
            .json(&PasswordCredentials { email, password });

        let response = self.authorized(request).await.send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        // With email confirmation enabled the provider answers with the bare
        // user; otherwise it answers with a full session.
        let body: Value = response.json().await?;
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            let user = session.user.clone();
            self.store_session(session).await;
            return Ok(Some(user));
        }
        if body.get("id").is_some() {
            return Ok(Some(serde_json::from_value(body)?));
        }
        Ok(None)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        let had_session = self.session.read().await.is_some();
        if !had_session {
            return Ok(());
        }

        let request = self.client.post(self.auth_url("logout"));
        let result = self.authorized(request).await.send().await;

        *self.session.write().await = None;
        let _ = self.auth_events.send(AuthEvent::SignedOut);
        tracing::info!("Signed out");

        let response = result?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }
}
