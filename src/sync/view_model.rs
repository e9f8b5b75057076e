use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use validator::Validate;

use crate::models::internal::{
    Client, ConversationSummary, DashboardStats, Message, NewClient, UserIdentity,
};
use crate::storage::gateway::{DataGateway, GatewayError, TableQuery, CLIENTS, MESSAGES};
use crate::sync::freshness::{ConversationBoard, FreshnessTracker};
use crate::sync::pagination::{fetch_client_page, PageTicket, PaginationState};
use crate::sync::search::SearchState;
use crate::sync::{SyncError, SyncSettings};

#[derive(Debug, Clone)]
struct OpenConversation {
    id: String,
    summary: Option<ConversationSummary>,
    messages: Vec<Message>,
    loading: bool,
}

struct ViewState {
    board: ConversationBoard,
    pagination: PaginationState,
    search: SearchState,
    open: Option<OpenConversation>,
    last_error: Option<String>,
    torn_down: bool,
}

/// Everything the presentation layer renders, copied out of the view-model.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub loading_conversations: bool,
    pub refreshing_conversations: bool,
    pub clients: Vec<Client>,
    pub clients_page: u64,
    pub total_clients: u64,
    pub has_more_clients: bool,
    pub loading_clients: bool,
    pub loading_more_clients: bool,
    pub search_term: String,
    pub open_conversation_id: Option<String>,
    pub open_conversation: Option<ConversationSummary>,
    pub messages: Vec<Message>,
    pub loading_messages: bool,
    pub last_error: Option<String>,
    pub stats: DashboardStats,
}

struct Ticker {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    gateway: Arc<dyn DataGateway>,
    freshness: FreshnessTracker,
    settings: SyncSettings,
    state: RwLock<ViewState>,
    ticker: Mutex<Option<Ticker>>,
}

/// Local view of the remote conversations and client registry.
///
/// All reads and writes against the gateway go through the operations on
/// this type. State is only mutated by their completion handlers.
#[derive(Clone)]
pub struct SyncViewModel {
    inner: Arc<Inner>,
}

impl SyncViewModel {
    pub fn new(gateway: Arc<dyn DataGateway>, settings: SyncSettings) -> Self {
        let state = ViewState {
            board: ConversationBoard::default(),
            pagination: PaginationState::new(settings.page_size),
            search: SearchState::default(),
            open: None,
            last_error: None,
            torn_down: false,
        };

        Self {
            inner: Arc::new(Inner {
                freshness: FreshnessTracker::new(gateway.clone()),
                gateway,
                settings,
                state: RwLock::new(state),
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub async fn is_running(&self) -> bool {
        self.inner.ticker.lock().await.is_some()
    }

    /// Loads conversations and the first client page, then keeps refreshing
    /// conversations on the configured interval until [`stop`](Self::stop).
    pub async fn start(&self) {
        let mut ticker = self.inner.ticker.lock().await;
        if ticker.is_some() {
            tracing::warn!("Sync view-model already started");
            return;
        }

        self.inner.state.write().await.torn_down = false;

        // Failures are already logged and kept as last_error.
        let _ = tokio::join!(self.refresh_conversations(), self.set_search_term(""));

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_refresh_loop(
            Arc::downgrade(&self.inner),
            self.inner.settings.refresh_interval,
            shutdown_rx,
        ));
        *ticker = Some(Ticker { shutdown, handle });

        tracing::info!(
            "Sync view-model started (refresh every {}s, {} clients per page)",
            self.inner.settings.refresh_interval.as_secs(),
            self.inner.settings.page_size
        );
    }

    /// Cancels the refresh ticker. Requests still in flight are left to
    /// finish but their results are dropped.
    pub async fn stop(&self) {
        let ticker = self.inner.ticker.lock().await.take();
        self.inner.state.write().await.torn_down = true;

        if let Some(ticker) = ticker {
            let _ = ticker.shutdown.send(());
            if let Err(e) = ticker.handle.await {
                tracing::warn!("Refresh loop ended abnormally: {}", e);
            }
            tracing::info!("Sync view-model stopped");
        }
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let state = self.inner.state.read().await;
        let conversations = state.board.conversations().to_vec();
        let stats = DashboardStats::collect(&conversations, state.pagination.total());
        let open = state.open.as_ref();

        ViewSnapshot {
            loading_conversations: state.board.is_loading(),
            refreshing_conversations: state.board.is_refreshing(),
            conversations,
            clients: state.pagination.accumulated().to_vec(),
            clients_page: state.pagination.page(),
            total_clients: state.pagination.total(),
            has_more_clients: state.pagination.has_more(),
            loading_clients: state.pagination.is_loading(),
            loading_more_clients: state.pagination.is_loading_more(),
            search_term: state.search.term().to_string(),
            open_conversation_id: open.map(|o| o.id.clone()),
            open_conversation: open.and_then(|o| o.summary.clone()),
            messages: open.map(|o| o.messages.clone()).unwrap_or_default(),
            loading_messages: open.is_some_and(|o| o.loading),
            last_error: state.last_error.clone(),
            stats,
        }
    }

    /// Re-reads every conversation with its freshness flags and swaps the
    /// list in one step.
    pub async fn refresh_conversations(&self) -> Result<(), SyncError> {
        let seq = self.inner.freshness.next_ticket();
        self.inner.state.write().await.board.begin(seq);

        let result = async {
            let owner = self.owner().await?;
            Ok::<_, SyncError>(self.inner.freshness.collect(&owner.id).await?)
        }
        .await;

        let mut state = self.inner.state.write().await;
        if state.torn_down {
            state.board.fail(seq);
            tracing::debug!("Dropping refresh #{} after teardown", seq);
            return Ok(());
        }

        match result {
            Ok(conversations) => {
                let count = conversations.len();
                if state.board.apply(seq, conversations) {
                    tracing::debug!("Refresh #{} applied {} conversations", seq, count);
                } else {
                    tracing::debug!("Refresh #{} superseded by a newer one", seq);
                }
                Ok(())
            }
            Err(e) => {
                state.board.fail(seq);
                tracing::warn!("Error fetching conversations: {}", e);
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Submits a search term: back to page 1, window cleared, first page
    /// fetched.
    pub async fn set_search_term(&self, term: &str) -> Result<(), SyncError> {
        let ticket = {
            let mut state = self.inner.state.write().await;
            let ViewState {
                search, pagination, ..
            } = &mut *state;
            search.set_term(term, pagination)
        };
        self.run_page_fetch(ticket).await
    }

    pub async fn clear_search(&self) -> Result<(), SyncError> {
        self.set_search_term("").await
    }

    /// Fetches the next page under the current term.
    pub async fn load_more_clients(&self) -> Result<(), SyncError> {
        let ticket = {
            let mut state = self.inner.state.write().await;
            if state.pagination.is_loading_more() {
                return Err(SyncError::LoadInFlight);
            }
            if !state.pagination.has_more() {
                return Err(SyncError::NothingToLoad);
            }
            let next = state.pagination.page() + 1;
            state.pagination.begin(next)
        };
        self.run_page_fetch(ticket).await
    }

    /// Validates and inserts a client for the signed-in user, then returns
    /// the registry to an unfiltered first page.
    pub async fn add_client(&self, client: NewClient) -> Result<Client, SyncError> {
        if let Err(errors) = client.validate() {
            let mut fields: Vec<_> = errors.field_errors().keys().map(|k| k.to_string()).collect();
            fields.sort();
            return Err(SyncError::Validation(format!(
                "missing required field(s): {}",
                fields.join(", ")
            )));
        }

        let inserted = async {
            let owner = self.owner().await?;
            let row = self
                .inner
                .gateway
                .insert(CLIENTS, client.into_record(&owner.id))
                .await?;
            Ok::<Client, SyncError>(
                serde_json::from_value(row).map_err(GatewayError::from)?,
            )
        }
        .await;

        let inserted = match inserted {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::error!("Error adding client: {}", e);
                self.inner.state.write().await.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        tracing::info!("Added client {}", inserted.order_number);

        if let Err(e) = self.clear_search().await {
            tracing::warn!("Client added but registry reload failed: {}", e);
        }

        Ok(inserted)
    }

    /// Loads the full history of a conversation, oldest first. A response
    /// for a conversation that is no longer open is dropped.
    pub async fn open_conversation(&self, id: &str) -> Result<(), SyncError> {
        {
            let mut state = self.inner.state.write().await;
            let summary = state.board.find(id).cloned();
            state.open = Some(OpenConversation {
                id: id.to_string(),
                summary,
                messages: Vec::new(),
                loading: true,
            });
        }

        let result = self
            .inner
            .gateway
            .query(
                TableQuery::from(MESSAGES)
                    .eq("conversation_id", id)
                    .order("created_at", true),
            )
            .await
            .and_then(|r| r.decode::<Message>());

        let mut guard = self.inner.state.write().await;
        let state = &mut *guard;
        let Some(open) = state.open.as_mut().filter(|o| o.id == id) else {
            tracing::debug!("Conversation {} closed before its messages arrived", id);
            return Ok(());
        };
        open.loading = false;
        if state.torn_down {
            return Ok(());
        }

        match result {
            Ok(messages) => {
                open.messages = messages;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Error fetching messages for {}: {}", id, e);
                state.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    pub async fn close_conversation(&self) {
        self.inner.state.write().await.open = None;
    }

    async fn owner(&self) -> Result<UserIdentity, SyncError> {
        self.inner
            .gateway
            .current_user()
            .await?
            .ok_or(SyncError::NotAuthenticated)
    }

    async fn run_page_fetch(&self, ticket: PageTicket) -> Result<(), SyncError> {
        let range = self.inner.state.read().await.pagination.range(ticket.page);

        let result = async {
            let owner = self.owner().await?;
            Ok::<_, SyncError>(
                fetch_client_page(self.inner.gateway.as_ref(), &owner.id, range, &ticket.term)
                    .await?,
            )
        }
        .await;

        let mut state = self.inner.state.write().await;
        if state.torn_down {
            state.pagination.fail(&ticket);
            tracing::debug!("Dropping client page {} after teardown", ticket.page);
            return Ok(());
        }

        match result {
            Ok(page) => {
                if !state.pagination.apply(&ticket, page) {
                    tracing::debug!(
                        "Client page {} (#{}) superseded by a newer fetch",
                        ticket.page,
                        ticket.seq()
                    );
                }
                Ok(())
            }
            Err(e) => {
                state.pagination.fail(&ticket);
                tracing::warn!("Error fetching clients: {}", e);
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

async fn run_refresh_loop(
    inner: Weak<Inner>,
    period: std::time::Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let model = SyncViewModel { inner };
                // Detached so a slow refresh never delays shutdown.
                tokio::spawn(async move {
                    if let Err(e) = model.refresh_conversations().await {
                        tracing::debug!("Scheduled refresh failed: {}", e);
                    }
                });
            }
            _ = shutdown.recv() => {
                tracing::debug!("Refresh loop shutting down");
                break;
            }
        }
    }
}
