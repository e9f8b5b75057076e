use crate::models::internal::Client;
use crate::storage::gateway::{DataGateway, GatewayError, RowRange, TableQuery, CLIENTS};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

const OWNER_COLUMN: &str = "user_id";
const NAME_COLUMN: &str = "NOMBRE COMPLETO";
const CREATED_COLUMN: &str = "FECHA";

/// A page fetch that has been issued but not yet applied.
///
/// `seq` grows with every issued fetch; a completion older than the last
/// applied one is ignored. `epoch` is the reset generation the fetch was
/// issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    pub page: u64,
    pub term: String,
    seq: u64,
    epoch: u64,
}

impl PageTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// One successful response for a ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPage {
    pub rows: Vec<Client>,
    pub total: u64,
}

/// Paginated, append-only window over the client registry.
#[derive(Debug, Clone)]
pub struct PaginationState {
    page: u64,
    page_size: u64,
    accumulated: Vec<Client>,
    total: u64,
    term: String,
    loading: bool,
    loading_more: bool,
    issued: u64,
    applied: u64,
    epoch: u64,
}

impl PaginationState {
    pub fn new(page_size: u64) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            accumulated: Vec::new(),
            total: 0,
            term: String::new(),
            loading: false,
            loading_more: false,
            issued: 0,
            applied: 0,
            epoch: 0,
        }
    }

    /// Starts a new window. Fetches issued before the reset are never
    /// applied, even when the term is unchanged.
    pub fn reset(&mut self, term: &str) {
        self.epoch += 1;
        self.page = 1;
        self.accumulated.clear();
        self.total = 0;
        self.term = term.to_string();
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn accumulated(&self) -> &[Client] {
        &self.accumulated
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn has_more(&self) -> bool {
        self.total > self.page * self.page_size
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    /// Zero-based inclusive row range of a 1-based page.
    pub fn range(&self, page: u64) -> RowRange {
        let from = (page.max(1) - 1) * self.page_size;
        RowRange {
            from,
            to: from + self.page_size - 1,
        }
    }

    /// Issues a ticket for `page` under the current term and raises the
    /// matching loading flag. State is otherwise untouched until
    /// [`apply`](Self::apply).
    pub fn begin(&mut self, page: u64) -> PageTicket {
        self.issued += 1;
        if page <= 1 {
            self.loading = true;
        } else {
            self.loading_more = true;
        }
        PageTicket {
            page: page.max(1),
            term: self.term.clone(),
            seq: self.issued,
            epoch: self.epoch,
        }
    }

    /// Applies a successful response. Page 1 replaces the accumulated rows,
    /// later pages append. Returns `false` when the ticket is stale (a newer
    /// fetch already landed, or the window was reset since it was issued).
    pub fn apply(&mut self, ticket: &PageTicket, page: ClientPage) -> bool {
        self.settle(ticket);

        if ticket.seq <= self.applied || ticket.epoch != self.epoch {
            return false;
        }

        if ticket.page == 1 {
            self.accumulated = page.rows;
        } else {
            self.accumulated.extend(page.rows);
        }
        self.page = ticket.page;
        self.total = page.total;
        self.applied = ticket.seq;
        true
    }

    /// Records a failed fetch: only the loading flags change.
    pub fn fail(&mut self, ticket: &PageTicket) {
        self.settle(ticket);
    }

    fn settle(&mut self, ticket: &PageTicket) {
        // Flags belong to the most recent fetch.
        if ticket.seq == self.issued {
            self.loading = false;
            self.loading_more = false;
        }
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Reads one page of the owner's clients, newest first, filtered by a
/// case-insensitive substring of the full name.
pub async fn fetch_client_page(
    gateway: &dyn DataGateway,
    owner_id: &str,
    range: RowRange,
    term: &str,
) -> Result<ClientPage, GatewayError> {
    let mut query = TableQuery::from(CLIENTS).eq(OWNER_COLUMN, owner_id);

    let needle = term.trim();
    if !needle.is_empty() {
        query = query.ilike(NAME_COLUMN, needle);
    }

    let result = gateway
        .query(
            query
                .order(CREATED_COLUMN, false)
                .range(range.from, range.to)
                .count_exact(),
        )
        .await?;

    let total = result.total.unwrap_or(0);
    let rows = result.decode()?;

    tracing::debug!(
        "Fetched clients {}..={} for term {:?}: {} rows of {}",
        range.from,
        range.to,
        needle,
        rows.len(),
        total
    );

    Ok(ClientPage { rows, total })
}
