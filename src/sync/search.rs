use crate::sync::pagination::{PageTicket, PaginationState};

/// Active filter term of the client registry.
///
/// A new term is only taken on explicit submission; every submission
/// restarts the pagination window at page 1.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    term: String,
}

impl SearchState {
    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_active(&self) -> bool {
        !self.term.trim().is_empty()
    }

    pub fn set_term(&mut self, term: &str, pagination: &mut PaginationState) -> PageTicket {
        self.term = term.to_string();
        pagination.reset(term);
        pagination.begin(1)
    }

    pub fn clear(&mut self, pagination: &mut PaginationState) -> PageTicket {
        self.set_term("", pagination)
    }
}
