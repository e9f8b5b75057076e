use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;

use crate::models::internal::{Conversation, ConversationSummary, MessageStamp, SenderType};
use crate::storage::gateway::{DataGateway, GatewayError, TableQuery, CONVERSATIONS, MESSAGES};

/// Derives the freshness flags of one conversation from its latest message.
pub fn summarize(conversation: Conversation, latest: Option<MessageStamp>) -> ConversationSummary {
    let has_response = latest
        .as_ref()
        .is_some_and(|m| m.sender_type == SenderType::Assistant);
    let last_message_time = latest
        .map(|m| m.created_at)
        .unwrap_or(conversation.updated_at);

    ConversationSummary {
        conversation,
        has_response,
        last_message_time,
    }
}

/// Re-reads the owner's conversations and their latest message.
pub struct FreshnessTracker {
    gateway: Arc<dyn DataGateway>,
    issued: AtomicU64,
}

impl FreshnessTracker {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self {
            gateway,
            issued: AtomicU64::new(0),
        }
    }

    /// Sequence number for the next refresh.
    pub fn next_ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Lists conversations newest first. The per-conversation lookups run
    /// concurrently; any failed lookup fails the whole collection.
    pub async fn collect(&self, owner_id: &str) -> Result<Vec<ConversationSummary>, GatewayError> {
        let conversations: Vec<Conversation> = self
            .gateway
            .query(
                TableQuery::from(CONVERSATIONS)
                    .eq("user_id", owner_id)
                    .order("updated_at", false),
            )
            .await?
            .decode()?;

        let latest = try_join_all(conversations.iter().map(|c| self.latest_message(&c.id))).await?;

        Ok(conversations
            .into_iter()
            .zip(latest)
            .map(|(conversation, latest)| summarize(conversation, latest))
            .collect())
    }

    async fn latest_message(
        &self,
        conversation_id: &str,
    ) -> Result<Option<MessageStamp>, GatewayError> {
        let stamps: Vec<MessageStamp> = self
            .gateway
            .query(
                TableQuery::from(MESSAGES)
                    .select("sender_type,created_at")
                    .eq("conversation_id", conversation_id)
                    .order("created_at", false)
                    .limit(1),
            )
            .await?
            .decode()?;

        Ok(stamps.into_iter().next())
    }
}

/// The conversation list as last applied, plus the sequence that produced it.
#[derive(Debug, Clone, Default)]
pub struct ConversationBoard {
    conversations: Vec<ConversationSummary>,
    issued: u64,
    applied: u64,
    refreshing: bool,
    loaded: bool,
}

impl ConversationBoard {
    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn find(&self, id: &str) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id() == id)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// True until the first refresh settles.
    pub fn is_loading(&self) -> bool {
        !self.loaded
    }

    pub fn begin(&mut self, seq: u64) {
        self.issued = self.issued.max(seq);
        self.refreshing = true;
    }

    /// Replaces the whole list unless a newer refresh already landed.
    pub fn apply(&mut self, seq: u64, conversations: Vec<ConversationSummary>) -> bool {
        self.settle(seq);
        if seq <= self.applied {
            return false;
        }
        self.conversations = conversations;
        self.applied = seq;
        true
    }

    /// Records a failed or dropped refresh: the list is kept.
    pub fn fail(&mut self, seq: u64) {
        self.settle(seq);
    }

    fn settle(&mut self, seq: u64) {
        self.loaded = true;
        // The flag belongs to the most recent refresh.
        if seq >= self.issued {
            self.refreshing = false;
        }
    }
}
