//! Session registry: one session per user, created on first contact

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{StreamExt, stream::FuturesUnordered};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::state::Session;
use super::supervisor::StopOutcome;
use super::{ChatId, UserId};
use crate::config::Config;
use crate::journal::EventJournal;
use crate::notify::Notifier;
use crate::stream::{Classifier, PatternClassifier};

/// Shared collaborators handed to every session
pub struct SessionContext {
    pub config: Config,
    pub classifier: Arc<dyn Classifier>,
    pub notifier: Notifier,
    pub journal: EventJournal,
}

impl SessionContext {
    /// Build the context from configuration: pattern classifier and optional journal
    pub fn from_config(config: Config, notifier: Notifier) -> Result<Self> {
        let classifier = PatternClassifier::new(config.stream.prompt_keywords.as_slice())
            .context("Invalid prompt keywords")?;
        let journal = if config.journal.enabled {
            EventJournal::new(&config.journal.dir)
        } else {
            EventJournal::disabled()
        };

        Ok(Self {
            config,
            classifier: Arc::new(classifier),
            notifier,
            journal,
        })
    }
}

/// Listing entry for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub user_id: UserId,
    pub running: bool,
}

/// Owner of all sessions
pub struct SessionRegistry {
    ctx: Arc<SessionContext>,
    sessions: RwLock<BTreeMap<UserId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn from_config(config: Config, notifier: Notifier) -> Result<Self> {
        Ok(Self::new(SessionContext::from_config(config, notifier)?))
    }

    /// Return the user's session, creating it on first use
    pub async fn get_or_create(&self, user_id: UserId, chat_id: ChatId) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(&user_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id).or_insert_with(|| {
            debug!(user_id, chat_id, "creating session");
            Arc::new(Session::new(user_id, chat_id, Arc::clone(&self.ctx)))
        });
        Arc::clone(session)
    }

    pub async fn get(&self, user_id: UserId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    /// Summaries of every known session, ordered by user id
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            summaries.push(SessionSummary {
                user_id: session.user_id(),
                running: session.is_running().await,
            });
        }
        summaries
    }

    /// Stop every running tool concurrently. Returns how many were stopped.
    pub async fn shutdown_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut stops: FuturesUnordered<_> = sessions
            .into_iter()
            .map(|session| async move { session.stop().await })
            .collect();

        let mut stopped = 0;
        while let Some(outcome) = stops.next().await {
            if outcome == StopOutcome::Stopped {
                stopped += 1;
            }
        }

        info!(stopped, "all sessions shut down");
        stopped
    }

    pub fn notifier(&self) -> &Notifier {
        &self.ctx.notifier
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }
}
