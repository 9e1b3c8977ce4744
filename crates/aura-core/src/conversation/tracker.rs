//! Per-thread reply-streak tracking.
//!
//! `ConversationTracker::evaluate` is the first thing every interaction goes
//! through. It runs before any model call and is the guard against runaway
//! reply loops: once a thread is stopped it stays stopped.

use chrono::Utc;

use aura_types::conversation::{ConversationState, DisengageReason, Verdict};
use aura_types::error::RepositoryError;

use crate::repository::conversation::ConversationRepository;

/// Outcome of evaluating one interaction against its thread.
///
/// The state change is only persisted by [`ConversationTracker::commit`],
/// once the interaction settles. An attempt that fails and is retried on a
/// later poll leaves the streak untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEvaluation {
    pub verdict: Verdict,
    pending: Option<ConversationState>,
}

pub struct ConversationTracker<R: ConversationRepository> {
    repo: R,
    streak_limit: u32,
}

impl<R: ConversationRepository> ConversationTracker<R> {
    pub fn new(repo: R, streak_limit: u32) -> Self {
        Self {
            repo,
            streak_limit: streak_limit.max(1),
        }
    }

    /// Decide whether the agent may keep talking in a thread.
    ///
    /// Order matters: a stopped thread short-circuits everything, a stop
    /// request wins over a direct mention, and a direct mention resets the
    /// streak. A thread first seen through an indirect reply starts tracked
    /// at zero; only later indirect replies count toward the limit.
    #[tracing::instrument(name = "evaluate_thread", skip(self), fields(limit = self.streak_limit))]
    pub async fn evaluate(
        &self,
        thread_root_uri: &str,
        is_direct_mention: bool,
        stop_requested: bool,
    ) -> Result<ThreadEvaluation, RepositoryError> {
        let existing = self.repo.get_state(thread_root_uri).await?;

        if existing.as_ref().is_some_and(|s| s.stopped) {
            tracing::debug!("Thread already stopped");
            return Ok(ThreadEvaluation {
                verdict: Verdict::Disengage(DisengageReason::AlreadyStopped),
                pending: None,
            });
        }

        let tracked = existing.is_some();
        let mut state = existing.unwrap_or_else(|| ConversationState::new(thread_root_uri));
        state.updated_at = Utc::now();

        let verdict = if stop_requested {
            state.stopped = true;
            Verdict::Disengage(DisengageReason::StopRequested)
        } else if is_direct_mention {
            state.streak_count = 0;
            Verdict::Continue
        } else if tracked {
            state.streak_count += 1;
            if state.streak_count >= self.streak_limit {
                state.stopped = true;
                Verdict::Disengage(DisengageReason::StreakLimit)
            } else {
                Verdict::Continue
            }
        } else {
            Verdict::Continue
        };

        if let Verdict::Disengage(reason) = verdict {
            tracing::info!(%reason, streak = state.streak_count, "Disengaging from thread");
        }
        Ok(ThreadEvaluation {
            verdict,
            pending: Some(state),
        })
    }

    /// Persist the state change of a settled interaction.
    pub async fn commit(&self, evaluation: &ThreadEvaluation) -> Result<(), RepositoryError> {
        match &evaluation.pending {
            Some(state) => self.repo.save_state(state).await,
            None => Ok(()),
        }
    }
}
