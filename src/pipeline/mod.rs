use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::channel::{OutboundChannel, TelegramMessage, TelegramUpdate};
use crate::facts::FactStore;
use crate::facts::lifecycle::FactLifecycle;
use crate::history::HistoryRotator;
use crate::inference::InferenceProvider;
use crate::prompt;
use crate::store::DocumentStore;
use crate::types::{ChatRole, ContextAnalysis, StoredMessage};

/// Sent when a turn fails in a way the user would otherwise never hear
/// about. Memory-subsystem failures stay invisible; only generation and
/// transport failures degrade the reply.
const FALLBACK_REPLY: &str =
    "I'm sorry, something went wrong on my end. Could you send that again?";

const WELCOME_REPLY: &str = "Hello! I'm here to listen. Tell me what's on your mind, \
     and I'll remember what matters between our conversations.\n\n\
     Type /help to see available commands.";

const HELP_REPLY: &str = "Here are the available commands:\n\n\
     /start - Start or restart the conversation\n\
     /help - Show this help message\n\n\
     Just send me any message to talk.";

/// Ties idempotency, history, facts, and inference together for one
/// inbound update. One instance is shared by every spawned worker task;
/// no lock is held across store or inference awaits.
///
/// Two updates from the same user processed concurrently may each see the
/// history below threshold and skip or duplicate a rotation. Message
/// content stays correct (ids are transactional); only the rotation
/// trigger is eventually consistent under that race.
pub struct MessageProcessor {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn InferenceProvider>,
    channel: Arc<dyn OutboundChannel>,
    rotator: HistoryRotator,
    facts: FactStore,
    lifecycle: FactLifecycle,
}

impl MessageProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn InferenceProvider>,
        channel: Arc<dyn OutboundChannel>,
        rotator: HistoryRotator,
    ) -> Self {
        Self {
            facts: FactStore::new(Arc::clone(&store)),
            lifecycle: FactLifecycle::new(Arc::clone(&store)),
            store,
            provider,
            channel,
            rotator,
        }
    }

    /// Entry point for one spawned worker task. Any unexpected failure is
    /// caught here, logged with context, and turned into one apologetic
    /// reply; it never crashes the worker or blocks other users.
    pub async fn process(&self, update: TelegramUpdate) {
        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "update carries no message, ignoring");
            return;
        };
        let chat_id = message.chat.id;

        if let Err(e) = self.handle_message(&message).await {
            error!(
                update_id = update.update_id,
                chat_id, "message processing failed: {e:#}"
            );
            if let Err(send_err) = self.channel.send_text(chat_id, FALLBACK_REPLY).await {
                error!(chat_id, "could not deliver fallback reply: {send_err}");
            }
        }
    }

    async fn handle_message(&self, message: &TelegramMessage) -> anyhow::Result<()> {
        let user_id = message
            .from
            .as_ref()
            .map(|u| u.id.to_string())
            .unwrap_or_else(|| message.chat.id.to_string());

        let Some(text) = message.text.as_deref() else {
            self.channel
                .send_text(message.chat.id, "I can only read text messages for now.")
                .await?;
            return Ok(());
        };

        if text.starts_with('/') {
            return self.handle_command(&user_id, message.chat.id, text).await;
        }

        info!(user_id = %user_id, "processing message");

        // History as it stood before this turn; the current query travels
        // separately in both payloads.
        let history = self.store.history(&user_id).await.unwrap_or_else(|e| {
            error!(user_id = %user_id, "could not load history: {e}");
            Vec::new()
        });

        if let Err(e) = self.store.add_message(&user_id, ChatRole::User, text).await {
            // Keep going: a reply without a saved turn beats no reply.
            error!(user_id = %user_id, "failed to save user message: {e}");
        }

        let analysis = self.analyze_context(&user_id, text, &history).await;

        let reply = self.generate_reply(&user_id, text, &history, &analysis).await;
        self.channel.send_text(message.chat.id, &reply).await?;

        if let Err(e) = self
            .store
            .add_message(&user_id, ChatRole::Assistant, &reply)
            .await
        {
            error!(user_id = %user_id, "failed to save assistant reply: {e}");
        }

        self.memory_upkeep(&user_id, analysis).await;
        Ok(())
    }

    async fn handle_command(&self, user_id: &str, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let command = text.split_whitespace().next().unwrap_or(text);
        match command {
            "/start" => {
                self.channel.send_text(chat_id, WELCOME_REPLY).await?;
                match self.store.system_prompt(user_id).await {
                    Ok(None) => {
                        self.store
                            .set_system_prompt(user_id, prompt::DEFAULT_SYSTEM_PROMPT)
                            .await?;
                        info!(user_id, "seeded default system prompt for new user");
                    }
                    Ok(Some(_)) => {}
                    Err(e) => warn!(user_id, "could not check system prompt: {e}"),
                }
            }
            "/help" => {
                self.channel.send_text(chat_id, HELP_REPLY).await?;
            }
            other => {
                debug!(user_id, command = other, "unknown command");
                self.channel
                    .send_text(chat_id, "I don't know that command. Try /help.")
                    .await?;
            }
        }
        Ok(())
    }

    /// Run the companion analysis over the user's facts and recent
    /// history. Analysis is an enhancement: on failure the turn proceeds
    /// without context, references, or reorganisation.
    async fn analyze_context(
        &self,
        user_id: &str,
        text: &str,
        history: &[StoredMessage],
    ) -> Option<ContextAnalysis> {
        let facts = match self.facts.all(user_id).await {
            Ok(facts) => facts,
            Err(e) => {
                error!(user_id, "could not load facts for analysis: {e}");
                return None;
            }
        };

        let payload = prompt::analysis_payload(text, &facts, history);
        match self.provider.analyze(&payload).await {
            Ok(analysis) => {
                debug!(
                    user_id,
                    references = analysis.references.len(),
                    "context analysis completed"
                );
                Some(analysis)
            }
            Err(e) => {
                error!(user_id, "context analysis failed: {e}");
                None
            }
        }
    }

    /// Build the generation payload and call the main model. A generation
    /// failure degrades to the fallback reply rather than erroring the
    /// turn: the user always hears something.
    async fn generate_reply(
        &self,
        user_id: &str,
        text: &str,
        history: &[StoredMessage],
        analysis: &Option<ContextAnalysis>,
    ) -> String {
        let system_prompt = match self.store.system_prompt(user_id).await {
            Ok(Some(prompt)) => prompt,
            Ok(None) => {
                if let Err(e) = self
                    .store
                    .set_system_prompt(user_id, prompt::DEFAULT_SYSTEM_PROMPT)
                    .await
                {
                    warn!(user_id, "could not seed system prompt: {e}");
                }
                prompt::DEFAULT_SYSTEM_PROMPT.to_string()
            }
            Err(e) => {
                warn!(user_id, "could not load system prompt, using default: {e}");
                prompt::DEFAULT_SYSTEM_PROMPT.to_string()
            }
        };

        let summaries = self.store.summaries(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, "could not load summaries: {e}");
            Vec::new()
        });

        let analysis_summary = analysis.as_ref().map(|a| a.summary.as_str());
        let payload =
            prompt::generation_payload(&system_prompt, &summaries, analysis_summary, history, text);

        match self.provider.generate(&payload).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(user_id, "generation failed, sending fallback: {e}");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Post-reply memory maintenance. Every step is best-effort and
    /// invisible to the user: rotation, new facts, then the lifecycle in
    /// its required order (increment before merge, merge before prune),
    /// with decay covering the non-referenced remainder last.
    async fn memory_upkeep(&self, user_id: &str, analysis: Option<ContextAnalysis>) {
        if let Err(e) = self.rotator.manage(user_id).await {
            error!(user_id, "history rotation failed: {e}");
        }

        let Some(analysis) = analysis else {
            return;
        };

        if let Some(drafts) = analysis.factology {
            let saved = self.facts.save_all(user_id, drafts).await;
            if saved > 0 {
                debug!(user_id, saved, "stored new facts");
            }
        }

        self.lifecycle
            .update_hot_scores(user_id, &analysis.references)
            .await;
        if let Some(actions) = &analysis.reorganisation {
            self.lifecycle.merge_facts(user_id, actions).await;
        }
        self.lifecycle.prune_facts(user_id).await;
        self.lifecycle
            .decay_hot_scores(user_id, &analysis.references)
            .await;
    }
}
