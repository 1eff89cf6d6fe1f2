use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::brief::CampaignBrief;
use super::conversation::Conversation;
use super::variants::{PoolError, VariantPool};
use crate::content::{CandidateMessage, Channel, validate_output};
use crate::llm::{
    CompletionError, CompletionGateway, CompletionOperation, CompletionRequest,
    complete_with_telemetry, content_policy_prompt, edit_payload, generation_payload,
    log_telemetry,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("variant index {index} is out of range for {len} variants")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("precondition failed: {0}")]
    Precondition(&'static str),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<PoolError> for SessionError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::IndexOutOfRange { index, len } => Self::IndexOutOfRange { index, len },
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

/// One campaign dialogue: a conversation, at most one variant pool, and the
/// brief that produced it. Dropping the value ends the session.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    conversation: Conversation,
    pool: Option<VariantPool>,
    brief: Option<CampaignBrief>,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation: Conversation::new(system_prompt),
            pool: None,
            brief: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn pool(&self) -> Option<&VariantPool> {
        self.pool.as_ref()
    }

    pub fn brief(&self) -> Option<&CampaignBrief> {
        self.brief.as_ref()
    }

    /// Moves the selected pointer and rewrites the trailing assistant turn so the
    /// next edit quotes the newly selected variant.
    pub fn select_variant(&mut self, index: usize) -> Result<&CandidateMessage, SessionError> {
        let pool = self
            .pool
            .as_mut()
            .ok_or(SessionError::Precondition("no variants have been generated"))?;
        let content = pool.select(index)?.to_turn_content();
        self.conversation.sync_trailing_assistant(content);
        Ok(pool.selected())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            brief: self.brief.clone(),
            variants: self
                .pool
                .as_ref()
                .map(|pool| pool.candidates().to_vec())
                .unwrap_or_default(),
            selected_index: self.pool.as_ref().map(VariantPool::selected_index),
            conversation_turns: self.conversation.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub brief: Option<CampaignBrief>,
    pub variants: Vec<CandidateMessage>,
    pub selected_index: Option<usize>,
    pub conversation_turns: usize,
}

/// Drives generate and edit cycles against a completion gateway. Holds no
/// per-session state; every operation takes the session it acts on.
#[derive(Clone)]
pub struct SessionEngine {
    gateway: Arc<dyn CompletionGateway>,
    system_prompt: Arc<str>,
}

impl SessionEngine {
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self::with_system_prompt(gateway, content_policy_prompt())
    }

    pub fn with_system_prompt(gateway: Arc<dyn CompletionGateway>, system_prompt: &str) -> Self {
        Self {
            gateway,
            system_prompt: Arc::from(system_prompt),
        }
    }

    pub fn new_session(&self) -> Session {
        Session::new(self.system_prompt.as_ref())
    }

    /// Starts a new campaign in `session`. The conversation and pool are only
    /// replaced once the gateway has answered; on failure the session keeps its
    /// previous campaign.
    pub async fn generate<'s>(
        &self,
        session: &'s mut Session,
        brief: CampaignBrief,
    ) -> Result<&'s VariantPool, SessionError> {
        brief.check().map_err(SessionError::InvalidRequest)?;

        let mut conversation = session.conversation.clone();
        conversation.reset();
        conversation.push_user(generation_payload(&brief).to_string());

        let (result, telemetry) = complete_with_telemetry(
            self.gateway.as_ref(),
            CompletionOperation::Generate,
            CompletionRequest::new(conversation.turns(), brief.variant_count),
        )
        .await;
        log_telemetry(session.id, &telemetry);
        let response = result?;

        if response.completions.len() != brief.variant_count {
            warn!(
                session_id = %session.id,
                requested = brief.variant_count,
                received = response.completions.len(),
                "completion gateway returned an unexpected number of completions"
            );
            return Err(CompletionError::InvalidProviderPayload(
                "completion_count_mismatch".to_string(),
            )
            .into());
        }

        let candidates = response
            .completions
            .iter()
            .enumerate()
            .map(|(slot, raw)| accept_or_fallback(session.id, brief.channel, slot, raw))
            .collect::<Vec<_>>();
        let fallback_count = candidates
            .iter()
            .filter(|candidate| candidate.is_fallback())
            .count();

        let pool = match session.pool.clone() {
            Some(mut pool) => {
                pool.install(candidates)?;
                pool
            }
            None => VariantPool::new(candidates)?,
        };
        conversation.push_assistant(pool.selected().to_turn_content());

        info!(
            session_id = %session.id,
            channel = brief.channel.as_str(),
            variants = pool.len(),
            fallback_count,
            "installed campaign variants"
        );

        session.conversation = conversation;
        session.brief = Some(brief);
        Ok(&*session.pool.insert(pool))
    }

    /// Revises the selected variant. Only that pool entry changes; the
    /// conversation grows by the edit turn and the accepted reply.
    pub async fn edit_selected<'s>(
        &self,
        session: &'s mut Session,
        instruction: &str,
    ) -> Result<&'s CandidateMessage, SessionError> {
        let (Some(pool), Some(brief)) = (session.pool.as_ref(), session.brief.as_ref()) else {
            return Err(SessionError::Precondition(
                "no variants have been generated",
            ));
        };
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(SessionError::InvalidRequest(
                "edit instruction must not be empty".to_string(),
            ));
        }

        let channel = brief.channel;
        let selected = pool.selected();

        let mut conversation = session.conversation.clone();
        conversation.sync_trailing_assistant(selected.to_turn_content());
        let original_brief = conversation
            .brief_turn()
            .map(|turn| turn.content.clone())
            .ok_or(SessionError::Precondition("campaign brief turn is missing"))?;
        let payload = edit_payload(
            brief,
            instruction,
            &original_brief,
            selected,
            pool.selected_index(),
        );
        conversation.push_user(payload.to_string());

        let (result, telemetry) = complete_with_telemetry(
            self.gateway.as_ref(),
            CompletionOperation::Edit,
            CompletionRequest::new(conversation.turns(), 1),
        )
        .await;
        log_telemetry(session.id, &telemetry);
        let response = result?;

        let [raw] = response.completions.as_slice() else {
            warn!(
                session_id = %session.id,
                received = response.completions.len(),
                "completion gateway returned an unexpected number of edit completions"
            );
            return Err(CompletionError::InvalidProviderPayload(
                "completion_count_mismatch".to_string(),
            )
            .into());
        };

        let accepted = accept_or_fallback(session.id, channel, 0, raw);
        let Some(pool) = session.pool.as_mut() else {
            return Err(SessionError::Precondition(
                "no variants have been generated",
            ));
        };

        // The edit turn, its reply and the pool entry land together.
        conversation.push_assistant(accepted.to_turn_content());
        session.conversation = conversation;
        pool.replace_selected(accepted);
        info!(
            session_id = %session.id,
            channel = channel.as_str(),
            selected_index = pool.selected_index(),
            fallback = pool.selected().is_fallback(),
            "applied edit to selected variant"
        );
        Ok(pool.selected())
    }
}

fn accept_or_fallback(session_id: Uuid, channel: Channel, slot: usize, raw: &str) -> CandidateMessage {
    match validate_output(channel, raw) {
        Ok(candidate) => candidate,
        Err(err) => {
            warn!(
                session_id = %session_id,
                channel = channel.as_str(),
                slot,
                error_kind = err.kind(),
                "model output rejected; substituting fallback content: {err}"
            );
            CandidateMessage::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};

    use super::{SessionEngine, SessionError};
    use crate::content::{CandidateMessage, Channel};
    use crate::llm::{
        CompletionError, CompletionFuture, CompletionGateway, CompletionRequest,
        CompletionResponse,
    };
    use crate::session::{CampaignBrief, TurnRole};

    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<Vec<String>, CompletionError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<Vec<String>, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::from(replies)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    impl CompletionGateway for ScriptedGateway {
        fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
            Box::pin(async move {
                self.requests.lock().expect("requests lock").push(request);
                let reply = self
                    .replies
                    .lock()
                    .expect("replies lock")
                    .pop_front()
                    .unwrap_or_else(|| {
                        Err(CompletionError::ProviderFailure("exhausted".to_string()))
                    });
                reply.map(|completions| CompletionResponse {
                    model: "scripted".to_string(),
                    provider_request_id: None,
                    completions,
                    usage: None,
                })
            })
        }
    }

    fn sms(body: &str, variant_id: &str) -> String {
        json!({
            "body": body,
            "placeholders": [],
            "length": body.chars().count(),
            "variant_id": variant_id
        })
        .to_string()
    }

    fn engine(gateway: &Arc<ScriptedGateway>) -> SessionEngine {
        SessionEngine::with_system_prompt(gateway.clone(), "policy")
    }

    #[tokio::test]
    async fn generate_substitutes_fallback_per_invalid_slot() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![
            sms("20% off everything this weekend only!", "sms-1"),
            "{\"body\": \"unterminated".to_string(),
        ])]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();

        let pool = engine
            .generate(
                &mut session,
                CampaignBrief::new("20% off weekend sale", Channel::Sms).with_variant_count(2),
            )
            .await
            .expect("generate should succeed");

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.selected_index(), 0);
        assert_eq!(
            pool.get(0).map(|candidate| candidate.variant_id.as_deref()),
            Some(Some("sms-1"))
        );
        assert_eq!(pool.get(1), Some(&CandidateMessage::fallback()));

        let conversation = session.conversation();
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.turns()[0].role, TurnRole::System);
        assert_eq!(conversation.turns()[1].role, TurnRole::User);
        let last = conversation.last().expect("assistant turn");
        assert_eq!(last.role, TurnRole::Assistant);
        assert_eq!(
            last.content,
            session
                .pool()
                .expect("pool installed")
                .selected()
                .to_turn_content()
        );

        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].count, 2);
        assert_eq!(requests[0].turns.len(), 2);
        let brief_payload: Value =
            serde_json::from_str(&requests[0].turns[1].content).expect("brief turn is json");
        assert_eq!(brief_payload["prompt"], json!("20% off weekend sale"));
        assert_eq!(brief_payload["channel"], json!("sms"));
        assert_eq!(brief_payload["variants"], json!(2));
    }

    #[tokio::test]
    async fn assistant_turn_echoes_fallback_not_raw_model_text() {
        let gateway = ScriptedGateway::new(vec![Ok(vec!["I cannot comply.".to_string()])]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();

        engine
            .generate(&mut session, CampaignBrief::new("Sale", Channel::Viber))
            .await
            .expect("generate should succeed");

        let last = session.conversation().last().expect("assistant turn");
        assert_eq!(last.content, CandidateMessage::fallback().to_turn_content());
    }

    #[tokio::test]
    async fn edit_before_generate_is_a_precondition_error() {
        let gateway = ScriptedGateway::new(Vec::new());
        let engine = engine(&gateway);
        let mut session = engine.new_session();

        let err = engine
            .edit_selected(&mut session, "shorten to one sentence")
            .await
            .expect_err("edit without variants must fail");

        assert!(matches!(err, SessionError::Precondition(_)), "got {err:?}");
        assert_eq!(session.conversation().len(), 1);
        assert!(session.pool().is_none());
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn select_then_edit_changes_only_the_selected_variant() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![
                sms("Weekend sale: 20% off all items, today through Sunday.", "sms-1"),
                sms("Save 20% this weekend on everything in store and online.", "sms-2"),
            ]),
            Ok(vec![sms("Save 20% this weekend.", "sms-2b")]),
        ]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();
        engine
            .generate(
                &mut session,
                CampaignBrief::new("20% off weekend sale", Channel::Sms).with_variant_count(2),
            )
            .await
            .expect("generate should succeed");

        let first_before = session.pool().and_then(|pool| pool.get(0)).cloned();
        session.select_variant(1).expect("index 1 is valid");
        let second_before = session
            .pool()
            .and_then(|pool| pool.get(1))
            .cloned()
            .expect("second variant");
        assert_eq!(session.conversation().len(), 3);
        assert_eq!(
            session.conversation().last().map(|turn| turn.content.clone()),
            Some(second_before.to_turn_content())
        );
        let head_before = session.conversation().turns()[..2].to_vec();

        let edited = engine
            .edit_selected(&mut session, "shorten to one sentence")
            .await
            .expect("edit should succeed")
            .clone();

        assert_eq!(edited.variant_id.as_deref(), Some("sms-2b"));
        let pool = session.pool().expect("pool");
        assert_eq!(pool.selected_index(), 1);
        assert_eq!(pool.get(0).cloned(), first_before);
        assert_eq!(pool.get(1), Some(&edited));

        let conversation = session.conversation();
        assert_eq!(conversation.len(), 5);
        assert_eq!(&conversation.turns()[..2], head_before.as_slice());
        assert_eq!(
            conversation.turns()[2].content,
            second_before.to_turn_content()
        );
        assert_eq!(
            conversation.last().map(|turn| turn.content.clone()),
            Some(edited.to_turn_content())
        );

        let edit_request = &gateway.requests()[1];
        assert_eq!(edit_request.count, 1);
        let edit_turn: Value = serde_json::from_str(
            &edit_request
                .turns
                .last()
                .expect("edit turn")
                .content,
        )
        .expect("edit payload is json");
        assert_eq!(edit_turn["instruction"], json!("shorten to one sentence"));
        assert_eq!(edit_turn["edit_id"], json!("sms-2"));
        assert_eq!(edit_turn["previous_output"], second_before.to_value());
        assert_eq!(
            edit_turn["original_brief"],
            json!(head_before[1].content.clone())
        );
    }

    #[tokio::test]
    async fn edits_accumulate_within_a_campaign() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![sms("Spring collection is here.", "s-1")]),
            Ok(vec![sms("Spring collection lands Friday.", "s-2")]),
            Ok(vec!["not json".to_string()]),
        ]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();
        engine
            .generate(&mut session, CampaignBrief::new("Spring launch", Channel::Sms))
            .await
            .expect("generate should succeed");

        engine
            .edit_selected(&mut session, "mention Friday")
            .await
            .expect("first edit should succeed");
        let second = engine
            .edit_selected(&mut session, "add urgency")
            .await
            .expect("second edit should succeed")
            .clone();

        assert!(second.is_fallback());
        assert_eq!(session.conversation().len(), 7);
        assert_eq!(gateway.requests()[2].turns.len(), 6);
    }

    #[tokio::test]
    async fn edit_reply_turn_and_pool_entry_stay_in_step() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![
                sms("Spring collection is here.", "s-1"),
                sms("New spring styles just landed.", "s-2"),
            ]),
            Ok(vec![sms("New spring styles land Friday.", "s-2b")]),
            Ok(vec!["{\"body\": 42}".to_string()]),
        ]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();
        engine
            .generate(
                &mut session,
                CampaignBrief::new("Spring launch", Channel::Sms).with_variant_count(2),
            )
            .await
            .expect("generate should succeed");
        session.select_variant(1).expect("index 1 is valid");

        for instruction in ["mention Friday", "shorter"] {
            let edited = engine
                .edit_selected(&mut session, instruction)
                .await
                .expect("edit should succeed")
                .to_turn_content();
            let pool = session.pool().expect("pool installed");

            assert_eq!(pool.selected_index(), 1);
            assert_eq!(pool.selected().to_turn_content(), edited);
            assert_eq!(
                session.conversation().last().map(|turn| turn.content.as_str()),
                Some(edited.as_str())
            );
        }
        assert!(session.pool().expect("pool installed").selected().is_fallback());
        assert_eq!(session.conversation().len(), 7);
    }

    #[tokio::test]
    async fn new_brief_resets_the_conversation() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![sms("Spring collection is here.", "s-1")]),
            Ok(vec![sms("Spring collection lands Friday.", "s-2")]),
            Ok(vec![
                sms("Summer clearance starts now.", "c-1"),
                sms("Clearance: up to 50% off.", "c-2"),
                sms("Last chance for summer deals.", "c-3"),
            ]),
        ]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();
        engine
            .generate(&mut session, CampaignBrief::new("Spring launch", Channel::Sms))
            .await
            .expect("first campaign");
        engine
            .edit_selected(&mut session, "mention Friday")
            .await
            .expect("edit");

        engine
            .generate(
                &mut session,
                CampaignBrief::new("Summer clearance", Channel::Sms).with_variant_count(3),
            )
            .await
            .expect("second campaign");

        assert_eq!(session.conversation().len(), 3);
        assert_eq!(gateway.requests()[2].turns.len(), 2);
        assert_eq!(session.pool().map(|pool| pool.len()), Some(3));
        assert_eq!(
            session.brief().map(|brief| brief.prompt.as_str()),
            Some("Summer clearance")
        );
    }

    #[tokio::test]
    async fn gateway_failure_leaves_session_untouched() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![sms("Spring collection is here.", "s-1")]),
            Err(CompletionError::Quota("status=429 code=rate_limit".to_string())),
            Err(CompletionError::Timeout),
        ]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();
        engine
            .generate(&mut session, CampaignBrief::new("Spring launch", Channel::Sms))
            .await
            .expect("first campaign");
        let conversation_before = session.conversation().clone();
        let pool_before = session.pool().cloned();

        let err = engine
            .edit_selected(&mut session, "mention Friday")
            .await
            .expect_err("quota failure must propagate");
        assert!(matches!(
            err,
            SessionError::Completion(CompletionError::Quota(_))
        ));
        assert_eq!(session.conversation(), &conversation_before);
        assert_eq!(session.pool().cloned(), pool_before);

        let err = engine
            .generate(&mut session, CampaignBrief::new("Summer clearance", Channel::Sms))
            .await
            .expect_err("timeout must propagate");
        assert!(matches!(
            err,
            SessionError::Completion(CompletionError::Timeout)
        ));
        assert_eq!(session.conversation(), &conversation_before);
        assert_eq!(session.pool().cloned(), pool_before);
        assert_eq!(
            session.brief().map(|brief| brief.prompt.as_str()),
            Some("Spring launch")
        );
    }

    #[tokio::test]
    async fn wrong_completion_count_is_a_completion_error() {
        let gateway =
            ScriptedGateway::new(vec![Ok(vec![sms("Only one variant came back.", "x-1")])]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();

        let err = engine
            .generate(
                &mut session,
                CampaignBrief::new("Spring launch", Channel::Sms).with_variant_count(2),
            )
            .await
            .expect_err("count mismatch must fail");

        assert!(matches!(
            err,
            SessionError::Completion(CompletionError::InvalidProviderPayload(_))
        ));
        assert!(session.pool().is_none());
        assert_eq!(session.conversation().len(), 1);
    }

    #[tokio::test]
    async fn select_out_of_range_leaves_state_unchanged() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![
            sms("Variant one.", "v-1"),
            sms("Variant two.", "v-2"),
        ])]);
        let engine = engine(&gateway);
        let mut session = engine.new_session();
        engine
            .generate(
                &mut session,
                CampaignBrief::new("Spring launch", Channel::Sms).with_variant_count(2),
            )
            .await
            .expect("generate should succeed");
        let conversation_before = session.conversation().clone();
        let pool_before = session.pool().cloned();

        let err = session.select_variant(2).expect_err("index 2 is invalid");

        assert!(matches!(
            err,
            SessionError::IndexOutOfRange { index: 2, len: 2 }
        ));
        assert_eq!(session.conversation(), &conversation_before);
        assert_eq!(session.pool().cloned(), pool_before);
    }

    #[tokio::test]
    async fn invalid_briefs_are_rejected_before_any_call() {
        let gateway = ScriptedGateway::new(Vec::new());
        let engine = engine(&gateway);
        let mut session = engine.new_session();

        let err = engine
            .generate(
                &mut session,
                CampaignBrief::new("Spring launch", Channel::WhatsApp).with_variant_count(4),
            )
            .await
            .expect_err("four variants is out of range");

        assert!(matches!(err, SessionError::InvalidRequest(_)));
        assert!(gateway.requests().is_empty());
    }
}
