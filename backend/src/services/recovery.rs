//! Bounded-retry recovery around orchestrator stages.
//!
//! When a stage fails, the LLM is asked to pick a corrective action; the
//! loop honors at most three attempts and then propagates the original
//! error. `modify` feeds the returned `retry_params` back into the next
//! attempt; `skip` and `fallback` end the stage with a non-result.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};

use ai::parse::{parse_stage_reply, RecoveryAction, RecoveryPlan};
use ai::{prompts, LlmService};

use crate::errors::AppError;

const MAX_ATTEMPTS: usize = 3;

/// Context handed to the recovery prompt.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    pub question: String,
    pub node_count: Option<usize>,
    pub schema_node_count: Option<usize>,
}

/// How a recoverable stage ended.
#[derive(Debug)]
pub enum StageOutcome<T> {
    Done(T),
    /// Stage result abandoned; callers continue with their previous value.
    Skipped,
    /// Orchestrator should take the general-knowledge fallback path.
    Fallback,
}

/// Run one stage with up to three attempts. The closure receives the
/// current `retry_params` (None on the first attempt, the recovery plan's
/// params after a `modify`).
pub async fn run_stage<T, F, Fut>(
    llm: &Arc<dyn LlmService>,
    step_name: &str,
    ctx: &StageContext,
    mut attempt: F,
) -> Result<StageOutcome<T>, AppError>
where
    F: FnMut(Option<serde_json::Value>) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut retry_params: Option<serde_json::Value> = None;

    for attempt_no in 1..=MAX_ATTEMPTS {
        match attempt(retry_params.clone()).await {
            Ok(value) => return Ok(StageOutcome::Done(value)),
            Err(e) => {
                warn!("⚠️  [{step_name}] 오류 발생 (시도 {attempt_no}/{MAX_ATTEMPTS}): {e}");
                if attempt_no == MAX_ATTEMPTS {
                    error!("❌ [{step_name}] 최대 재시도 횟수 초과");
                    return Err(e);
                }

                let plan = plan_recovery(llm, step_name, &e, ctx).await;
                info!("🔧 복구 방안: {:?} - {}", plan.recovery_action, plan.reason);
                match plan.recovery_action {
                    RecoveryAction::Retry => continue,
                    RecoveryAction::Modify => {
                        retry_params = Some(plan.retry_params);
                        continue;
                    }
                    RecoveryAction::Skip => return Ok(StageOutcome::Skipped),
                    RecoveryAction::Fallback => return Ok(StageOutcome::Fallback),
                }
            }
        }
    }
    unreachable!("loop returns on every branch")
}

/// Ask the LLM for a recovery plan; any failure here degrades to `skip`.
async fn plan_recovery(
    llm: &Arc<dyn LlmService>,
    step_name: &str,
    error: &AppError,
    ctx: &StageContext,
) -> RecoveryPlan {
    let prompt = prompts::recovery_prompt(
        step_name,
        error.kind_label(),
        &error.to_string(),
        &ctx.question,
        ctx.node_count,
        ctx.schema_node_count,
    );
    match llm.chat(&prompt).await {
        Ok(reply) => parse_stage_reply(&reply),
        Err(e) => {
            warn!("오류 복구 Agent 실행 오류: {e}");
            RecoveryPlan::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test double that replies with a fixed recovery action.
    struct ScriptedLlm {
        action: &'static str,
    }

    #[async_trait]
    impl LlmService for ScriptedLlm {
        async fn chat(&self, _prompt: &str) -> Result<String, ai::LlmError> {
            Ok(format!(
                "{{\"recovery_action\": \"{}\", \"reason\": \"test\", \
                  \"retry_params\": {{\"use_deep_search\": true}}}}",
                self.action
            ))
        }
        async fn chat_json(
            &self,
            _system: &str,
            _prompt: &str,
            _temperature: f32,
        ) -> Result<String, ai::LlmError> {
            self.chat("").await
        }
        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn llm(action: &'static str) -> Arc<dyn LlmService> {
        Arc::new(ScriptedLlm { action })
    }

    #[tokio::test]
    async fn first_success_needs_no_recovery() {
        let outcome = run_stage(&llm("retry"), "stage", &StageContext::default(), |_| async {
            Ok::<_, AppError>(7)
        })
        .await
        .unwrap();
        assert!(matches!(outcome, StageOutcome::Done(7)));
    }

    #[tokio::test]
    async fn retry_reruns_until_success() {
        let calls = AtomicUsize::new(0);
        let outcome = run_stage(&llm("retry"), "stage", &StageContext::default(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::Validation("transient".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert!(matches!(outcome, StageOutcome::Done(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn skip_abandons_the_stage() {
        let outcome = run_stage(&llm("skip"), "stage", &StageContext::default(), |_| async {
            Err::<(), _>(AppError::Validation("broken".into()))
        })
        .await
        .unwrap();
        assert!(matches!(outcome, StageOutcome::Skipped));
    }

    #[tokio::test]
    async fn fallback_is_surfaced_to_the_caller() {
        let outcome = run_stage(&llm("fallback"), "stage", &StageContext::default(), |_| async {
            Err::<(), _>(AppError::Validation("broken".into()))
        })
        .await
        .unwrap();
        assert!(matches!(outcome, StageOutcome::Fallback));
    }

    #[tokio::test]
    async fn modify_feeds_params_into_the_next_attempt() {
        let outcome = run_stage(&llm("modify"), "stage", &StageContext::default(), |params| async move {
            match params {
                None => Err(AppError::Validation("needs deep".into())),
                Some(p) => {
                    assert_eq!(p["use_deep_search"], serde_json::json!(true));
                    Ok("deep result")
                }
            }
        })
        .await
        .unwrap();
        assert!(matches!(outcome, StageOutcome::Done("deep result")));
    }

    #[tokio::test]
    async fn three_retry_failures_propagate_the_error() {
        let calls = AtomicUsize::new(0);
        let result = run_stage(&llm("retry"), "stage", &StageContext::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AppError::Validation("always".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
