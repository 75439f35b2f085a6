use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use groundcheck_core::config::{resolve_with_base, Settings};
use groundcheck_core::types::{
    FinalAnswer, Query, RetrievalResult, Severity, ValidationContext, ValidationRecord, ValidatorOutcome,
};
use groundcheck_core::{ChunkStore, Embedder};
use groundcheck_record::ValidationRecorder;
use groundcheck_retrieve::Retriever;
use groundcheck_validate::{ConfidenceScorer, FallbackHandler, RuleBookHandle, ValidatorChain};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::PipelineError;

/// Outcome name recorded when the caller's generator fails.
pub const GENERATION: &str = "generation";
pub const GENERATION_FAILED: &str = "generation_failed";

/// Time allowed for locale detection once generation has failed.
const LOCALE_GRACE: Duration = Duration::from_millis(200);

/// Retrieval, validation, scoring, fallback and recording for one request.
pub struct GroundingPipeline {
    retriever: Retriever,
    chain: ValidatorChain,
    rules: Arc<RuleBookHandle>,
    scorer: ConfidenceScorer,
    fallback: FallbackHandler,
    recorder: Option<Arc<ValidationRecorder>>,
    request_deadline: Duration,
}

impl GroundingPipeline {
    pub fn new(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn ChunkStore>,
        rules: Arc<RuleBookHandle>,
    ) -> Result<Self, PipelineError> {
        let chain = ValidatorChain::standard(&settings.validation, Arc::clone(&rules))?;
        debug!(validators = ?chain.names(), "validator chain ready");
        Ok(Self {
            retriever: Retriever::new(embedder, store, &settings.retrieval),
            chain,
            rules,
            scorer: ConfidenceScorer::new(&settings.confidence),
            fallback: FallbackHandler::new(&settings.fallback),
            recorder: None,
            request_deadline: settings.pipeline.request_deadline(),
        })
    }

    /// Loads the rulebook and opens the validation log named in `settings`,
    /// resolving relative paths against `base`.
    pub async fn from_settings(
        settings: &Settings,
        base: &Path,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn ChunkStore>,
    ) -> Result<Self, PipelineError> {
        let rules_path = settings.validation.rules_path.as_ref().map(|p| resolve_with_base(base, p));
        let rules = Arc::new(RuleBookHandle::open(rules_path.as_deref())?);
        let recorder = ValidationRecorder::from_config(&settings.recorder, base).await?;
        info!(log = %recorder.path().display(), rules = rules.current().len(), "pipeline ready");
        Ok(Self::new(settings, embedder, store, rules)?.with_recorder(Arc::new(recorder)))
    }

    pub fn with_recorder(mut self, recorder: Arc<ValidationRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn rules(&self) -> &Arc<RuleBookHandle> {
        &self.rules
    }

    pub fn chain(&self) -> &ValidatorChain {
        &self.chain
    }

    /// Phase one: context for a new query, sized by its complexity.
    pub async fn retrieve(&self, query_text: &str) -> RetrievalResult {
        self.retrieve_until(Query::new(query_text), Instant::now() + self.request_deadline).await
    }

    /// Phase two: checks a draft written against `retrieval` and records the request.
    pub async fn validate(&self, retrieval: RetrievalResult, draft: impl Into<String>) -> FinalAnswer {
        let ctx = ValidationContext::new(retrieval, draft);
        self.validate_until(ctx, Instant::now() + self.request_deadline).await
    }

    /// Both phases under one deadline, for a draft the caller already has.
    pub async fn handle(&self, query_text: &str, draft: impl Into<String>) -> FinalAnswer {
        let deadline = Instant::now() + self.request_deadline;
        let retrieval = self.retrieve_until(Query::new(query_text), deadline).await;
        self.validate_until(ValidationContext::new(retrieval, draft), deadline).await
    }

    /// Both phases with generation in between. A failed generator falls
    /// back with `generation_failed`; it is only an error when retrieval had
    /// already degraded.
    pub async fn handle_with<G, Fut>(
        &self,
        query_text: &str,
        generator: G,
    ) -> Result<FinalAnswer, PipelineError>
    where
        G: FnOnce(RetrievalResult) -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        let deadline = Instant::now() + self.request_deadline;
        let retrieval = self.retrieve_until(Query::new(query_text), deadline).await;
        let request_id = retrieval.query.id();
        let degraded = retrieval.degraded;

        let generated = match timeout_at(deadline, generator(retrieval.clone())).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("generation exceeded the request deadline")),
        };
        match generated {
            Ok(draft) => {
                let ctx = ValidationContext::new(retrieval, draft);
                Ok(self.validate_until(ctx, deadline).await)
            }
            Err(err) => {
                warn!(%request_id, degraded, error = %err, "generation failed");
                // the fallback still needs the request locale, even past the deadline
                let detect_by = deadline.max(Instant::now() + LOCALE_GRACE);
                let mut ctx = self.chain.detect(ValidationContext::new(retrieval, String::new()), detect_by).await;
                ctx.push_outcome(
                    ValidatorOutcome::fail(GENERATION, Severity::Critical, GENERATION_FAILED)
                        .with_detail(err.to_string()),
                );
                let answer = self.finish(&ctx).await;
                if degraded {
                    return Err(PipelineError::Exhausted { request_id, message: err.to_string() });
                }
                Ok(answer)
            }
        }
    }

    async fn retrieve_until(&self, query: Query, deadline: Instant) -> RetrievalResult {
        match timeout_at(deadline, self.retriever.retrieve_adaptive(query.clone())).await {
            Ok(result) => result,
            Err(_) => {
                warn!(request_id = %query.id(), "request deadline reached during retrieval");
                RetrievalResult::degraded(query)
            }
        }
    }

    async fn validate_until(&self, ctx: ValidationContext, deadline: Instant) -> FinalAnswer {
        let ctx = self.chain.run(ctx, deadline).await;
        self.finish(&ctx).await
    }

    async fn finish(&self, ctx: &ValidationContext) -> FinalAnswer {
        let confidence = self.scorer.score(ctx);
        let answer = self.fallback.finalize(ctx, confidence);
        info!(
            request_id = %answer.request_id,
            confidence = answer.confidence.value,
            fallback = answer.fallback_fired,
            locale = %answer.locale,
            "request validated"
        );
        if let Some(recorder) = &self.recorder {
            if let Err(err) = recorder.record(ValidationRecord::from_request(ctx, &answer)).await {
                warn!(request_id = %answer.request_id, error = %err, "could not record validation");
            }
        }
        answer
    }
}
