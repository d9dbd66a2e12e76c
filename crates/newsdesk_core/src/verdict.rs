use crate::db::Store;
use crate::error::{PipelineError, Result};
use crate::ledger::ReliabilityLedger;
use crate::oracle::FactChecker;
use crate::schema::{Article, SourceType, Verdict};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Serializes verification of the same article; unrelated articles never
/// contend.
#[derive(Default)]
struct ArticleLocks {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ArticleLocks {
    async fn acquire(&self, article_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            inflight.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                inflight
                    .entry(article_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

/// Pending → Reliable | Unreliable | Misleading, once per article.
pub struct VerdictPipeline {
    store: Store,
    oracle: Arc<dyn FactChecker>,
    ledger: ReliabilityLedger,
    locks: ArticleLocks,
}

impl VerdictPipeline {
    pub fn new(store: Store, oracle: Arc<dyn FactChecker>, ledger: ReliabilityLedger) -> Self {
        Self {
            store,
            oracle,
            ledger,
            locks: ArticleLocks::default(),
        }
    }

    async fn load_owned(&self, article_id: &str, caller: &str) -> Result<Article> {
        let id = article_id.to_string();
        let article = self
            .store
            .run(move |store| store.article(&id))
            .await?
            .ok_or_else(|| PipelineError::NotFound(article_id.to_string()))?;
        if article.author != caller {
            return Err(PipelineError::Unauthorized {
                article_id: article_id.to_string(),
                caller: caller.to_string(),
            });
        }
        Ok(article)
    }

    /// Resolves the article's verdict through the oracle unless it is
    /// already resolved, then folds the outcome into the author's ledger
    /// record.
    pub async fn verify(&self, article_id: &str, caller: &str) -> Result<Article> {
        let _guard = self.locks.acquire(article_id).await;

        let article = self.load_owned(article_id, caller).await?;
        if article.verdict.is_resolved() {
            debug!(
                article_id,
                status = %article.verdict.status(),
                "article already verified; returning stored verdict"
            );
            return Ok(article);
        }

        info!(article_id, mode = %self.oracle.mode(), "submitting article to fact-check oracle");
        let assessment = match self.oracle.check(&article.title, &article.body).await {
            Ok(assessment) => assessment,
            Err(err) => {
                warn!(article_id, error = %err, "verification failed; article left pending");
                return Err(err);
            }
        };
        if let Err(reason) = assessment.validate() {
            warn!(article_id, reason = %reason, "oracle verdict rejected; article left pending");
            return Err(PipelineError::Validation(reason));
        }

        let id = article_id.to_string();
        let written = assessment.clone();
        let resolved = self
            .store
            .run(move |store| store.resolve_verdict(&id, &written))
            .await?;
        if !resolved {
            // Resolved by another writer between our read and write.
            warn!(article_id, "verdict already written elsewhere; discarding oracle result");
            let id = article_id.to_string();
            return self
                .store
                .run(move |store| store.article(&id))
                .await?
                .ok_or_else(|| PipelineError::NotFound(article_id.to_string()));
        }

        let verdict = Verdict::Resolved(assessment);
        info!(article_id, status = %verdict.status(), "verdict stored");

        let ledger = self.ledger.clone();
        let author = article.author.clone();
        let status = verdict.status();
        let recorded = tokio::task::spawn_blocking(move || {
            ledger.record(&author, SourceType::Local, status)
        })
        .await
        .map_err(|e| PipelineError::Storage(e.into()))
        .and_then(|outcome| outcome);
        if let Err(err) = recorded {
            error!(
                article_id,
                source = %article.author,
                error = %err,
                "ledger update failed after verdict write; ledger is now behind"
            );
        }

        Ok(Article { verdict, ..article })
    }

    /// Returns a resolved article to Pending so it can be verified again.
    /// Ledger counters keep the earlier outcome.
    pub async fn reset(&self, article_id: &str, caller: &str) -> Result<Article> {
        let _guard = self.locks.acquire(article_id).await;

        let article = self.load_owned(article_id, caller).await?;
        if !article.verdict.is_resolved() {
            return Ok(article);
        }
        let id = article_id.to_string();
        if !self.store.run(move |store| store.reset_verdict(&id)).await? {
            return Err(PipelineError::NotFound(article_id.to_string()));
        }
        info!(article_id, previous = %article.verdict.status(), "verdict reset to pending");
        Ok(Article {
            verdict: Verdict::Pending,
            ..article
        })
    }
}
