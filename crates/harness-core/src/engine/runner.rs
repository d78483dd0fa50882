use crate::collector::ResultCollector;
use crate::config::RunConfig;
use crate::corpus::Corpus;
use crate::engine::process::{ProcessRunner, ScriptExecutor, ToolOutput};
use crate::errors::{ConfigError, HarnessError};
use crate::fingerprint::script_digest;
use crate::materialize::ScriptMaterializer;
use crate::model::{CorpusRecord, ExecutionResult, Outcome, SanitizedScript, SENTINEL_RC};
use crate::report::{self, RunArtifacts};
use crate::sanitize::{self, Rewrites};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;

/// Drives a corpus through sanitize → materialize → execute → collect → report.
///
/// Every corpus item ends up with exactly one result. The only error this returns is a
/// `ConfigError` (wrapped in `anyhow`) raised before any item started, or a failure to
/// write the final report.
pub struct Runner {
    cfg: Arc<RunConfig>,
    executor: Arc<dyn ScriptExecutor>,
    materializer: Arc<ScriptMaterializer>,
    rewrites: Arc<Rewrites>,
}

impl Runner {
    pub fn new(cfg: RunConfig) -> anyhow::Result<Self> {
        let executor = Arc::new(ProcessRunner::new(cfg.tool.clone(), cfg.kill_grace));
        Self::with_executor(cfg, executor)
    }

    pub fn with_executor(cfg: RunConfig, executor: Arc<dyn ScriptExecutor>) -> anyhow::Result<Self> {
        cfg.validate()?;
        let rewrites = Rewrites::new(&cfg.rewrites).map_err(|e| ConfigError(e.to_string()))?;
        let materializer = ScriptMaterializer::new(&cfg.out_dir, &cfg.script_ext);
        Ok(Self {
            cfg: Arc::new(cfg),
            executor,
            materializer: Arc::new(materializer),
            rewrites: Arc::new(rewrites),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    pub async fn run_batch(&self, corpus: &Corpus) -> anyhow::Result<RunArtifacts> {
        let started_at = chrono::Utc::now();
        let report_path = self.cfg.report_path();

        // an output directory we cannot create means no log and no report can be written
        self.materializer.ensure_dir().await.map_err(|e| ConfigError(e.to_string()))?;

        let total = corpus.len();
        let deadline = self.cfg.batch_timeout.map(|d| Instant::now() + d);
        let sem = Arc::new(Semaphore::new(self.cfg.concurrency.max(1)));
        let (tx, rx) = mpsc::channel::<ExecutionResult>(self.cfg.concurrency.max(1) * 2);

        tracing::info!(
            event = "run_started",
            items = total,
            concurrency = self.cfg.concurrency,
            timeout_ms = self.cfg.timeout.as_millis() as u64,
            out_dir = %self.cfg.out_dir.display()
        );

        let consumer = tokio::spawn(collect_results(
            rx,
            total,
            self.cfg.flush_every,
            report_path.clone(),
        ));

        let mut handles = Vec::with_capacity(total);
        let mut records = corpus.records.iter();
        let mut cut_off = false;

        for rec in records.by_ref() {
            let permit = match deadline {
                Some(at) => match tokio::time::timeout_at(at, sem.clone().acquire_owned()).await {
                    Ok(p) => p?,
                    Err(_) => {
                        cut_off = true;
                        send(&tx, self.not_started(rec.id).await).await;
                        break;
                    }
                },
                None => sem.clone().acquire_owned().await?,
            };
            if deadline.is_some_and(|at| Instant::now() >= at) {
                drop(permit);
                cut_off = true;
                send(&tx, self.not_started(rec.id).await).await;
                break;
            }

            let this = self.clone_for_task();
            let rec = rec.clone();
            let tx = tx.clone();
            let id = rec.id;
            let h = tokio::spawn(async move {
                let _permit = permit;
                let result = this.run_item(&rec).await;
                send(&tx, result).await;
            });
            handles.push((id, h));
        }

        if cut_off {
            tracing::warn!(event = "batch_deadline_exceeded", remaining = records.len());
            for rec in records {
                send(&tx, self.not_started(rec.id).await).await;
            }
        }

        for (id, h) in handles {
            if let Err(e) = h.await {
                tracing::error!(event = "worker_join_error", id, error = %e);
            }
        }
        drop(tx);

        let mut collector = consumer.await?;

        // a worker that died without reporting still owes its item a result
        for rec in &corpus.records {
            if !collector.contains(rec.id) {
                let err = HarnessError::Io {
                    context: "worker exited without a result",
                    path: self.materializer.script_path(rec.id),
                    source: std::io::Error::other("task aborted"),
                };
                let r = self.record(rec.id, Err(err), Instant::now(), None).await;
                let _ = collector.append(r);
            }
        }

        let results = collector.into_sorted();
        report::write_report(&results, &report_path)?;

        let artifacts = RunArtifacts {
            started_at,
            finished_at: chrono::Utc::now(),
            input: self.cfg.input.clone(),
            column: corpus.column.clone(),
            report_path,
            results,
        };

        let t = artifacts.tally();
        tracing::info!(
            event = "run_finished",
            items = artifacts.results.len(),
            passed = t.passed,
            tool_failed = t.tool_failed,
            timed_out = t.timed_out,
            spawn_errored = t.spawn_errored,
            not_started = t.not_started,
            report = %artifacts.report_path.display()
        );

        Ok(artifacts)
    }

    /// Sanitizes and writes every script without executing anything.
    pub async fn prepare_all(&self, corpus: &Corpus) -> anyhow::Result<Vec<SanitizedScript>> {
        self.materializer.ensure_dir().await.map_err(|e| ConfigError(e.to_string()))?;
        let mut out = Vec::with_capacity(corpus.len());
        for rec in &corpus.records {
            let code = sanitize::prepare(&rec.raw_code, &self.rewrites);
            out.push(self.materializer.materialize(rec.id, &code).await?);
        }
        Ok(out)
    }

    async fn run_item(&self, rec: &CorpusRecord) -> ExecutionResult {
        let started = Instant::now();
        let code = sanitize::prepare(&rec.raw_code, &self.rewrites);
        let digest = script_digest(&code);

        tracing::debug!(event = "item_started", id = rec.id);

        let res = match self.materializer.materialize(rec.id, &code).await {
            Ok(script) => self.execute_with_retries(&script).await,
            Err(e) => Err(e),
        };
        self.record(rec.id, res, started, Some(digest)).await
    }

    async fn execute_with_retries(&self, script: &SanitizedScript) -> Result<ToolOutput, HarnessError> {
        let mut attempt = 0u32;
        loop {
            match self.executor.execute(&script.path, self.cfg.timeout).await {
                Err(e) if e.is_transient() && attempt < self.cfg.spawn_retries => {
                    attempt += 1;
                    tracing::warn!(
                        event = "spawn_retry",
                        id = script.id,
                        attempt,
                        error = %e
                    );
                    tokio::time::sleep(self.cfg.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }

    /// Folds an item outcome into its result and writes the log file.
    async fn record(
        &self,
        id: u64,
        res: Result<ToolOutput, HarnessError>,
        started: Instant,
        digest: Option<String>,
    ) -> ExecutionResult {
        let (mut return_code, mut outcome, body) = match res {
            Ok(out) => {
                let body = if out.output.is_empty() {
                    format!("(no output; exit code {})", out.return_code)
                } else {
                    out.output
                };
                if out.return_code == 0 {
                    tracing::info!(event = "item_completed", id, return_code = 0);
                } else {
                    tracing::info!(event = "item_tool_failed", id, return_code = out.return_code);
                }
                (out.return_code, Outcome::Completed, body)
            }
            Err(e) => {
                let outcome = match e {
                    HarnessError::Timeout(_) => {
                        tracing::warn!(event = "item_timed_out", id, error = %e);
                        Outcome::TimedOut
                    }
                    HarnessError::BatchDeadline => Outcome::NotStarted,
                    _ => {
                        tracing::warn!(event = "item_spawn_failed", id, error = %e);
                        Outcome::SpawnErrored
                    }
                };
                (SENTINEL_RC, outcome, e.log_body())
            }
        };

        let log_path = match self.materializer.write_log(id, &body).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(event = "item_log_failed", id, error = %e);
                return_code = SENTINEL_RC;
                outcome = Outcome::SpawnErrored;
                // best effort: leave the reason where the log should be
                let _ = self.materializer.write_log(id, &e.log_body()).await;
                self.materializer.log_path(id)
            }
        };

        ExecutionResult {
            id,
            return_code,
            outcome,
            log_path,
            duration_ms: started.elapsed().as_millis() as u64,
            script_sha256: digest,
        }
    }

    async fn not_started(&self, id: u64) -> ExecutionResult {
        self.record(id, Err(HarnessError::BatchDeadline), Instant::now(), None)
            .await
    }

    fn clone_for_task(&self) -> Runner {
        Runner {
            cfg: self.cfg.clone(),
            executor: self.executor.clone(),
            materializer: self.materializer.clone(),
            rewrites: self.rewrites.clone(),
        }
    }
}

async fn send(tx: &mpsc::Sender<ExecutionResult>, result: ExecutionResult) {
    let id = result.id;
    if tx.send(result).await.is_err() {
        tracing::error!(event = "collector_closed", id);
    }
}

/// Single consumer owning the collector; optionally rewrites the partial report every
/// `flush_every` results.
async fn collect_results(
    mut rx: mpsc::Receiver<ExecutionResult>,
    total: usize,
    flush_every: usize,
    report_path: std::path::PathBuf,
) -> ResultCollector {
    let mut collector = ResultCollector::with_capacity(total);
    while let Some(r) = rx.recv().await {
        if let Err(e) = collector.append(r) {
            tracing::error!(event = "duplicate_result", error = %e);
            continue;
        }
        if flush_every > 0 && collector.len() % flush_every == 0 && collector.len() < total {
            match report::write_report(&collector.sorted(), &report_path) {
                Ok(()) => tracing::info!(
                    event = "report_flushed",
                    recorded = collector.len(),
                    total,
                    report = %report_path.display()
                ),
                Err(e) => tracing::warn!(event = "report_flush_failed", error = %e),
            }
        }
    }
    collector
}
