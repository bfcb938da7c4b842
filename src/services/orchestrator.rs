//! The evaluate, diagnose and repair loop.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    judge_scores, ApplyLog, ApplyOutcome, ApplyPolicy, ArbiterOutcome, BenchmarkCorrection,
    BenchmarkQuestion, ClusterReport, Config, CrossIterationReport, EvaluationRecord,
    ExcludedQuestion, IterationSummary, JudgeKind, JudgeProfile, JudgeScore, PriorityTier,
    RepeatabilityReport, RunSummary, Scope, StopReason, ValidationResult, VerificationReport,
};
use crate::domain::ports::{
    BenchmarkRepository, CollaboratorError, ConfigMirror, MetadataStore, QueryExecutor, QueryGenerator,
    ReasoningModel, RunStore,
};
use crate::infrastructure::resilience::{CallSpacing, RetryPolicy};
use crate::services::applier::{ApplyError, Applier};
use crate::services::evaluator::Evaluator;
use crate::services::failure_clusterer;
use crate::services::judges::{standard_judges, JudgeClient};
use crate::services::patch_proposer::{PatchProposer, ProposalContext, Proposals};
use crate::services::patch_validator::PatchValidator;
use crate::services::{query_text, repeatability};

/// External collaborators a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn QueryGenerator>,
    pub executor: Arc<dyn QueryExecutor>,
    pub reasoning: Arc<dyn ReasoningModel>,
    pub metadata: Arc<dyn MetadataStore>,
    pub mirror: Arc<dyn ConfigMirror>,
    pub benchmarks: Arc<dyn BenchmarkRepository>,
    pub runs: Arc<dyn RunStore>,
}

/// What a run should do beyond evaluating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub scope: Scope,
    /// Cluster, propose and apply after evaluating
    pub optimize: bool,
    /// Allow high-risk patch sets
    pub confirm: bool,
    /// Stop after validation
    pub dry_run: bool,
    /// Regenerate each question to score how stable its query is
    pub repeatability: bool,
    /// Upper bound on evaluate, diagnose and repair passes
    pub max_iterations: usize,
}

impl RunOptions {
    pub const fn optimize(scope: Scope) -> Self {
        Self {
            scope,
            optimize: true,
            confirm: false,
            dry_run: false,
            repeatability: false,
            max_iterations: 1,
        }
    }

    pub const fn evaluate_only(scope: Scope) -> Self {
        Self {
            scope,
            optimize: false,
            confirm: false,
            dry_run: false,
            repeatability: false,
            max_iterations: 1,
        }
    }
}

/// Questions that survived the pre-check, plus what was dropped
struct Precheck {
    survivors: Vec<BenchmarkQuestion>,
    excluded: Vec<ExcludedQuestion>,
    warnings: Vec<String>,
}

/// Output of the repair half of a run
struct Repair {
    proposals: Proposals,
    validation: Option<ValidationResult>,
    apply: ApplyOutcome,
}

/// Runs the loop against a fixed set of collaborators and judge profile
pub struct Orchestrator {
    config: Config,
    collaborators: Collaborators,
    profile: Arc<JudgeProfile>,
    evaluator: Evaluator,
    proposer: PatchProposer,
    validator: PatchValidator,
    applier: Applier,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: Config, collaborators: Collaborators, profile: Arc<JudgeProfile>) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        let client = Arc::new(JudgeClient::new(
            collaborators.reasoning.clone(),
            Arc::new(CallSpacing::from_millis(config.rate_limit.reasoning_interval_ms)),
            retry.clone(),
        ));
        let evaluator = Evaluator::new(
            collaborators.generator.clone(),
            collaborators.executor.clone(),
            standard_judges(client, profile.clone()),
            Arc::new(CallSpacing::from_millis(config.rate_limit.generation_interval_ms)),
            retry.clone(),
            config.evaluation.max_concurrency,
        );

        Self {
            proposer: PatchProposer::from_config(&config.optimizer),
            validator: PatchValidator::from_config(&config.optimizer),
            applier: Applier::new(collaborators.metadata.clone(), collaborators.mirror.clone()),
            config,
            collaborators,
            profile,
            evaluator,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the run between evaluation units.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Evaluate the scoped benchmark and, when asked, repair metadata. An
    /// optimizing run repeats evaluate, diagnose and repair until a stop
    /// condition holds or `max_iterations` passes have run.
    #[instrument(skip_all, fields(scope = %options.scope, optimize = options.optimize))]
    pub async fn run(&self, options: RunOptions) -> DomainResult<RunSummary> {
        let started_at = Utc::now();
        let run_id = format!(
            "{}-{}",
            started_at.format("%Y%m%dT%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        info!(run_id = %run_id, profile = %self.profile.version, "Starting run");

        let questions: Vec<BenchmarkQuestion> = self
            .collaborators
            .benchmarks
            .load()
            .await?
            .into_iter()
            .filter(|q| options.scope.includes(q))
            .collect();
        let total_questions = questions.len();

        let Precheck {
            mut survivors,
            excluded,
            mut warnings,
        } = self.precheck(questions).await;

        if options.scope == Scope::Full && survivors.len() < self.config.evaluation.min_benchmarks {
            return Err(DomainError::CoverageFailure {
                surviving: survivors.len(),
                required: self.config.evaluation.min_benchmarks,
            });
        }

        let max_iterations = options.max_iterations.max(1);
        let mut corrections = Vec::new();
        let mut iterations = Vec::new();
        let mut progress = Progress::new(self.config.optimizer.plateau_iterations);
        let mut previous: Option<Vec<EvaluationRecord>> = None;

        let (last, stop_reason) = loop {
            let iteration = iterations.len() + 1;
            let pass = self
                .iterate(iteration, &options, &survivors, previous.as_deref(), &mut progress, &mut warnings)
                .await?;

            for correction in &pass.corrections {
                if correction.dry_run {
                    continue;
                }
                if let Some(question) = survivors.iter_mut().find(|q| q.id == correction.question_id) {
                    *question = question.corrected(&correction.new_query);
                }
            }
            corrections.extend(pass.corrections.iter().cloned());
            iterations.push(pass.summary(iteration));

            let stop = pass.stop.or_else(|| {
                if options.dry_run {
                    Some(StopReason::DryRun)
                } else if !matches!(pass.repair.apply, ApplyOutcome::Applied { .. }) {
                    Some(StopReason::NothingApplied)
                } else if iteration >= max_iterations {
                    Some(StopReason::MaxIterations)
                } else {
                    None
                }
            });
            match stop {
                Some(reason) => break (pass, reason),
                None => previous = Some(pass.records),
            }
        };

        let errors = last
            .records
            .iter()
            .flat_map(|r| r.errors.iter().map(move |e| format!("{}: {e}", r.question_id)))
            .collect();

        let summary = RunSummary {
            run_id,
            scope: options.scope,
            judge_profile: self.profile.version.clone(),
            started_at,
            finished_at: Utc::now(),
            total_questions,
            evaluated: last.records.len(),
            excluded,
            warnings,
            judge_scores: last.judge_scores,
            accuracy: last.accuracy,
            thresholds_met: last.thresholds_met,
            arbiter_outcomes: last.arbiter_outcomes,
            corrections,
            clusters: last.clusters,
            proposals: last.repair.proposals.proposals,
            recommendations: last.repair.proposals.recommendations,
            validation: last.repair.validation,
            apply: last.repair.apply,
            errors,
            repeatability: last.repeatability,
            iterations,
            best_iteration: progress.best_iteration(),
            stop_reason,
        };

        self.collaborators
            .runs
            .save_run(&summary, &last.records)
            .await
            .map_err(|e| DomainError::Storage(format!("saving run {}: {e}", summary.run_id)))?;

        info!(
            run_id = %summary.run_id,
            evaluated = summary.evaluated,
            accuracy = summary.accuracy,
            iterations = summary.iterations.len(),
            best_iteration = summary.best_iteration,
            stop_reason = %summary.stop_reason,
            apply = summary.apply.as_str(),
            "Run finished"
        );
        Ok(summary)
    }

    /// One evaluate, diagnose and repair pass. `stop` is set when the loop
    /// must end before repairing.
    #[instrument(skip_all, fields(iteration = iteration))]
    async fn iterate(
        &self,
        iteration: usize,
        options: &RunOptions,
        survivors: &[BenchmarkQuestion],
        previous: Option<&[EvaluationRecord]>,
        progress: &mut Progress,
        warnings: &mut Vec<String>,
    ) -> DomainResult<Pass> {
        let mut records = self.evaluator.evaluate_until(survivors, &self.cancel).await;
        let cancelled = records.len() < survivors.len();
        if cancelled {
            warnings.push(format!(
                "run cancelled after {} of {} questions",
                records.len(),
                survivors.len()
            ));
        }

        let repeatability = if options.repeatability && !cancelled {
            let checks = self
                .evaluator
                .check_repeatability(
                    survivors,
                    &records,
                    self.config.evaluation.repeatability_runs,
                    &self.cancel,
                )
                .await;
            repeatability::annotate(&mut records, &checks);
            Some(RepeatabilityReport::from_checks(checks))
        } else {
            None
        };
        let cross_iteration =
            previous.map(|previous| repeatability::cross_iteration(iteration - 1, previous, &mut records));
        if let Some(report) = &cross_iteration {
            if !report.unstable.is_empty() {
                warn!(unstable = ?report.unstable, "Queries changed for previously correct questions");
            }
        }

        let arbiter_outcomes = tally_arbiter(&records);
        let corrections = self
            .apply_corrections(survivors, &records, options.dry_run, warnings)
            .await;
        let clusters = failure_clusterer::cluster(&records);

        let judge_scores = judge_scores(&records);
        let accuracy = judge_scores
            .get(&JudgeKind::ResultCorrectness)
            .and_then(|s| s.pass_rate)
            .unwrap_or(0.0);
        let thresholds_met = judge_scores.iter().all(|(kind, score)| {
            match (self.config.evaluation.threshold(*kind), score.pass_rate) {
                (Some(threshold), Some(rate)) => rate >= threshold,
                _ => true,
            }
        });
        let failing_questions = records.iter().filter(|r| r.failures().next().is_some()).count();
        let stalled = progress.record(iteration, accuracy);
        info!(iteration, accuracy, failing_questions, "Iteration evaluated");

        let stop = if cancelled {
            Some((StopReason::Cancelled, "run cancelled"))
        } else if !options.optimize {
            Some((StopReason::EvaluationOnly, "evaluation only"))
        } else if thresholds_met {
            Some((StopReason::Converged, "all thresholds met"))
        } else if failing_questions == 0 {
            Some((StopReason::NoFailures, "no failures to repair"))
        } else if stalled {
            Some((StopReason::Stalled, "accuracy stopped improving"))
        } else {
            None
        };

        let repair = match stop {
            Some((_, reason)) => Repair::skipped(reason),
            None => self.repair(options, survivors, &records, &clusters).await?,
        };

        Ok(Pass {
            records,
            repeatability,
            cross_iteration,
            arbiter_outcomes,
            corrections,
            clusters,
            repair,
            judge_scores,
            accuracy,
            thresholds_met,
            failing_questions,
            stop: stop.map(|(reason, _)| reason),
        })
    }

    /// Replay the inverse commands of a persisted run's apply log.
    #[instrument(skip(self))]
    pub async fn rollback_run(&self, run_id: &str) -> DomainResult<ApplyLog> {
        let summary = self
            .collaborators
            .runs
            .load_summary(run_id)
            .await
            .map_err(|e| match e {
                CollaboratorError::NotFound(_) => DomainError::RunNotFound(run_id.to_string()),
                other => DomainError::Storage(format!("loading run {run_id}: {other}")),
            })?;
        let logs = summary.applied_logs();
        if logs.is_empty() {
            return Err(DomainError::NothingToRollBack(run_id.to_string()));
        }

        // Newest iteration first, so each log sees the state it produced.
        let mut reverted = ApplyLog::default();
        for log in logs.into_iter().rev() {
            let log = self
                .applier
                .rollback(log)
                .await
                .map_err(|e| DomainError::Apply(e.to_string()))?;
            reverted.entries.extend(log.entries);
        }
        self.collaborators.runs.save_rollback(run_id, &reverted).await?;
        info!(run_id, "Run rolled back");
        Ok(reverted)
    }

    /// Plan every expected query; drop the ones that fail.
    async fn precheck(&self, questions: Vec<BenchmarkQuestion>) -> Precheck {
        let executor = &self.collaborators.executor;
        let retry = &self.retry;
        let planned: Vec<_> = stream::iter(questions)
            .map(|question| async move {
                let query = question.expected_query.as_str();
                let result = retry.execute(move || executor.explain(query)).await;
                (question, result)
            })
            .buffered(self.config.evaluation.max_concurrency.max(1))
            .collect()
            .await;

        let mut precheck = Precheck {
            survivors: Vec::with_capacity(planned.len()),
            excluded: Vec::new(),
            warnings: Vec::new(),
        };
        for (question, result) in planned {
            if let Err(err) = result {
                warn!(question_id = %question.id, error = %err, "Expected query failed to plan, excluding");
                precheck.excluded.push(ExcludedQuestion {
                    question_id: question.id,
                    reason: err.to_string(),
                });
                continue;
            }
            if let Some(warning) =
                query_text::stale_temporal_warning(&question.question, &question.expected_query)
            {
                warn!(question_id = %question.id, "{warning}");
                precheck.warnings.push(format!("{}: {warning}", question.id));
            }
            precheck.survivors.push(question);
        }
        precheck
    }

    /// Rewrite expected queries the arbiter judged wrong, once enough
    /// `genie_correct` outcomes have accumulated. A dry run only reports them.
    async fn apply_corrections(
        &self,
        questions: &[BenchmarkQuestion],
        records: &[EvaluationRecord],
        dry_run: bool,
        warnings: &mut Vec<String>,
    ) -> Vec<BenchmarkCorrection> {
        let candidates: Vec<(&BenchmarkQuestion, &str)> = records
            .iter()
            .filter(|r| {
                r.verdict(JudgeKind::Arbiter)
                    .and_then(|v| v.arbiter)
                    .is_some_and(|o| o == ArbiterOutcome::GenieCorrect)
            })
            .filter_map(|r| {
                let question = questions.iter().find(|q| q.id == r.question_id)?;
                Some((question, r.generated_query.as_deref()?))
            })
            .collect();

        if candidates.len() < self.config.optimizer.arbiter_correction_threshold {
            return Vec::new();
        }

        let mut corrections = Vec::new();
        for (question, new_query) in candidates {
            let corrected = question.corrected(new_query);
            if dry_run {
                info!(question_id = %question.id, version = corrected.version, "Expected query would be corrected");
                corrections.push(BenchmarkCorrection {
                    question_id: question.id.clone(),
                    old_query: question.expected_query.clone(),
                    new_query: corrected.expected_query,
                    new_version: corrected.version,
                    dry_run: true,
                });
                continue;
            }
            match self.collaborators.benchmarks.rewrite_expected(&corrected).await {
                Ok(()) => {
                    info!(question_id = %question.id, version = corrected.version, "Expected query corrected");
                    corrections.push(BenchmarkCorrection {
                        question_id: question.id.clone(),
                        old_query: question.expected_query.clone(),
                        new_query: corrected.expected_query,
                        new_version: corrected.version,
                        dry_run: false,
                    });
                }
                Err(err) => {
                    warn!(question_id = %question.id, error = %err, "Could not rewrite expected query");
                    warnings.push(format!("{}: correction not saved: {err}", question.id));
                }
            }
        }
        corrections
    }

    async fn repair(
        &self,
        options: &RunOptions,
        survivors: &[BenchmarkQuestion],
        records: &[EvaluationRecord],
        clusters: &ClusterReport,
    ) -> DomainResult<Repair> {
        let catalog = self.collaborators.metadata.list().await?;
        let mut history = self.collaborators.runs.load_history().await?;
        let queries: BTreeMap<String, String> = survivors
            .iter()
            .map(|q| (q.id.clone(), q.expected_query.clone()))
            .collect();

        let proposals = self.proposer.propose(
            &clusters.clusters,
            ProposalContext {
                catalog: &catalog,
                history: &history,
                queries: &queries,
            },
        );
        if !options.dry_run {
            history.advance(proposals.signatures.iter().map(String::as_str));
            self.collaborators.runs.save_history(&history).await?;
        }

        let batch = self.validator.select_batch(&proposals.proposals);
        if batch.is_empty() {
            return Ok(Repair {
                proposals,
                validation: None,
                apply: ApplyOutcome::NotAttempted {
                    reason: "no applicable proposals".to_string(),
                },
            });
        }

        let validated = match self.validator.approve(batch) {
            Ok(validated) => validated,
            Err(result) => {
                let reason = rejection_reason(&result);
                warn!(reason = %reason, "Patch set rejected, nothing applied");
                return Ok(Repair {
                    proposals,
                    validation: Some(result),
                    apply: ApplyOutcome::Rejected { reason },
                });
            }
        };
        let validation = Some(validated.result().clone());

        let apply = if validated.policy() == ApplyPolicy::RequiresConfirmation && !options.confirm {
            info!(risk = %validated.risk(), "Patch set awaits confirmation");
            ApplyOutcome::AwaitingConfirmation
        } else if options.dry_run {
            ApplyOutcome::DryRun
        } else {
            match self.applier.apply(&validated, options.confirm).await {
                Ok(log) if validated.policy() == ApplyPolicy::AutoApplyWithVerification => {
                    self.verify_or_revert(survivors, records, validated.touched_objects(), log)
                        .await
                }
                Ok(log) => ApplyOutcome::Applied {
                    log,
                    verification: None,
                },
                Err(ApplyError::ConfirmationRequired(_)) => ApplyOutcome::AwaitingConfirmation,
                Err(err) => {
                    let log = err.log().cloned().unwrap_or_default();
                    ApplyOutcome::Failed {
                        log,
                        error: err.to_string(),
                    }
                }
            }
        };

        Ok(Repair {
            proposals,
            validation,
            apply,
        })
    }

    /// Post-apply gate: re-evaluate the patched slice and the critical
    /// questions, rolling back on regression.
    async fn verify_or_revert(
        &self,
        survivors: &[BenchmarkQuestion],
        baseline: &[EvaluationRecord],
        touched: &[String],
        log: ApplyLog,
    ) -> ApplyOutcome {
        let report = self.verify(survivors, baseline, touched).await;
        if report.passed {
            info!(questions = report.questions, "Verification passed");
            return ApplyOutcome::Applied {
                log,
                verification: Some(report),
            };
        }

        let reason = report
            .regressions
            .iter()
            .cloned()
            .chain(
                report
                    .critical_failures
                    .iter()
                    .map(|id| format!("critical question {id} now fails")),
            )
            .collect::<Vec<_>>()
            .join("; ");
        warn!(reason = %reason, "Verification failed, rolling back");

        match self.applier.rollback(&log).await {
            Ok(log) => ApplyOutcome::RolledBack {
                log,
                reason,
                verification: Some(report),
            },
            Err(err) => ApplyOutcome::Failed {
                log: err.log().cloned().unwrap_or(log),
                error: format!("verification failed ({reason}) and rollback failed: {err}"),
            },
        }
    }

    async fn verify(
        &self,
        survivors: &[BenchmarkQuestion],
        baseline: &[EvaluationRecord],
        touched: &[String],
    ) -> VerificationReport {
        let slice = Scope::Slice {
            patched: touched.to_vec(),
        };
        let critical = Scope::Tier {
            tier: PriorityTier::Critical,
        };
        let questions: Vec<BenchmarkQuestion> = survivors
            .iter()
            .filter(|q| slice.includes(q) || critical.includes(q))
            .cloned()
            .collect();
        let ids: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        let before: Vec<EvaluationRecord> = baseline
            .iter()
            .filter(|r| ids.contains(r.question_id.as_str()))
            .cloned()
            .collect();

        let after = self.evaluator.evaluate(&questions).await;

        let baseline_rates = pass_rates(&before);
        let after_rates = pass_rates(&after);
        let tolerance = self.config.optimizer.regression_tolerance;
        let regressions: Vec<String> = baseline_rates
            .iter()
            .filter_map(|(kind, before_rate)| {
                let after_rate = after_rates.get(kind)?;
                (before_rate - after_rate > tolerance)
                    .then(|| format!("{kind} dropped from {before_rate:.3} to {after_rate:.3}"))
            })
            .collect();

        let critical_failures: Vec<String> = questions
            .iter()
            .filter(|q| q.tier == PriorityTier::Critical)
            .filter(|q| {
                let passed_before = before
                    .iter()
                    .any(|r| r.question_id == q.id && r.is_correct());
                let passes_now = after.iter().any(|r| r.question_id == q.id && r.is_correct());
                passed_before && !passes_now
            })
            .map(|q| q.id.clone())
            .collect();

        VerificationReport {
            questions: questions.len(),
            passed: regressions.is_empty() && critical_failures.is_empty(),
            baseline: baseline_rates,
            after: after_rates,
            regressions,
            critical_failures,
        }
    }
}

/// Everything one iteration produced
struct Pass {
    records: Vec<EvaluationRecord>,
    repeatability: Option<RepeatabilityReport>,
    cross_iteration: Option<CrossIterationReport>,
    arbiter_outcomes: BTreeMap<String, usize>,
    corrections: Vec<BenchmarkCorrection>,
    clusters: ClusterReport,
    repair: Repair,
    judge_scores: BTreeMap<JudgeKind, JudgeScore>,
    accuracy: f64,
    thresholds_met: bool,
    failing_questions: usize,
    stop: Option<StopReason>,
}

impl Pass {
    fn summary(&self, iteration: usize) -> IterationSummary {
        IterationSummary {
            iteration,
            evaluated: self.records.len(),
            accuracy: self.accuracy,
            thresholds_met: self.thresholds_met,
            failing_questions: self.failing_questions,
            clusters: self.clusters.clusters.len(),
            proposals: self.repair.proposals.proposals.len(),
            apply: self.repair.apply.clone(),
            cross_iteration: self.cross_iteration.clone(),
        }
    }
}

/// Best accuracy so far and how many iterations have failed to beat it
struct Progress {
    best: Option<(usize, f64)>,
    since_best: usize,
    plateau: usize,
}

impl Progress {
    fn new(plateau: usize) -> Self {
        Self {
            best: None,
            since_best: 0,
            plateau: plateau.max(1),
        }
    }

    /// Record an iteration's accuracy; true once the plateau is reached.
    fn record(&mut self, iteration: usize, accuracy: f64) -> bool {
        match self.best {
            Some((_, best)) if accuracy <= best => self.since_best += 1,
            _ => {
                self.best = Some((iteration, accuracy));
                self.since_best = 0;
            }
        }
        self.since_best >= self.plateau
    }

    fn best_iteration(&self) -> usize {
        self.best.map_or(1, |(iteration, _)| iteration)
    }
}

impl Repair {
    fn skipped(reason: &str) -> Self {
        Self {
            proposals: Proposals::default(),
            validation: None,
            apply: ApplyOutcome::NotAttempted {
                reason: reason.to_string(),
            },
        }
    }
}

fn pass_rates(records: &[EvaluationRecord]) -> BTreeMap<JudgeKind, f64> {
    judge_scores(records)
        .into_iter()
        .filter_map(|(kind, score)| score.pass_rate.map(|rate| (kind, rate)))
        .collect()
}

fn tally_arbiter(records: &[EvaluationRecord]) -> BTreeMap<String, usize> {
    let mut outcomes = BTreeMap::new();
    for outcome in records
        .iter()
        .filter_map(|r| r.verdict(JudgeKind::Arbiter).and_then(|v| v.arbiter))
    {
        *outcomes.entry(outcome.as_str().to_string()).or_insert(0) += 1;
    }
    outcomes
}

fn rejection_reason(result: &ValidationResult) -> String {
    result
        .conflicts
        .iter()
        .map(|c| format!("{} conflicts with {} on {} ({})", c.first, c.second, c.target, c.rule))
        .chain(result.issues.iter().cloned())
        .collect::<Vec<_>>()
        .join("; ")
}
