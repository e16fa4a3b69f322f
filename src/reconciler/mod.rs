//! Policy set reconciliation engine
//!
//! Converges a remote policy set onto a declared target state. Every run
//! fetches a fresh snapshot, binds desired items to remote identifiers,
//! validates, diffs, and then applies the mutations in a fixed order:
//!
//! 1. Policy set create or patch
//! 2. Placeholder renames
//! 3. Policy creates, then their settings and filters
//! 4. Deleted policies' children, then the policies
//! 5. Filter deletes, setting deletes, policy patches and setting upserts,
//!    filter creates
//! 6. Rank (skipped when the remote order already matches)
//! 7. Association removals, then additions
//! 8. Re-fetch of the converged state
//!
//! Steps run strictly one after another. The first error diagnostic stops
//! the run; nothing already applied is rolled back.

pub mod association;
pub mod batch;
pub mod bind;
pub mod diagnostics;
pub mod diff;
pub mod plan;
pub mod priority;
pub mod rename;
pub mod session;
pub mod snapshot;
pub mod validation;

pub use association::AssociationPlan;
pub use batch::{BatchStep, Mutation};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use diff::{PolicyDiff, PolicyUpdate, Rename};
pub use plan::{ChangeKind, Plan, PlannedChange, PolicySetAction};
pub use priority::{PriorityState, RankPlan};
pub use session::Session;
pub use validation::{ValidationContext, ValidationError};

use crate::config::{Deployment, ReconcileConfig};
use crate::model::{FilterData, PolicySet};
use crate::remote::{BatchOutcome, PolicyService, ServiceVersion};
use diff::policy_body;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Bound desired state together with its plan.
#[derive(Debug, Clone)]
pub struct Planned {
    /// Desired state with remote identifiers filled in.
    pub desired: PolicySet,
    pub remote: Option<PolicySet>,
    pub plan: Plan,
    pub warnings: Diagnostics,
}

/// A submitted batch and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: BatchStep,
    pub outcome: BatchOutcome,
}

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct Applied {
    /// Refreshed remote state after convergence.
    pub state: PolicySet,
    pub plan: Plan,
    pub warnings: Diagnostics,
    pub batches: Vec<StepOutcome>,
    /// Whether a rank request was sent.
    pub ranked: bool,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Policy set reconciler
pub struct PolicySetReconciler {
    service: Arc<dyn PolicyService>,
    config: ReconcileConfig,
    log_bodies: bool,
}

impl PolicySetReconciler {
    pub fn new(service: Arc<dyn PolicyService>, config: ReconcileConfig) -> Self {
        Self {
            service,
            config,
            log_bodies: false,
        }
    }

    /// Log serialized batch item bodies at debug level.
    pub fn with_body_logging(mut self, enabled: bool) -> Self {
        self.log_bodies = enabled;
        self
    }

    fn session<'a>(&'a self, cancel: &'a CancellationToken) -> Session<'a> {
        Session::new(self.service.as_ref(), cancel).with_body_logging(self.log_bodies)
    }

    /// Compute the plan without mutating anything.
    pub async fn plan(
        &self,
        desired: &PolicySet,
        cancel: &CancellationToken,
    ) -> Result<Planned, Diagnostics> {
        let span = tracing::info_span!(
            "plan",
            run_id = %uuid::Uuid::new_v4(),
            policy_set = %desired.name
        );
        let start = Instant::now();
        let result = self
            .prepare(&self.session(cancel), desired)
            .instrument(span)
            .await;
        record_duration("plan", start);
        result
    }

    /// Converge the remote policy set onto the desired state.
    pub async fn apply(
        &self,
        desired: &PolicySet,
        cancel: &CancellationToken,
    ) -> Result<Applied, Diagnostics> {
        let span = tracing::info_span!(
            "apply",
            run_id = %uuid::Uuid::new_v4(),
            policy_set = %desired.name
        );
        let start = Instant::now();
        let result = async {
            let session = self.session(cancel);
            let planned = self.prepare(&session, desired).await?;
            self.execute(&session, planned).await
        }
        .instrument(span)
        .await;
        record_duration("apply", start);

        match &result {
            Ok(applied) => tracing::info!(
                policy_set_id = %applied.state.id,
                batches = applied.batches.len(),
                ranked = applied.ranked,
                "Policy set converged"
            ),
            Err(report) => tracing::error!(
                errors = report.errors().count(),
                "Reconciliation failed"
            ),
        }
        result
    }

    /// Read the current remote state of the declared policy set.
    ///
    /// `Ok(None)` means the policy set no longer exists and should be
    /// treated as destroyed.
    pub async fn refresh(
        &self,
        desired: &PolicySet,
        cancel: &CancellationToken,
    ) -> Result<Option<PolicySet>, Diagnostics> {
        let session = self.session(cancel);
        let mut warnings = Diagnostics::new();
        let sets = session
            .list_policy_sets()
            .await
            .map_err(|e| Diagnostic::remote("Failed to list policy sets", &e))?;

        let Some(id) = bind::resolve_policy_set_id(desired, &sets, &mut warnings) else {
            tracing::info!(policy_set = %desired.name, "Policy set not found");
            return Ok(None);
        };
        Ok(snapshot::fetch_policy_set(&session, &id).await?)
    }

    /// Delete the declared policy set and everything in it.
    ///
    /// Delivery groups are first returned to the default policy set. The
    /// default policy set itself is refused. Returns the warnings of the run.
    pub async fn destroy(
        &self,
        desired: &PolicySet,
        cancel: &CancellationToken,
    ) -> Result<Diagnostics, Diagnostics> {
        let span = tracing::info_span!(
            "destroy",
            run_id = %uuid::Uuid::new_v4(),
            policy_set = %desired.name
        );
        let start = Instant::now();
        let result = self
            .destroy_inner(&self.session(cancel), desired)
            .instrument(span)
            .await;
        record_duration("destroy", start);
        result
    }

    async fn destroy_inner(
        &self,
        session: &Session<'_>,
        desired: &PolicySet,
    ) -> Result<Diagnostics, Diagnostics> {
        let mut warnings = Diagnostics::new();
        let sets = session
            .list_policy_sets()
            .await
            .map_err(|e| Diagnostic::remote("Failed to list policy sets", &e))?;

        let Some(id) = bind::resolve_policy_set_id(desired, &sets, &mut warnings) else {
            warnings.push(Diagnostic::warning(
                format!("Policy set '{}' does not exist", desired.name),
                "nothing to destroy",
            ));
            return Ok(warnings);
        };

        let Some(current) = snapshot::fetch_policy_set(session, &id)
            .await
            .map_err(|d| warnings.clone().fail(d))?
        else {
            return Ok(warnings);
        };

        if current.is_default() {
            return Err(warnings.fail(
                ValidationError::DefaultPolicySet {
                    action: "be destroyed".to_string(),
                }
                .into(),
            ));
        }

        let associations = AssociationPlan::compute(&current.delivery_groups, &Default::default());
        let steps = [
            (BatchStep::RemoveAssociations, associations.removal_mutations()),
            (BatchStep::DeletePolicyChildren, child_deletes(&current.policies)),
            (
                BatchStep::DeletePolicies,
                current
                    .policies
                    .iter()
                    .map(|p| Mutation::DeletePolicy {
                        policy_id: p.id.clone(),
                    })
                    .collect(),
            ),
        ];
        for (step, mutations) in steps {
            session
                .submit(step, &mutations)
                .await
                .map_err(|d| warnings.clone().fail(d))?;
        }

        session
            .delete_policy_set(&id)
            .await
            .map_err(|e| warnings.clone().fail(Diagnostic::remote("Failed to delete policy set", &e)))?;

        tracing::info!(policy_set_id = %id, "Policy set destroyed");
        Ok(warnings)
    }

    /// Fetch, bind, plan and validate.
    async fn prepare(
        &self,
        session: &Session<'_>,
        desired: &PolicySet,
    ) -> Result<Planned, Diagnostics> {
        let mut warnings = Diagnostics::new();

        let sets = session
            .list_policy_sets()
            .await
            .map_err(|e| Diagnostic::remote("Failed to list policy sets", &e))?;

        let remote = match bind::resolve_policy_set_id(desired, &sets, &mut warnings) {
            Some(id) => snapshot::fetch_policy_set(session, &id)
                .await
                .map_err(|d| warnings.clone().fail(d))?,
            None => None,
        };

        let mut bound = desired.clone();
        bound.id = remote.as_ref().map(|r| r.id.clone()).unwrap_or_default();
        warnings.extend(bind::bind_policies(&mut bound, remote.as_ref()));

        let plan = Plan::build(&bound, remote.as_ref(), self.config.filter_strategy);

        let report = self
            .validate(session, &bound, remote.as_ref(), &sets, &plan)
            .await
            .map_err(|d| warnings.clone().fail(d))?;
        if !report.is_empty() {
            let mut all = warnings;
            all.extend(report);
            return Err(all);
        }

        tracing::info!(
            creates = plan.policies.to_create.len(),
            updates = plan.policies.to_update.len(),
            deletes = plan.policies.to_delete.len(),
            renames = plan.policies.renamed.len(),
            reorder = plan.reorder,
            "Plan computed"
        );

        Ok(Planned {
            desired: bound,
            remote,
            plan,
            warnings,
        })
    }

    async fn validate(
        &self,
        session: &Session<'_>,
        desired: &PolicySet,
        remote: Option<&PolicySet>,
        sets: &[crate::remote::PolicySetRecord],
        plan: &Plan,
    ) -> Result<Diagnostics, Diagnostic> {
        let deployment = session.service().deployment();
        let service_version = if deployment == Deployment::OnPremises {
            Some(
                session
                    .service_version()
                    .await
                    .map_err(|e| Diagnostic::remote("Failed to read service version", &e))?,
            )
        } else {
            None
        };

        let catalog = session
            .list_setting_definitions()
            .await
            .map_err(|e| Diagnostic::remote("Failed to read setting definitions", &e))?;
        let groups = session
            .list_delivery_groups()
            .await
            .map_err(|e| Diagnostic::remote("Failed to read delivery groups", &e))?;

        let uses_tags = desired
            .policies
            .iter()
            .flat_map(|p| &p.filters)
            .any(|f| matches!(f.data, FilterData::Tag(_)));
        let tags = if uses_tags {
            session
                .list_tags()
                .await
                .map_err(|e| Diagnostic::remote("Failed to read tags", &e))?
        } else {
            Vec::new()
        };
        let scopes = if desired.scopes.is_empty() {
            Vec::new()
        } else {
            session
                .list_scopes()
                .await
                .map_err(|e| Diagnostic::remote("Failed to read scopes", &e))?
        };

        let ctx = ValidationContext {
            deployment,
            service_version,
            min_on_premises_version: ServiceVersion::parse(&self.config.min_on_premises_version),
            setting_catalog: &catalog,
            delivery_groups: &groups,
            tags: &tags,
            scopes: &scopes,
            policy_sets: sets,
            remote,
            placeholders: &plan.placeholders,
        };
        Ok(validation::validate_diagnostics(desired, &ctx))
    }

    /// Apply a validated plan.
    async fn execute(
        &self,
        session: &Session<'_>,
        planned: Planned,
    ) -> Result<Applied, Diagnostics> {
        let Planned {
            desired,
            remote,
            plan,
            warnings,
        } = planned;
        let mut run = Run {
            session,
            warnings,
            batches: Vec::new(),
        };

        // 1. Policy set record
        let set_id = match &plan.action {
            PolicySetAction::Create(body) => {
                let record = session
                    .create_policy_set(body)
                    .await
                    .map_err(|e| run.abort(Diagnostic::remote("Failed to create policy set", &e)))?;
                tracing::info!(policy_set_id = %record.policy_set_guid, "Policy set created");
                record.policy_set_guid
            }
            PolicySetAction::Update(body) => {
                let id = desired.id.clone();
                session
                    .update_policy_set(&id, body)
                    .await
                    .map_err(|e| run.abort(Diagnostic::remote("Failed to update policy set", &e)))?;
                id
            }
            PolicySetAction::Unchanged => desired.id.clone(),
        };

        // 2. Placeholders
        run.submit(
            BatchStep::RenamePlaceholders,
            rename::placeholder_mutations(&plan.placeholders),
        )
        .await?;

        // 3. Creates
        let diff = &plan.policies;
        run.submit(
            BatchStep::CreatePolicies,
            diff.to_create
                .iter()
                .map(|p| Mutation::CreatePolicy {
                    policy_set_id: set_id.clone(),
                    policy: policy_body(p),
                })
                .collect(),
        )
        .await?;

        if !diff.to_create.is_empty() {
            let known: HashSet<&str> = remote
                .iter()
                .flat_map(|r| &r.policies)
                .map(|p| p.id.as_str())
                .collect();
            let fetched = run.fetch(&set_id).await?;
            let new_ids: HashMap<String, String> = fetched
                .policies
                .iter()
                .filter(|p| !known.contains(p.id.as_str()))
                .map(|p| (p.key(), p.id.clone()))
                .collect();

            let mut settings = Vec::new();
            let mut filters = Vec::new();
            for policy in &diff.to_create {
                let Some(id) = new_ids.get(&policy.key()) else {
                    return Err(run.abort(Diagnostic::error(
                        format!("Created policy '{}' not found", policy.name),
                        "the policy is missing from the re-fetched policy set",
                    )));
                };
                settings.extend(policy.settings.iter().map(|s| Mutation::CreateSetting {
                    policy_id: id.clone(),
                    setting: s.clone(),
                }));
                filters.extend(policy.filters.iter().map(|f| Mutation::CreateFilter {
                    policy_id: id.clone(),
                    filter: f.clone(),
                }));
            }
            run.submit(BatchStep::CreateSettings, settings).await?;
            run.submit(BatchStep::CreateFilters, filters).await?;
        }

        // 4. Deletes
        run.submit(BatchStep::DeletePolicyChildren, child_deletes(&diff.to_delete))
            .await?;
        run.submit(
            BatchStep::DeletePolicies,
            diff.to_delete
                .iter()
                .map(|p| Mutation::DeletePolicy {
                    policy_id: p.id.clone(),
                })
                .collect(),
        )
        .await?;

        // 5. Updates
        let updates = &diff.to_update;
        run.submit(
            BatchStep::DeleteFilters,
            updates
                .iter()
                .flat_map(|u| &u.filters.delete)
                .map(|f| Mutation::DeleteFilter {
                    filter_id: f.id.clone(),
                })
                .collect(),
        )
        .await?;
        run.submit(
            BatchStep::DeleteSettings,
            updates
                .iter()
                .flat_map(|u| &u.settings.delete)
                .map(|s| Mutation::DeleteSetting {
                    setting_id: s.id.clone(),
                })
                .collect(),
        )
        .await?;

        let mut patches = Vec::new();
        for update in updates {
            if let Some(body) = &update.attributes {
                patches.push(Mutation::UpdatePolicy {
                    policy_id: update.policy_id.clone(),
                    policy: body.clone(),
                });
            }
            patches.extend(update.settings.create.iter().map(|s| Mutation::CreateSetting {
                policy_id: update.policy_id.clone(),
                setting: s.clone(),
            }));
            patches.extend(
                update
                    .settings
                    .update
                    .iter()
                    .map(|s| Mutation::UpdateSetting { setting: s.clone() }),
            );
        }
        run.submit(BatchStep::UpdatePolicies, patches).await?;

        run.submit(
            BatchStep::ReplaceFilters,
            updates
                .iter()
                .flat_map(|u| {
                    u.filters.create.iter().map(|f| Mutation::CreateFilter {
                        policy_id: u.policy_id.clone(),
                        filter: f.clone(),
                    })
                })
                .collect(),
        )
        .await?;

        // 6. Priority
        let current = run.fetch(&set_id).await?;
        let rank = priority::plan_rank(&plan.desired_order, &current.policies);
        for name in &rank.skipped {
            run.warnings.push(Diagnostic::warning(
                format!("Policy '{}' skipped while ranking", name),
                "the policy is not present remotely",
            ));
        }
        let ranked = rank.needs_rank();
        if ranked {
            let accepted = session
                .rank_policies(&set_id, &rank.order)
                .await
                .map_err(|e| run.abort(Diagnostic::remote("Failed to rank policies", &e)))?;
            if !accepted {
                return Err(run.abort(Diagnostic::error(
                    "Failed to rank policies",
                    "the service rejected the rank request",
                )));
            }
            tracing::info!(policies = rank.order.len(), "Policies ranked");
        } else {
            tracing::debug!("Policy order already matches");
        }

        // 7. Associations
        let associations =
            AssociationPlan::for_policy_set(&set_id, &current.delivery_groups, &desired.delivery_groups);
        run.submit(BatchStep::RemoveAssociations, associations.removal_mutations())
            .await?;
        run.submit(BatchStep::AddAssociations, associations.add_mutations(&set_id))
            .await?;

        // 8. Refreshed state
        let state = run.fetch(&set_id).await?;

        Ok(Applied {
            state,
            plan,
            warnings: run.warnings,
            batches: run.batches,
            ranked,
            completed_at: chrono::Utc::now(),
        })
    }
}

/// Per-apply bookkeeping: the warnings so far and every submitted batch.
struct Run<'s, 'a> {
    session: &'s Session<'a>,
    warnings: Diagnostics,
    batches: Vec<StepOutcome>,
}

impl Run<'_, '_> {
    fn abort(&self, diagnostic: Diagnostic) -> Diagnostics {
        self.warnings.clone().fail(diagnostic)
    }

    async fn submit(&mut self, step: BatchStep, mutations: Vec<Mutation>) -> Result<(), Diagnostics> {
        match self.session.submit(step, &mutations).await {
            Ok(Some(outcome)) => {
                self.batches.push(StepOutcome { step, outcome });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(d) => Err(self.abort(d)),
        }
    }

    async fn fetch(&self, set_id: &str) -> Result<PolicySet, Diagnostics> {
        match snapshot::fetch_policy_set(self.session, set_id).await {
            Ok(Some(set)) => Ok(set),
            Ok(None) => Err(self.abort(Diagnostic::error(
                "Policy set disappeared during reconciliation",
                format!("policy set {} no longer exists", set_id),
            ))),
            Err(d) => Err(self.abort(d)),
        }
    }
}

/// Settings and filters of policies about to be deleted.
fn child_deletes(policies: &[crate::model::Policy]) -> Vec<Mutation> {
    policies
        .iter()
        .flat_map(|p| {
            p.settings
                .iter()
                .map(|s| Mutation::DeleteSetting {
                    setting_id: s.id.clone(),
                })
                .chain(p.filters.iter().map(|f| Mutation::DeleteFilter {
                    filter_id: f.id.clone(),
                }))
        })
        .collect()
}

fn record_duration(operation: &'static str, start: Instant) {
    metrics::histogram!("policyset_reconcile_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
