//! Reconciles the remote access rule list into the local cache.
//!
//! Rules are processed one at a time. Each rule is its own unit of failure:
//! remote fetches for a rule complete before anything is written, so a
//! failed fetch leaves the cached rule and its targets untouched.

use std::future::Future;
use std::sync::Arc;

use rolegate_core::{AppError, AppResult, DeploymentId};
use rolegate_domain::TargetProviderKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access_rule_ports::{AccessRuleAuthority, AccessRuleCacheRepository, RemoteAccessRule};

/// Counts produced by one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessRuleSyncReport {
    /// Rules cached for the first time.
    pub created: usize,
    /// Rules refreshed because the remote copy was newer.
    pub updated: usize,
    /// Rules already current.
    pub unchanged: usize,
    /// Rules ignored because of an unsupported provider type.
    pub skipped: usize,
}

impl AccessRuleSyncReport {
    fn record(&mut self, outcome: RuleSyncOutcome) {
        match outcome {
            RuleSyncOutcome::Created => self.created += 1,
            RuleSyncOutcome::Updated => self.updated += 1,
            RuleSyncOutcome::Unchanged => self.unchanged += 1,
            RuleSyncOutcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleSyncOutcome {
    Created,
    Updated,
    Unchanged,
    Skipped,
}

/// Application service keeping one deployment's cache in step with the
/// remote authority.
#[derive(Clone)]
pub struct AccessRuleSyncService {
    deployment_id: DeploymentId,
    authority: Arc<dyn AccessRuleAuthority>,
    cache: Arc<dyn AccessRuleCacheRepository>,
}

impl AccessRuleSyncService {
    /// Creates a sync service for one deployment.
    #[must_use]
    pub fn new(
        deployment_id: DeploymentId,
        authority: Arc<dyn AccessRuleAuthority>,
        cache: Arc<dyn AccessRuleCacheRepository>,
    ) -> Self {
        Self {
            deployment_id,
            authority,
            cache,
        }
    }

    /// Fetches the remote rule list and reconciles every rule.
    pub async fn sync(&self, cancellation: &CancellationToken) -> AppResult<AccessRuleSyncReport> {
        let remote_rules =
            until_cancelled(cancellation, self.authority.list_access_rules()).await?;
        self.sync_rules(remote_rules, cancellation).await
    }

    /// Reconciles an already fetched remote rule list.
    ///
    /// Rules that fail keep their previous cached state; rules that succeed
    /// keep their updates even when others fail, and the failures are
    /// reported together as [`AppError::SyncIncomplete`].
    pub async fn sync_rules(
        &self,
        remote_rules: Vec<RemoteAccessRule>,
        cancellation: &CancellationToken,
    ) -> AppResult<AccessRuleSyncReport> {
        let total = remote_rules.len();
        let mut report = AccessRuleSyncReport::default();
        let mut failures = Vec::new();

        for (processed, remote_rule) in remote_rules.iter().enumerate() {
            if cancellation.is_cancelled() {
                return Err(AppError::Cancelled(format!(
                    "access rule sync stopped after {processed} of {total} rules"
                )));
            }

            match self.sync_rule(remote_rule, cancellation).await {
                Ok(outcome) => report.record(outcome),
                Err(AppError::Cancelled(message)) => return Err(AppError::Cancelled(message)),
                Err(error) => {
                    warn!(
                        deployment = %self.deployment_id,
                        rule_id = %remote_rule.id,
                        error = %error,
                        "failed to sync access rule"
                    );
                    failures.push(format!("'{}': {error}", remote_rule.id));
                }
            }
        }

        info!(
            deployment = %self.deployment_id,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = failures.len(),
            "access rule sync finished"
        );

        if !failures.is_empty() {
            return Err(AppError::SyncIncomplete(format!(
                "{} of {total} access rules failed to sync: {}",
                failures.len(),
                failures.join("; ")
            )));
        }

        Ok(report)
    }

    async fn sync_rule(
        &self,
        remote_rule: &RemoteAccessRule,
        cancellation: &CancellationToken,
    ) -> AppResult<RuleSyncOutcome> {
        if TargetProviderKind::from_provider_type(remote_rule.target_provider_type.as_str())
            .is_none()
        {
            debug!(
                rule_id = %remote_rule.id,
                provider_type = %remote_rule.target_provider_type,
                "skipping access rule with unsupported provider type"
            );
            return Ok(RuleSyncOutcome::Skipped);
        }

        let rule = remote_rule.to_access_rule(self.deployment_id.clone())?;
        let outcome = match self.cache.find_rule(rule.id()).await? {
            None => RuleSyncOutcome::Created,
            // An unset approval flag marks a sync that never finished.
            Some(cached) if cached.requires_approval().is_none() => RuleSyncOutcome::Updated,
            Some(cached) if rule.is_newer_than(&cached) => RuleSyncOutcome::Updated,
            Some(_) => {
                debug!(rule_id = %rule.id(), "access rule is current");
                return Ok(RuleSyncOutcome::Unchanged);
            }
        };

        let approvers =
            until_cancelled(cancellation, self.authority.list_approvers(rule.id())).await?;
        let requires_approval = !approvers.is_empty();
        let detail =
            until_cancelled(cancellation, self.authority.get_rule_detail(rule.id())).await?;
        let targets = detail.to_access_targets(rule.id())?;

        debug!(
            rule_id = %rule.id(),
            requires_approval,
            target_count = targets.len(),
            outcome = ?outcome,
            "writing access rule to cache"
        );

        // The approval flag is written last so an interrupted write sequence
        // is retried on the next run.
        let rule_id = rule.id().clone();
        self.cache.upsert_rule(rule).await?;
        self.cache.replace_targets(&rule_id, targets).await?;
        self.cache
            .set_requires_approval(&rule_id, requires_approval)
            .await?;

        Ok(outcome)
    }
}

async fn until_cancelled<T>(
    cancellation: &CancellationToken,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(AppError::Cancelled(
            "access rule sync was cancelled".to_owned(),
        )),
        result = future => result,
    }
}
