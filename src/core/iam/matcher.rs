//! Statement matching against a qualified action and resource
//!
//! Produces the set of statements that apply to one request. Precedence
//! between the matched statements is the effect resolver's job.

use super::context::EvaluationContext;
use super::pattern::PatternMatcher;
use super::policy::{Effect, PolicyVersion, Statement};
use super::principal::ResourceAccount;
use super::quota::QuotaLimit;

/// How strictly statements are matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Full matching: action, resource, principal and conditions
    #[default]
    All,
    /// Resource-agnostic probe over statements without conditions
    ///
    /// Allow statements count for any resource pattern; Deny statements count
    /// only when they cover every resource. This is NOT sound for gating a
    /// concrete resource: a Deny scoped to that resource is not seen.
    Unconditional,
}

/// A statement that applies to the request, with its source policy
#[derive(Debug, Clone, Copy)]
pub struct MatchedStatement<'a> {
    pub policy: &'a PolicyVersion,
    pub statement: &'a Statement,
    /// Supplied as the request's resource policy rather than bound to the
    /// principal. The policy's own scope tag plays no part.
    pub resource_side: bool,
}

impl MatchedStatement<'_> {
    pub fn effect(&self) -> Effect {
        self.statement.effect
    }

    /// True when the statement came from the request's resource policy
    pub fn from_resource_policy(&self) -> bool {
        self.resource_side
    }
}

pub struct StatementMatcher<'a> {
    patterns: &'a PatternMatcher,
}

impl<'a> StatementMatcher<'a> {
    pub fn new(patterns: &'a PatternMatcher) -> Self {
        StatementMatcher { patterns }
    }

    /// Allow/Deny statements that apply to the request
    ///
    /// The optional resource policy is merged after the identity policies.
    /// Only its statements are matched against their `Principal` element.
    pub fn matching<'c>(
        &self,
        context: &'c EvaluationContext,
        resource_policy: Option<&'c PolicyVersion>,
        mode: MatchMode,
        resource_account: &ResourceAccount,
        resource_name: &str,
    ) -> Vec<MatchedStatement<'c>> {
        let identity = context.statements().map(|(policy, statement)| MatchedStatement {
            policy,
            statement,
            resource_side: false,
        });
        let resource_side = resource_policy.into_iter().flat_map(|policy| {
            policy.statements().iter().map(move |statement| MatchedStatement {
                policy,
                statement,
                resource_side: true,
            })
        });

        identity
            .chain(resource_side)
            .filter(|matched| self.applies(context, matched, mode, resource_account, resource_name))
            .collect()
    }

    fn applies(
        &self,
        context: &EvaluationContext,
        matched: &MatchedStatement<'_>,
        mode: MatchMode,
        resource_account: &ResourceAccount,
        resource_name: &str,
    ) -> bool {
        let statement = matched.statement;
        if statement.effect == Effect::Limit {
            return false;
        }
        if !statement.matches_action(self.patterns, context.action()) {
            return false;
        }
        if matched.resource_side
            && !statement.matches_principal(self.patterns, context.effective_principal())
        {
            return false;
        }

        match mode {
            MatchMode::All => {
                statement.matches_resource(
                    self.patterns,
                    resource_account,
                    context.resource_type(),
                    resource_name,
                ) && statement.conditions_hold(context.keys(), self.patterns)
            }
            MatchMode::Unconditional => {
                statement.is_unconditional()
                    && (statement.effect == Effect::Allow || statement.covers_all_resources())
            }
        }
    }

    /// Quota limits of `Limit` statements that apply to the allocation
    ///
    /// Only the identity policies of the context are consulted. Allocations
    /// are made in the principal's own account.
    pub fn matching_limits<'c>(
        &self,
        context: &'c EvaluationContext,
        resource_name: &str,
    ) -> Vec<&'c QuotaLimit> {
        let resource_type = match context.resource_type() {
            Some(resource_type) => resource_type,
            None => return Vec::new(),
        };
        let owner = ResourceAccount::account(context.principal().account_number());

        context
            .statements()
            .filter(|(_, statement)| statement.effect == Effect::Limit)
            .filter_map(|(_, statement)| {
                let quota = statement.quota.as_ref()?;
                let applies = quota.resource_type == *resource_type
                    && statement.matches_action(self.patterns, context.action())
                    && statement.matches_resource(self.patterns, &owner, Some(resource_type), resource_name)
                    && statement.conditions_hold(context.keys(), self.patterns);
                applies.then_some(quota)
            })
            .collect()
    }
}
