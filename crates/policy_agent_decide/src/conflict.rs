//! Conflict evaluation.
//!
//! Each policy decides on its own from the kinds of its matched rules and its
//! conflict strategy. Policies are then combined most-restrictive-first:
//! `Deny > Indeterminate > Permit > NotApplicable`.

use indexmap::IndexMap;
use policy_agent_core::{ConflictStrategy, Decision, Obligation, RuleKind, RuleRecord};

/// Combined result for one requested action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Combined decision
    pub decision: Decision,
    /// Obligations attached to a conclusive decision
    pub obligations: Vec<Obligation>,
}

impl Evaluation {
    /// No policy applies
    #[must_use]
    pub fn not_applicable() -> Self {
        Self {
            decision: Decision::NotApplicable,
            obligations: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct PolicyMatch<'a> {
    conflict: ConflictStrategy,
    permission: bool,
    prohibition: bool,
    obligations: Vec<&'a RuleRecord>,
}

impl PolicyMatch<'_> {
    fn decision(&self) -> Decision {
        match (self.permission, self.prohibition) {
            (false, false) => Decision::NotApplicable,
            (true, false) => Decision::Permit,
            (false, true) => Decision::Deny,
            (true, true) => match self.conflict {
                ConflictStrategy::Perm => Decision::Permit,
                ConflictStrategy::Prohibit => Decision::Deny,
                ConflictStrategy::Invalid => Decision::Indeterminate,
            },
        }
    }
}

/// Evaluate the rules matched for one requested action.
///
/// A voided policy (`invalid` strategy with both permissions and
/// prohibitions) contributes `Indeterminate` and none of its obligations.
/// Obligations of the remaining policies attach when the combined decision
/// is conclusive and the policy either agrees with it or has no permission
/// or prohibition of its own.
#[must_use]
pub fn evaluate(records: &[RuleRecord]) -> Evaluation {
    let mut policies: IndexMap<&str, PolicyMatch<'_>> = IndexMap::new();
    for record in records {
        let policy = policies.entry(record.policy.as_str()).or_default();
        policy.conflict = record.conflict;
        match record.kind {
            RuleKind::Permission => policy.permission = true,
            RuleKind::Prohibition => policy.prohibition = true,
            RuleKind::Obligation => policy.obligations.push(record),
        }
    }

    let decision = Decision::combine(policies.values().map(PolicyMatch::decision));
    if !decision.is_conclusive() {
        return Evaluation {
            decision,
            obligations: Vec::new(),
        };
    }

    let mut obligations: Vec<Obligation> = Vec::new();
    for policy in policies.values() {
        let own = policy.decision();
        if own != decision && own != Decision::NotApplicable {
            continue;
        }
        for record in &policy.obligations {
            let obligation = Obligation {
                policy: record.policy.clone(),
                rule: record.rule.clone(),
                action: record.action.clone(),
            };
            if !obligations.contains(&obligation) {
                obligations.push(obligation);
            }
        }
    }

    Evaluation {
        decision,
        obligations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(policy: &str, rule: &str, kind: RuleKind, conflict: ConflictStrategy) -> RuleRecord {
        RuleRecord {
            action: "use".to_string(),
            policy: policy.to_string(),
            rule: rule.to_string(),
            kind,
            conflict,
        }
    }

    #[test]
    fn test_no_rules_not_applicable() {
        assert_eq!(evaluate(&[]), Evaluation::not_applicable());
    }

    #[test]
    fn test_single_kinds() {
        let permit = evaluate(&[record("p", "r1", RuleKind::Permission, ConflictStrategy::Invalid)]);
        assert_eq!(permit.decision, Decision::Permit);

        let deny = evaluate(&[record("p", "r1", RuleKind::Prohibition, ConflictStrategy::Invalid)]);
        assert_eq!(deny.decision, Decision::Deny);
    }

    #[test]
    fn test_conflict_strategies() {
        let both = |conflict| {
            evaluate(&[
                record("p", "r1", RuleKind::Permission, conflict),
                record("p", "r2", RuleKind::Prohibition, conflict),
            ])
            .decision
        };
        assert_eq!(both(ConflictStrategy::Perm), Decision::Permit);
        assert_eq!(both(ConflictStrategy::Prohibit), Decision::Deny);
        assert_eq!(both(ConflictStrategy::Invalid), Decision::Indeterminate);
    }

    #[test]
    fn test_voided_policy_outranks_permit() {
        let evaluation = evaluate(&[
            record("voided", "r1", RuleKind::Permission, ConflictStrategy::Invalid),
            record("voided", "r2", RuleKind::Prohibition, ConflictStrategy::Invalid),
            record("open", "r3", RuleKind::Permission, ConflictStrategy::Perm),
            record("open", "r4", RuleKind::Obligation, ConflictStrategy::Perm),
        ]);
        assert_eq!(evaluation.decision, Decision::Indeterminate);
        assert!(evaluation.obligations.is_empty());
    }

    #[test]
    fn test_obligations_follow_final_decision() {
        let evaluation = evaluate(&[
            record("grant", "r1", RuleKind::Permission, ConflictStrategy::Perm),
            record("grant", "duty-1", RuleKind::Obligation, ConflictStrategy::Perm),
            record("ban", "r2", RuleKind::Prohibition, ConflictStrategy::Perm),
            record("ban", "duty-2", RuleKind::Obligation, ConflictStrategy::Perm),
            record("notice", "duty-3", RuleKind::Obligation, ConflictStrategy::Invalid),
        ]);
        assert_eq!(evaluation.decision, Decision::Deny);
        let rules: Vec<_> = evaluation.obligations.iter().map(|o| o.rule.as_str()).collect();
        assert_eq!(rules, vec!["duty-2", "duty-3"]);
    }

    #[test]
    fn test_obligation_only_is_not_applicable() {
        let evaluation = evaluate(&[record("p", "duty", RuleKind::Obligation, ConflictStrategy::Perm)]);
        assert_eq!(evaluation, Evaluation::not_applicable());
    }

    fn kind_strategy() -> impl Strategy<Value = RuleKind> {
        prop_oneof![
            Just(RuleKind::Permission),
            Just(RuleKind::Obligation),
            Just(RuleKind::Prohibition),
        ]
    }

    proptest::proptest! {
        #[test]
        fn prop_record_order_does_not_matter(
            kinds in proptest::collection::vec((0u8..3, kind_strategy()), 0..10)
        ) {
            let records: Vec<_> = kinds
                .iter()
                .enumerate()
                .map(|(i, (policy, kind))| {
                    record(&format!("p{}", policy), &format!("r{}", i), *kind, ConflictStrategy::Invalid)
                })
                .collect();
            let mut reversed = records.clone();
            reversed.reverse();

            prop_assert_eq!(evaluate(&records).decision, evaluate(&reversed).decision);
        }

        #[test]
        fn prop_any_prohibition_under_prohibit_denies(
            kinds in proptest::collection::vec(kind_strategy(), 1..8)
        ) {
            let mut records: Vec<_> = kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| record("p", &format!("r{}", i), *kind, ConflictStrategy::Prohibit))
                .collect();
            records.push(record("p", "ban", RuleKind::Prohibition, ConflictStrategy::Prohibit));

            prop_assert_eq!(evaluate(&records).decision, Decision::Deny);
        }
    }
}
