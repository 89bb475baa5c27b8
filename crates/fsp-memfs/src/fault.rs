// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Allocation fault injection for the in-memory volume
//!
//! Every allocation site in the volume asks the injector first, so tests and
//! soak runs can force allocation failures at a chosen point and check that
//! partial construction is rolled back.

use fsp_core::FsError;
use serde::{Deserialize, Serialize};

/// Allocation sites that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultOp {
    NodeAllocate,
    SecurityAllocate,
    DataAllocate,
    TableInsert,
}

/// Individual rule describing which site should fail and how often.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRule {
    pub op: FaultOp,
    /// Number of leading invocations to let through before failing.
    #[serde(default)]
    pub start_after: u64,
    /// Maximum number of injected failures for this rule.
    #[serde(default)]
    pub max_faults: Option<u64>,
}

impl FaultRule {
    /// Fail the next invocation of `op`, once.
    pub fn once(op: FaultOp) -> Self {
        Self {
            op,
            start_after: 0,
            max_faults: Some(1),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<FaultRule>,
}

impl FaultPolicy {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn single(rule: FaultRule) -> Self {
        Self {
            enabled: true,
            rules: vec![rule],
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RuleCounters {
    hits: u64,
    invocations: u64,
}

/// Tracks the active policy and per-rule hit counts.
#[derive(Debug, Default)]
pub struct FaultInjector {
    policy: FaultPolicy,
    counters: Vec<RuleCounters>,
}

impl FaultInjector {
    pub fn new(policy: FaultPolicy) -> Self {
        let mut injector = Self::default();
        injector.set_policy(policy);
        injector
    }

    pub fn policy(&self) -> &FaultPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: FaultPolicy) {
        self.counters = vec![RuleCounters::default(); policy.rules.len()];
        self.policy = policy;
    }

    pub fn clear(&mut self) {
        self.set_policy(FaultPolicy::default());
    }

    /// Total failures injected so far across all rules.
    pub fn injected(&self) -> u64 {
        self.counters.iter().map(|c| c.hits).sum()
    }

    /// Consult the policy for one invocation of `op`.
    pub fn check(&mut self, op: FaultOp) -> Result<(), FsError> {
        if !self.policy.enabled {
            return Ok(());
        }
        for (rule, counters) in self.policy.rules.iter().zip(self.counters.iter_mut()) {
            if rule.op != op {
                continue;
            }
            counters.invocations = counters.invocations.saturating_add(1);
            if counters.invocations <= rule.start_after {
                continue;
            }
            if let Some(max) = rule.max_faults {
                if counters.hits >= max {
                    continue;
                }
            }
            counters.hits = counters.hits.saturating_add(1);
            tracing::debug!(target: "memfs::fault", ?op, "injecting allocation failure");
            return Err(FsError::InsufficientResources);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fault_policy_json() {
        let json = br#"{ "enabled": true, "rules": [ { "op": "data_allocate", "max_faults": 2 } ] }"#;
        let policy = FaultPolicy::from_json_bytes(json).expect("policy");
        assert!(policy.enabled);
        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.rules[0].op, FaultOp::DataAllocate);
        assert_eq!(policy.rules[0].start_after, 0);
        assert_eq!(policy.rules[0].max_faults, Some(2));
    }

    #[test]
    fn injector_respects_start_and_max_hits() {
        let mut injector = FaultInjector::new(FaultPolicy::single(FaultRule {
            op: FaultOp::NodeAllocate,
            start_after: 1,
            max_faults: Some(2),
        }));

        // First call skipped due to start_after
        assert!(injector.check(FaultOp::NodeAllocate).is_ok());
        // Other sites are unaffected
        assert!(injector.check(FaultOp::TableInsert).is_ok());
        assert_eq!(
            injector.check(FaultOp::NodeAllocate),
            Err(FsError::InsufficientResources)
        );
        assert!(injector.check(FaultOp::NodeAllocate).is_err());
        // Max hits reached
        assert!(injector.check(FaultOp::NodeAllocate).is_ok());
        assert_eq!(injector.injected(), 2);
    }

    #[test]
    fn disabled_policy_never_faults() {
        let mut injector = FaultInjector::new(FaultPolicy {
            enabled: false,
            rules: vec![FaultRule::once(FaultOp::SecurityAllocate)],
        });
        assert!(injector.check(FaultOp::SecurityAllocate).is_ok());
        injector.clear();
        assert!(injector.check(FaultOp::SecurityAllocate).is_ok());
        assert_eq!(injector.injected(), 0);
    }
}
