//! # Endorsement Policies
//!
//! An endorsement policy is a threshold rule over a fixed list of named
//! identity roles: `N-of` a set of `signed-by` references into that list.
//! Policies are read from static configuration and are immutable for the
//! duration of an operation; evaluation lives in
//! [`crate::algorithms::policy_eval`].

use serde::{Deserialize, Serialize};

use super::entities::IdentityRole;

/// A named identity slot a policy can require a signature from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePrincipal {
    /// Required role of the signer.
    pub role: IdentityRole,
    /// Membership id the signer must belong to.
    pub msp_id: String,
}

impl RolePrincipal {
    /// A `member` principal for the given membership id.
    pub fn member(msp_id: &str) -> Self {
        Self {
            role: IdentityRole::Member,
            msp_id: msp_id.to_string(),
        }
    }

    /// An `admin` principal for the given membership id.
    pub fn admin(msp_id: &str) -> Self {
        Self {
            role: IdentityRole::Admin,
            msp_id: msp_id.to_string(),
        }
    }

    /// `role@msp` label used in policy-violation messages.
    pub fn label(&self) -> String {
        format!("{}@{}", self.role, self.msp_id)
    }
}

/// A subject inside a policy rule.
///
/// Only index references into the identity list are exercised today. The enum
/// leaves room for a nested-rule arm should composed boolean trees ever be
/// needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicySubject {
    /// Satisfied iff the identity slot at this index has a matching valid
    /// response signature.
    SignedBy(usize),
}

/// The boolean rule of a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyRule {
    /// Satisfied iff at least `n` of `subjects` are satisfied.
    NOutOf {
        /// Required number of satisfied subjects.
        n: usize,
        /// Subjects the threshold counts over.
        subjects: Vec<PolicySubject>,
    },
}

/// An endorsement policy: an identity list plus a threshold rule over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementPolicy {
    /// The fixed identity list `signed-by` indices refer to.
    pub identities: Vec<RolePrincipal>,
    /// Threshold rule over the identity list.
    pub rule: PolicyRule,
}

impl EndorsementPolicy {
    /// Policy with an empty identity list: auto-satisfied.
    ///
    /// Used only on non-sensitive test paths.
    pub fn accept_all() -> Self {
        Self {
            identities: Vec::new(),
            rule: PolicyRule::NOutOf {
                n: 0,
                subjects: Vec::new(),
            },
        }
    }

    /// `N-of-N`: a member signature from every listed organization.
    pub fn all_members<I, S>(msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identities: Vec<RolePrincipal> = msp_ids
            .into_iter()
            .map(|msp| RolePrincipal::member(msp.as_ref()))
            .collect();
        let n = identities.len();
        Self::n_of_members(n, identities)
    }

    /// `1-of-N`: a member signature from any one listed organization.
    pub fn one_of_members<I, S>(msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identities: Vec<RolePrincipal> = msp_ids
            .into_iter()
            .map(|msp| RolePrincipal::member(msp.as_ref()))
            .collect();
        Self::n_of_members(1, identities)
    }

    /// `N-of` an explicit principal list.
    pub fn n_of_members(n: usize, identities: Vec<RolePrincipal>) -> Self {
        let subjects = (0..identities.len()).map(PolicySubject::SignedBy).collect();
        Self {
            identities,
            rule: PolicyRule::NOutOf { n, subjects },
        }
    }

    /// True iff this policy has no identity requirements at all.
    pub fn is_accept_all(&self) -> bool {
        self.identities.is_empty()
    }

    /// The threshold the rule requires.
    pub fn threshold(&self) -> usize {
        match &self.rule {
            PolicyRule::NOutOf { n, .. } => *n,
        }
    }
}
