//! # Membership Sets and Their Diff
//!
//! A membership set is the set of principals currently granted one kind of
//! access (application access to a secret, users assigned to a role, SSH
//! keys installed in a model). Reconciliation only ever needs two set
//! differences:
//!
//! ```text
//! to_add    = desired  \ previous
//! to_remove = previous \ desired
//! ```
//!
//! Members are compared by exact equality. Canonicalizing identifiers
//! (tags, domains, case) is the collaborator's job and must happen before
//! a set is built.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An unordered set of members.
///
/// Backed by a `BTreeSet` so iteration, and therefore every batch sent to
/// the control plane, is in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MembershipSet<M> {
    members: BTreeSet<M>,
}

impl<M: Ord> Default for MembershipSet<M> {
    fn default() -> Self {
        Self {
            members: BTreeSet::new(),
        }
    }
}

impl<M: Ord> MembershipSet<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member. Returns `false` if it was already present.
    pub fn insert(&mut self, member: M) -> bool {
        self.members.insert(member)
    }

    pub fn contains(&self, member: &M) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, M> {
        self.members.iter()
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.members.is_disjoint(&other.members)
    }

    pub fn is_superset(&self, other: &Self) -> bool {
        self.members.is_superset(&other.members)
    }
}

impl<M: Ord + Clone> MembershipSet<M> {
    /// Members of `self` that are not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.members.difference(&other.members).cloned().collect()
    }

    pub fn union(&self, other: &Self) -> Self {
        self.members.union(&other.members).cloned().collect()
    }

    /// Members in sorted order.
    pub fn to_vec(&self) -> Vec<M> {
        self.members.iter().cloned().collect()
    }
}

impl<M: Ord> FromIterator<M> for MembershipSet<M> {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl<M: Ord> Extend<M> for MembershipSet<M> {
    fn extend<I: IntoIterator<Item = M>>(&mut self, iter: I) {
        self.members.extend(iter);
    }
}

impl<M> IntoIterator for MembershipSet<M> {
    type Item = M;
    type IntoIter = btree_set::IntoIter<M>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

impl<'a, M> IntoIterator for &'a MembershipSet<M> {
    type Item = &'a M;
    type IntoIter = btree_set::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl<M: Ord, const N: usize> From<[M; N]> for MembershipSet<M> {
    fn from(members: [M; N]) -> Self {
        members.into_iter().collect()
    }
}

/// The grant/revoke delta between two membership sets.
///
/// `to_add` and `to_remove` come from disjoint set differences and can
/// never share a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan<M> {
    /// `desired \ previous`.
    pub to_add: MembershipSet<M>,
    /// `previous \ desired`.
    pub to_remove: MembershipSet<M>,
}

impl<M: Ord> ReconcilePlan<M> {
    /// True when applying the plan would not call the control plane.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the minimal delta that turns `previous` into `desired`.
pub fn diff<M: Ord + Clone>(
    previous: &MembershipSet<M>,
    desired: &MembershipSet<M>,
) -> ReconcilePlan<M> {
    ReconcilePlan {
        to_add: desired.difference(previous),
        to_remove: previous.difference(desired),
    }
}

// ---------------------------------------------------------------------------
// Principals
// ---------------------------------------------------------------------------

/// Kind of principal an access grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessCategory {
    User,
    Group,
    Role,
    ServiceAccount,
    Application,
}

impl AccessCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Role => "role",
            Self::ServiceAccount => "service_account",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for AccessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member scoped to one access category.
///
/// Ordering is by category first, so a mixed set groups its members per
/// category when iterated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub category: AccessCategory,
    pub id: String,
}

impl Principal {
    pub fn new(category: AccessCategory, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.id)
    }
}

impl MembershipSet<Principal> {
    /// Identifiers of the members in `category`.
    pub fn in_category(&self, category: AccessCategory) -> MembershipSet<String> {
        self.iter()
            .filter(|p| p.category == category)
            .map(|p| p.id.clone())
            .collect()
    }
}
