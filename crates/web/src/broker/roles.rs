//! Role reconciliation.
//!
//! The diff is computed independently of the transport so it can be checked
//! without a broker.

use std::collections::BTreeSet;

/// Changes needed to move a user from their current role labels to the
/// desired ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePlan {
    /// Labels to unassign. Only labels this application manages.
    pub remove: Vec<String>,
    /// Labels to assign.
    pub add: Vec<String>,
}

impl RolePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Diff role labels, case-insensitively.
///
/// - `remove` = (current ∩ managed) − desired
/// - `add` = desired − current
///
/// Labels held by the user that are not managed here are never removed.
/// Both lists are sorted and lowercase.
///
/// ```
/// use foodi_web::broker::plan_role_changes;
///
/// let plan = plan_role_changes(
///     &["driver", "offline_access"],
///     &["kitchen"],
///     &["driver", "kitchen"],
/// );
/// assert_eq!(plan.remove, vec!["driver"]);
/// assert_eq!(plan.add, vec!["kitchen"]);
/// ```
pub fn plan_role_changes<S: AsRef<str>>(current: &[S], desired: &[S], managed: &[S]) -> RolePlan {
    let lower = |labels: &[S]| -> BTreeSet<String> {
        labels
            .iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect()
    };
    let current = lower(current);
    let desired = lower(desired);
    let managed = lower(managed);

    RolePlan {
        remove: current
            .intersection(&managed)
            .filter(|label| !desired.contains(*label))
            .cloned()
            .collect(),
        add: desired.difference(&current).cloned().collect(),
    }
}
