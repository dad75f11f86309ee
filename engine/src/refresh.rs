//! Refresh requests and queue collapsing.
//!
//! Every freshness trigger — the periodic poll, post-write reconciliation,
//! identity changes — is funneled into one queue of `RefreshKind` processed
//! in arrival order. Redundant requests that pile up while an earlier one is
//! being served are collapsed so a slow ledger does not build a backlog.

/// Which slice of the snapshot to re-read from the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshKind {
    /// Remaining-time counter only (the 1-second poll).
    Window,
    /// Candidate roster, rebuilt wholesale.
    Roster,
    /// Admin identity + privilege flag.
    Admin,
    /// All of the above (initial sync, session rebind).
    Full,
}

/// Collapse a drained batch of refresh requests.
///
/// Duplicates are dropped, first arrival wins the ordering, and a `Full`
/// request absorbs everything else since it already covers each sub-entity.
pub fn collapse(requests: Vec<RefreshKind>) -> Vec<RefreshKind> {
    if requests.contains(&RefreshKind::Full) {
        return vec![RefreshKind::Full];
    }
    let mut collapsed = Vec::new();
    for request in requests {
        if !collapsed.contains(&request) {
            collapsed.push(request);
        }
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use RefreshKind::*;

    #[test]
    fn drops_duplicates_keeps_first_arrival_order() {
        assert_eq!(
            collapse(vec![Window, Roster, Window, Admin, Roster]),
            vec![Window, Roster, Admin]
        );
    }

    #[test]
    fn full_absorbs_everything() {
        assert_eq!(collapse(vec![Window, Full, Roster]), vec![Full]);
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(collapse(Vec::new()), Vec::<RefreshKind>::new());
    }
}
