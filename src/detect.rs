use crate::state::PersistedState;

/// One observation of the host's public addresses. The IPv6 value is a
/// prefix (e.g. "2001:db8:1"), not a full address, so both fields are kept
/// as opaque strings and compared by exact equality.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressSet {
    pub ipv4: Option<Box<str>>,
    pub ipv6_prefix: Option<Box<str>>,
}

/// The per-family changes of one run. A field is set only when the probed
/// value exists and differs from the stored one; the two fields are
/// independent of each other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateDelta {
    pub ipv4: Option<Box<str>>,
    pub ipv6_prefix: Option<Box<str>>,
}

impl UpdateDelta {
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6_prefix.is_none()
    }
}

pub fn detect(current: &AddressSet, stored: &PersistedState) -> UpdateDelta {
    UpdateDelta {
        ipv4: changed(current.ipv4.as_deref(), stored.ipv4.as_deref()),
        ipv6_prefix: changed(current.ipv6_prefix.as_deref(), stored.ipv6_prefix.as_deref()),
    }
}

// An absent current value never produces a change: a failed probe must not
// "clear" a previously known address.
fn changed(current: Option<&str>, stored: Option<&str>) -> Option<Box<str>> {
    match current {
        Some(cur) if stored != Some(cur) => Some(cur.into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(ipv4: Option<&str>, ipv6_prefix: Option<&str>) -> PersistedState {
        PersistedState {
            ipv4: ipv4.map(Into::into),
            ipv6_prefix: ipv6_prefix.map(Into::into),
            last_set_at: Some(1_700_000_000),
        }
    }

    #[test]
    fn unchanged_addresses_yield_empty_delta() {
        let current = AddressSet {
            ipv4: Some("203.0.113.1".into()),
            ipv6_prefix: Some("2001:db8:1".into()),
        };
        let delta = detect(&current, &stored(Some("203.0.113.1"), Some("2001:db8:1")));
        assert!(delta.is_empty());
    }

    #[test]
    fn families_are_independent() {
        let current = AddressSet {
            ipv4: Some("203.0.113.9".into()),
            ipv6_prefix: Some("2001:db8:1".into()),
        };
        let delta = detect(&current, &stored(Some("203.0.113.1"), Some("2001:db8:1")));
        assert_eq!(delta.ipv4.as_deref(), Some("203.0.113.9"));
        assert_eq!(delta.ipv6_prefix, None);
    }

    #[test]
    fn absent_probe_never_clears_a_stored_address() {
        let current = AddressSet {
            ipv4: None,
            ipv6_prefix: Some("2001:db8:2".into()),
        };
        let delta = detect(&current, &stored(Some("203.0.113.1"), Some("2001:db8:1")));
        assert_eq!(delta.ipv4, None);
        assert_eq!(delta.ipv6_prefix.as_deref(), Some("2001:db8:2"));
    }

    #[test]
    fn first_run_with_empty_state_reports_everything() {
        let current = AddressSet {
            ipv4: Some("203.0.113.1".into()),
            ipv6_prefix: None,
        };
        let delta = detect(&current, &PersistedState::default());
        assert_eq!(delta.ipv4.as_deref(), Some("203.0.113.1"));
        assert_eq!(delta.ipv6_prefix, None);
    }
}
