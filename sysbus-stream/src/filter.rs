//! Structural predicate applied to every raw notification.

use bus_client::{MatchRule, RawNotification};

/// Selects which notifications a subscription decodes.
///
/// The same predicate produces the match rule registered with the bus and is
/// re-checked by the pump, since a connection may still receive signals that
/// were routed for other reasons.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SignalFilter {
    member: String,
    interface: Option<String>,
    path: Option<String>,
}

impl SignalFilter {
    /// Match signals by member name only.
    pub fn new(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            interface: None,
            path: None,
        }
    }

    /// Build a filter from a fully qualified `interface.member` name.
    pub fn from_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((interface, member)) => Self::new(member).with_interface(interface),
            None => Self::new(name),
        }
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Check the header fields of a notification against this filter.
    pub fn matches(&self, notification: &RawNotification) -> bool {
        if notification.member != self.member {
            return false;
        }
        if let Some(interface) = &self.interface {
            if &notification.interface != interface {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if &notification.path != path {
                return false;
            }
        }
        true
    }

    /// The match rule to register for this filter.
    pub fn match_rule(&self) -> MatchRule {
        let mut rule = MatchRule::signals().with_member(&self.member);
        if let Some(interface) = &self.interface {
            rule = rule.with_interface(interface);
        }
        if let Some(path) = &self.path {
            rule = rule.with_path(path);
        }
        rule
    }
}
