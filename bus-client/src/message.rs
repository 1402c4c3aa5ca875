//! Addressing, match rules and raw signal messages.

use std::fmt;

use crate::value::BusValue;

/// A remote object: the bus name that owns it plus its object path.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ObjectRef {
    pub destination: String,
    pub path: String,
}

impl ObjectRef {
    pub fn new(destination: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.destination, self.path)
    }
}

/// An asynchronous notification (signal) as delivered by the transport.
///
/// Nothing about the payload is validated here. Subscribers are expected to
/// check the header fields and the argument shape before trusting it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification {
    /// Object path the signal was emitted from
    pub path: String,
    /// Interface the signal belongs to
    pub interface: String,
    /// Signal member name
    pub member: String,
    /// Body arguments in wire order
    pub args: Vec<BusValue>,
}

impl RawNotification {
    pub fn new(
        path: impl Into<String>,
        interface: impl Into<String>,
        member: impl Into<String>,
        args: Vec<BusValue>,
    ) -> Self {
        Self {
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            args,
        }
    }

    /// Fully qualified signal name, `interface.member`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.interface, self.member)
    }
}

/// A bus match rule restricting which signals are routed to a connection.
///
/// Only `type='signal'` rules are produced; unset keys are left out of the
/// rendered string so the daemon treats them as wildcards.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct MatchRule {
    pub interface: Option<String>,
    pub member: Option<String>,
    pub path: Option<String>,
}

impl MatchRule {
    /// A rule matching every signal.
    pub fn signals() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type='signal'")?;
        if let Some(interface) = &self.interface {
            write!(f, ",interface='{}'", interface)?;
        }
        if let Some(member) = &self.member {
            write!(f, ",member='{}'", member)?;
        }
        if let Some(path) = &self.path {
            write!(f, ",path='{}'", path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_rule_rendering() {
        let rule = MatchRule::signals()
            .with_interface("org.freedesktop.systemd1.Manager")
            .with_member("JobRemoved");
        assert_eq!(
            rule.to_string(),
            "type='signal',interface='org.freedesktop.systemd1.Manager',member='JobRemoved'"
        );

        let rule = MatchRule::signals()
            .with_interface("org.freedesktop.NetworkManager")
            .with_member("StateChanged")
            .with_path("/org/freedesktop/NetworkManager");
        assert_eq!(
            rule.to_string(),
            "type='signal',interface='org.freedesktop.NetworkManager',member='StateChanged',path='/org/freedesktop/NetworkManager'"
        );
    }

    #[test]
    fn test_match_rule_wildcard() {
        assert_eq!(MatchRule::signals().to_string(), "type='signal'");
    }

    #[test]
    fn test_notification_name() {
        let n = RawNotification::new(
            "/org/freedesktop/NetworkManager/Devices/3",
            "org.freedesktop.NetworkManager.Device",
            "StateChanged",
            vec![],
        );
        assert_eq!(n.name(), "org.freedesktop.NetworkManager.Device.StateChanged");
    }

    #[test]
    fn test_object_ref_display() {
        let obj = ObjectRef::new("org.freedesktop.systemd1", "/org/freedesktop/systemd1");
        assert_eq!(obj.to_string(), "org.freedesktop.systemd1/org/freedesktop/systemd1");
    }
}
