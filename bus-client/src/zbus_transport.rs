//! zbus backed implementation of the transport traits.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;
use zbus::message::Type as MessageType;
use zbus::zvariant::{ObjectPath, Structure, StructureBuilder, Value};

use crate::error::{BusError, Result};
use crate::message::{MatchRule, ObjectRef, RawNotification};
use crate::transport::{
    BusConnection, BusTransport, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE, PROPERTIES_INTERFACE,
};
use crate::value::BusValue;

/// Which message bus to dial.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BusKind {
    System,
    Session,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusKind::System => write!(f, "system"),
            BusKind::Session => write!(f, "session"),
        }
    }
}

/// Transport that opens real bus connections through zbus.
#[derive(Debug, Clone)]
pub struct ZbusTransport {
    kind: BusKind,
}

impl ZbusTransport {
    /// Transport for the system-wide bus, where systemd and NetworkManager live.
    pub fn system() -> Self {
        Self {
            kind: BusKind::System,
        }
    }

    /// Transport for the current user's session bus.
    pub fn session() -> Self {
        Self {
            kind: BusKind::Session,
        }
    }

    pub fn kind(&self) -> BusKind {
        self.kind
    }
}

#[async_trait]
impl BusTransport for ZbusTransport {
    async fn connect(&self) -> Result<Box<dyn BusConnection>> {
        let connection = match self.kind {
            BusKind::System => zbus::Connection::system().await,
            BusKind::Session => zbus::Connection::session().await,
        }
        .map_err(|e| BusError::Connect {
            bus: self.kind.to_string(),
            reason: e.to_string(),
        })?;

        // Created before any match rule is added so no routed signal is missed.
        let stream = zbus::MessageStream::from(&connection);
        debug!("Opened {} bus connection", self.kind);

        Ok(Box::new(ZbusConnection { connection, stream }))
    }

    fn describe(&self) -> String {
        format!("{} bus", self.kind)
    }
}

struct ZbusConnection {
    connection: zbus::Connection,
    stream: zbus::MessageStream,
}

#[async_trait]
impl BusConnection for ZbusConnection {
    async fn call(
        &self,
        target: &ObjectRef,
        interface: &str,
        method: &str,
        args: &[BusValue],
    ) -> Result<Vec<BusValue>> {
        let destination = Some(target.destination.as_str());
        let path = target.path.as_str();

        let reply = if args.is_empty() {
            self.connection
                .call_method(destination, path, Some(interface), method, &())
                .await?
        } else {
            let body = encode_args(args)?;
            self.connection
                .call_method(destination, path, Some(interface), method, &body)
                .await?
        };

        decode_body(&reply)
    }

    async fn get_property(
        &self,
        target: &ObjectRef,
        interface: &str,
        property: &str,
    ) -> Result<BusValue> {
        let reply = self
            .call(
                target,
                PROPERTIES_INTERFACE,
                "Get",
                &[BusValue::str(interface), BusValue::str(property)],
            )
            .await?;

        reply.into_iter().next().ok_or_else(|| {
            BusError::Transport(format!(
                "empty reply reading {}.{} on {}",
                interface, property, target
            ))
        })
    }

    async fn add_match_rule(&self, rule: &MatchRule) -> Result<()> {
        let daemon = ObjectRef::new(DBUS_SERVICE, DBUS_PATH);
        self.call(
            &daemon,
            DBUS_INTERFACE,
            "AddMatch",
            &[BusValue::str(rule.to_string())],
        )
        .await
        .map_err(|e| BusError::MatchRule(format!("{}: {}", rule, e)))?;
        Ok(())
    }

    async fn next_notification(&mut self) -> Option<RawNotification> {
        while let Some(item) = self.stream.next().await {
            let msg = match item {
                Ok(msg) => msg,
                Err(e) => {
                    debug!("Skipping unreadable message: {}", e);
                    continue;
                }
            };

            if msg.message_type() != MessageType::Signal {
                continue;
            }

            let header = msg.header();
            let (Some(path), Some(interface), Some(member)) =
                (header.path(), header.interface(), header.member())
            else {
                continue;
            };

            let args = match decode_body(&msg) {
                Ok(args) => args,
                Err(e) => {
                    debug!("Skipping signal {}.{} with undecodable body: {}", interface, member, e);
                    continue;
                }
            };

            return Some(RawNotification::new(
                path.to_string(),
                interface.to_string(),
                member.to_string(),
                args,
            ));
        }
        None
    }

    async fn close(self: Box<Self>) {
        let ZbusConnection { connection, stream } = *self;
        drop(stream);
        if let Err(e) = connection.close().await {
            debug!("Error while closing bus connection: {}", e);
        }
    }
}

fn encode_args(args: &[BusValue]) -> Result<Structure<'static>> {
    let mut builder = StructureBuilder::new();
    for arg in args {
        builder = builder.append_field(to_wire(arg)?);
    }
    builder.build().map_err(|e| BusError::Encode(e.to_string()))
}

fn to_wire(value: &BusValue) -> Result<Value<'static>> {
    let wire = match value {
        BusValue::Bool(v) => Value::Bool(*v),
        BusValue::Byte(v) => Value::U8(*v),
        BusValue::I32(v) => Value::I32(*v),
        BusValue::U32(v) => Value::U32(*v),
        BusValue::I64(v) => Value::I64(*v),
        BusValue::U64(v) => Value::U64(*v),
        BusValue::F64(v) => Value::F64(*v),
        BusValue::Str(s) => Value::from(s.clone()),
        BusValue::ObjectPath(p) => ObjectPath::try_from(p.clone())
            .map(Value::ObjectPath)
            .map_err(|e| BusError::Encode(format!("invalid object path {:?}: {}", p, e)))?,
        BusValue::Struct(fields) => Value::Structure(encode_args(fields)?),
        BusValue::Dict(entries) => {
            let mut map: HashMap<String, Value<'static>> = HashMap::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key.clone(), to_wire(value)?);
            }
            // Values are wrapped as variants, giving the `a{sv}` signature.
            Value::from(map)
        }
        BusValue::Array(_) | BusValue::Unsupported(_) => {
            return Err(BusError::Encode(format!(
                "{} arguments are not supported",
                value.type_name()
            )))
        }
    };
    Ok(wire)
}

fn decode_body(msg: &zbus::Message) -> Result<Vec<BusValue>> {
    let body = msg.body();
    if body.signature().to_string().is_empty() {
        return Ok(Vec::new());
    }

    let structure: Structure<'_> = body
        .deserialize()
        .map_err(|e| BusError::Transport(format!("failed to decode message body: {}", e)))?;

    Ok(structure.fields().iter().map(from_wire).collect())
}

fn from_wire(value: &Value<'_>) -> BusValue {
    match value {
        Value::Bool(v) => BusValue::Bool(*v),
        Value::U8(v) => BusValue::Byte(*v),
        Value::I32(v) => BusValue::I32(*v),
        Value::U32(v) => BusValue::U32(*v),
        Value::I64(v) => BusValue::I64(*v),
        Value::U64(v) => BusValue::U64(*v),
        Value::F64(v) => BusValue::F64(*v),
        Value::Str(s) => BusValue::Str(s.to_string()),
        Value::ObjectPath(p) => BusValue::ObjectPath(p.to_string()),
        Value::Value(inner) => from_wire(inner),
        Value::Array(items) => BusValue::Array(items.iter().map(from_wire).collect()),
        Value::Structure(s) => BusValue::Struct(s.fields().iter().map(from_wire).collect()),
        other => BusValue::Unsupported(other.value_signature().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_wire_mapping() {
        for value in [
            BusValue::Bool(true),
            BusValue::Byte(3),
            BusValue::U32(100),
            BusValue::str("replace"),
            BusValue::object_path("/org/freedesktop/systemd1/job/7"),
        ] {
            let wire = to_wire(&value).unwrap();
            assert_eq!(from_wire(&wire), value);
        }
    }

    #[test]
    fn test_variant_is_unwrapped() {
        let wire = Value::Value(Box::new(Value::from("active")));
        assert_eq!(from_wire(&wire), BusValue::str("active"));
    }

    #[test]
    fn test_invalid_object_path_rejected() {
        let result = to_wire(&BusValue::object_path("not a path"));
        assert!(matches!(result, Err(BusError::Encode(_))));
    }

    #[test]
    fn test_options_dict_encodes_as_variant_map() {
        let wire = to_wire(&BusValue::Dict(vec![])).unwrap();
        assert!(matches!(wire, Value::Dict(_)));

        let wire = to_wire(&BusValue::Dict(vec![("ssids".to_string(), BusValue::U32(1))])).unwrap();
        assert!(matches!(wire, Value::Dict(_)));
    }

    #[test]
    fn test_array_arguments_rejected() {
        let result = to_wire(&BusValue::Array(vec![BusValue::U32(1)]));
        assert!(matches!(result, Err(BusError::Encode(_))));
    }

    #[test]
    fn test_transport_constructors() {
        assert_eq!(ZbusTransport::system().kind(), BusKind::System);
        assert_eq!(ZbusTransport::session().kind(), BusKind::Session);
        assert_eq!(ZbusTransport::system().describe(), "system bus");
    }
}
