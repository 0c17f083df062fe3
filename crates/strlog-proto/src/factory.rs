use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use strlog_transport::LogTransport;

use crate::dgram::DgramProto;
use crate::error::Result;
use crate::options::ProtoOptions;
use crate::proto::LogProto;

/// Name of the datagram protocol.
pub const DGRAM: &str = "dgram";

/// Which side of a connection a protocol serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtoRole {
    /// Reads records (sources).
    Server,
    /// Writes records (destinations).
    Client,
}

impl fmt::Display for ProtoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoRole::Server => f.write_str("server"),
            ProtoRole::Client => f.write_str("client"),
        }
    }
}

/// Builds protocol instances over a transport.
pub trait ProtoFactory: Send + Sync {
    /// Protocol name used for registry lookups.
    fn name(&self) -> &str;

    /// Role this factory serves.
    fn role(&self) -> ProtoRole;

    /// Wrap `transport` in a new protocol instance.
    ///
    /// The transport is owned by the returned protocol; on error it is dropped.
    fn create(
        &self,
        transport: Box<dyn LogTransport>,
        options: &ProtoOptions,
    ) -> Result<Box<dyn LogProto>>;
}

/// Factory for [`DgramProto`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DgramProtoFactory;

impl ProtoFactory for DgramProtoFactory {
    fn name(&self) -> &str {
        DGRAM
    }

    fn role(&self) -> ProtoRole {
        ProtoRole::Server
    }

    fn create(
        &self,
        transport: Box<dyn LogTransport>,
        options: &ProtoOptions,
    ) -> Result<Box<dyn LogProto>> {
        options.validate()?;
        Ok(Box::new(DgramProto::new(transport, *options)))
    }
}

/// Role and name keyed registry of protocol factories.
#[derive(Default)]
pub struct ProtoRegistry {
    factories: HashMap<(ProtoRole, String), Arc<dyn ProtoFactory>>,
}

impl ProtoRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in protocols.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DgramProtoFactory));
        registry
    }

    /// Register a factory under its own role and name, replacing any previous one.
    pub fn register(&mut self, factory: Arc<dyn ProtoFactory>) {
        let key = (factory.role(), factory.name().to_string());
        self.factories.insert(key, factory);
    }

    /// Look up a factory.
    pub fn lookup(&self, role: ProtoRole, name: &str) -> Option<Arc<dyn ProtoFactory>> {
        self.factories.get(&(role, name.to_string())).cloned()
    }

    /// Registered protocol names for `role`, sorted.
    pub fn names(&self, role: ProtoRole) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .factories
            .keys()
            .filter(|(r, _)| *r == role)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProtoRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .factories
            .keys()
            .map(|(role, name)| format!("{role}/{name}"))
            .collect();
        keys.sort_unstable();
        f.debug_struct("ProtoRegistry")
            .field("factories", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::os::fd::RawFd;

    use super::*;
    use crate::proto::Fetch;
    use crate::ProtoError;

    struct Canned(Option<&'static [u8]>);

    impl LogTransport for Canned {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let bytes = self.0.take().ok_or(io::ErrorKind::WouldBlock)?;
            buf[..bytes.len()].copy_from_slice(bytes);
            Ok(bytes.len())
        }

        fn raw_fd(&self) -> Option<RawFd> {
            None
        }
    }

    #[test]
    fn defaults_register_dgram_server() {
        let registry = ProtoRegistry::with_defaults();
        assert!(registry.lookup(ProtoRole::Server, DGRAM).is_some());
        assert!(registry.lookup(ProtoRole::Client, DGRAM).is_none());
        assert!(registry.lookup(ProtoRole::Server, "text").is_none());
        assert_eq!(registry.names(ProtoRole::Server), vec!["dgram"]);
    }

    #[test]
    fn empty_registry_has_nothing() {
        let registry = ProtoRegistry::new();
        assert!(registry.lookup(ProtoRole::Server, DGRAM).is_none());
        assert!(registry.names(ProtoRole::Server).is_empty());
    }

    #[test]
    fn dgram_factory_creates_working_proto() {
        let factory = DgramProtoFactory;
        let mut proto = factory
            .create(Box::new(Canned(Some(b"<5>hi"))), &ProtoOptions::default())
            .unwrap();

        assert_eq!(proto.name(), "dgram");
        assert_eq!(
            proto.fetch().unwrap(),
            Fetch::Record(bytes::Bytes::from_static(b"<5>hi"))
        );
    }

    #[test]
    fn dgram_factory_rejects_invalid_options() {
        let factory = DgramProtoFactory;
        let result = factory.create(Box::new(Canned(None)), &ProtoOptions { max_msg_size: 0 });
        assert!(matches!(result, Err(ProtoError::InvalidOptions(_))));
    }

    #[test]
    fn register_replaces_existing_factory() {
        struct Other;
        impl ProtoFactory for Other {
            fn name(&self) -> &str {
                DGRAM
            }
            fn role(&self) -> ProtoRole {
                ProtoRole::Server
            }
            fn create(
                &self,
                _transport: Box<dyn LogTransport>,
                _options: &ProtoOptions,
            ) -> Result<Box<dyn LogProto>> {
                Err(ProtoError::NotReady("stub".to_string()))
            }
        }

        let mut registry = ProtoRegistry::with_defaults();
        registry.register(Arc::new(Other));

        let factory = registry.lookup(ProtoRole::Server, DGRAM).unwrap();
        let result = factory.create(Box::new(Canned(None)), &ProtoOptions::default());
        assert!(matches!(result, Err(ProtoError::NotReady(_))));
    }

    #[test]
    fn debug_lists_keys() {
        let registry = ProtoRegistry::with_defaults();
        assert!(format!("{registry:?}").contains("server/dgram"));
    }
}
