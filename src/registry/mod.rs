//! Capability registry
//!
//! Maps a plugin role plus a descriptor key/value (name, extension) to the
//! factories that produce plugin instances. The registry is built once by an
//! explicit provisioning step and then passed by reference to the pipelines:
//!
//! ```no_run
//! use audiobatch::registry::{Registry, EXTENSION};
//!
//! let registry = audiobatch::plugins::register_defaults(Registry::builder()).build();
//! for decoder in registry.decoders().lookup(EXTENSION, "flac") {
//!     println!("{}", decoder.descriptor());
//! }
//! ```

pub mod descriptor;
pub mod traits;

pub use descriptor::{CapabilityDescriptor, DESCRIPTION, EXTENSION, FORMAT, NAME};
pub use traits::{Analyzer, Decoder, Encoder, MetadataCodec};

use crate::error::{AudioError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Plugin role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Decoder,
    Encoder,
    Analyzer,
    MetadataCodec,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::Decoder => "decoder",
            CapabilityKind::Encoder => "encoder",
            CapabilityKind::Analyzer => "analyzer",
            CapabilityKind::MetadataCodec => "metadata codec",
        };
        f.write_str(name)
    }
}

/// Constructor producing a new, independent plugin instance per call
pub type Factory<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// A registered plugin: its descriptor and factory
pub struct Capability<T: ?Sized> {
    descriptor: CapabilityDescriptor,
    factory: Factory<T>,
}

impl<T: ?Sized> Capability<T> {
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    /// Instantiate a fresh plugin
    pub fn create(&self) -> Box<T> {
        (self.factory)()
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

/// All plugins registered for one role, in registration order
pub struct CapabilitySet<T: ?Sized> {
    kind: CapabilityKind,
    entries: Vec<Capability<T>>,
}

impl<T: ?Sized> CapabilitySet<T> {
    fn new(kind: CapabilityKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Factories whose descriptor has `key` = `value`, in registration order
    pub fn lookup(&self, key: &str, value: &str) -> Vec<&Capability<T>> {
        self.entries
            .iter()
            .filter(|c| c.descriptor.matches(key, value))
            .collect()
    }

    /// First factory with the given name
    pub fn find(&self, name: &str) -> Result<&Capability<T>> {
        self.entries
            .iter()
            .find(|c| c.descriptor.matches(NAME, name))
            .ok_or_else(|| AudioError::PluginNotFound {
                kind: self.kind.to_string(),
                name: name.to_string(),
            })
    }

    /// Every registration with its descriptor
    pub fn all(&self) -> &[Capability<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable table of plugin factories, built once before first use
pub struct Registry {
    decoders: CapabilitySet<dyn Decoder>,
    encoders: CapabilitySet<dyn Encoder>,
    analyzers: CapabilitySet<dyn Analyzer>,
    metadata_codecs: CapabilitySet<dyn MetadataCodec>,
}

impl Registry {
    /// Start an empty registration table
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding the built-in plugins
    pub fn with_defaults() -> Self {
        crate::plugins::register_defaults(Self::builder()).build()
    }

    pub fn decoders(&self) -> &CapabilitySet<dyn Decoder> {
        &self.decoders
    }

    pub fn encoders(&self) -> &CapabilitySet<dyn Encoder> {
        &self.encoders
    }

    pub fn analyzers(&self) -> &CapabilitySet<dyn Analyzer> {
        &self.analyzers
    }

    pub fn metadata_codecs(&self) -> &CapabilitySet<dyn MetadataCodec> {
        &self.metadata_codecs
    }

    /// Extensions with at least one registered decoder
    pub fn decodable_extensions(&self) -> BTreeSet<String> {
        self.decoders
            .all()
            .iter()
            .flat_map(|c| c.descriptor().get_all(EXTENSION).map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<T: ?Sized>(set: &CapabilitySet<T>) -> Vec<String> {
            set.all().iter().map(|c| c.descriptor().to_string()).collect()
        }
        f.debug_struct("Registry")
            .field("decoders", &names(&self.decoders))
            .field("encoders", &names(&self.encoders))
            .field("analyzers", &names(&self.analyzers))
            .field("metadata_codecs", &names(&self.metadata_codecs))
            .finish()
    }
}

/// Provisioning step: collects (descriptor, constructor) pairs
pub struct RegistryBuilder {
    decoders: CapabilitySet<dyn Decoder>,
    encoders: CapabilitySet<dyn Encoder>,
    analyzers: CapabilitySet<dyn Analyzer>,
    metadata_codecs: CapabilitySet<dyn MetadataCodec>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            decoders: CapabilitySet::new(CapabilityKind::Decoder),
            encoders: CapabilitySet::new(CapabilityKind::Encoder),
            analyzers: CapabilitySet::new(CapabilityKind::Analyzer),
            metadata_codecs: CapabilitySet::new(CapabilityKind::MetadataCodec),
        }
    }
}

impl RegistryBuilder {
    pub fn decoder<F>(mut self, descriptor: CapabilityDescriptor, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Decoder> + Send + Sync + 'static,
    {
        let factory: Factory<dyn Decoder> = Arc::new(factory);
        push(&mut self.decoders, descriptor, factory);
        self
    }

    pub fn encoder<F>(mut self, descriptor: CapabilityDescriptor, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Encoder> + Send + Sync + 'static,
    {
        let factory: Factory<dyn Encoder> = Arc::new(factory);
        push(&mut self.encoders, descriptor, factory);
        self
    }

    pub fn analyzer<F>(mut self, descriptor: CapabilityDescriptor, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Analyzer> + Send + Sync + 'static,
    {
        let factory: Factory<dyn Analyzer> = Arc::new(factory);
        push(&mut self.analyzers, descriptor, factory);
        self
    }

    pub fn metadata_codec<F>(mut self, descriptor: CapabilityDescriptor, factory: F) -> Self
    where
        F: Fn() -> Box<dyn MetadataCodec> + Send + Sync + 'static,
    {
        let factory: Factory<dyn MetadataCodec> = Arc::new(factory);
        push(&mut self.metadata_codecs, descriptor, factory);
        self
    }

    pub fn build(self) -> Registry {
        debug!(
            "Registry built: {} decoders, {} encoders, {} analyzers, {} metadata codecs",
            self.decoders.len(),
            self.encoders.len(),
            self.analyzers.len(),
            self.metadata_codecs.len()
        );
        Registry {
            decoders: self.decoders,
            encoders: self.encoders,
            analyzers: self.analyzers,
            metadata_codecs: self.metadata_codecs,
        }
    }
}

fn push<T: ?Sized>(set: &mut CapabilitySet<T>, descriptor: CapabilityDescriptor, factory: Factory<T>) {
    debug!("Registering {} '{}'", set.kind, descriptor);
    set.entries.push(Capability { descriptor, factory });
}
