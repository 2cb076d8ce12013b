//! Call contract between the data plane and the module runtime.
//!
//! The runtime that decides which modules exist, when they tick, and
//! what windows they open lives outside this crate. It drives its
//! modules through this trait and hands them the data plane via
//! [`ModuleContext`].

use std::time::Duration;

use crate::data::SourceMetadata;
use crate::registry::DataRegistry;
use crate::relay::RelayLink;

/// The data-plane services available to a module.
pub struct ModuleContext<'a> {
    pub registry: &'a DataRegistry,
    pub relay: &'a RelayLink,
}

/// A unit of dashboard functionality hosted by the module runtime.
pub trait Module: Send {
    /// Stable identifier, unique among loaded modules.
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Called once after loading, before any `tick`.
    fn initialize(&mut self, context: &ModuleContext<'_>);

    /// Called once before unloading. Modules unregister what they
    /// registered.
    fn shutdown(&mut self, context: &ModuleContext<'_>);

    /// The sources this module provides by itself (static declaration,
    /// as opposed to discovery through a transport).
    fn declare_sources(&self) -> Vec<SourceMetadata>;

    /// Periodic hook; `delta` is the time since the previous tick.
    fn tick(&mut self, _context: &ModuleContext<'_>, _delta: Duration) {}
}
