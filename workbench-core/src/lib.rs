//! # workbench-core
//!
//! Data plane for the workbench telemetry dashboard.
//!
//! This crate contains:
//! - **Data model**: `SourceMetadata`, `DataFrame`, `DataPoint`, and the
//!   `DataPayload` sum type over the supported telemetry shapes
//! - **Registry**: `DataRegistry` — thread-safe source registry with
//!   per-source publish/subscribe and latest-frame storage
//! - **Relay link**: `RelayLink` — persistent JSON-RPC client to the
//!   hardware relay over a Unix socket, with reconnect and resync
//! - **Device link**: `DeviceLink`, `DeviceCodec`, and the framed wire
//!   protocol for a directly attached device
//! - **Mock**: `MockSource` — synthetic sine-wave source for running
//!   without hardware
//! - **Module**: the call contract the module runtime drives
//! - **Error**: `WorkbenchError` — typed, `thiserror`-based error hierarchy

pub mod data;
pub mod device;
pub mod error;
pub mod mock;
pub mod module;
pub mod registry;
pub mod relay;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use data::{
    DataFrame, DataKind, DataPayload, DataPoint, GpioSample, LogicSample, NumericSample,
    SerialSample, SourceMetadata, WaveformSample,
};
pub use device::codec::DeviceCodec;
pub use device::protocol::{DeviceMessage, DeviceMessageType};
pub use device::DeviceLink;
pub use error::WorkbenchError;
pub use mock::{MockOptions, MockSource};
pub use module::{Module, ModuleContext};
pub use registry::{DataRegistry, ObserverToken};
pub use relay::channel::{ChannelOpener, ChannelReader, ChannelWriter, UnixSocketOpener};
pub use relay::state::LinkPhase;
pub use relay::{RelayLink, RelayOptions};
