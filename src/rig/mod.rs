//! Test rig collaborators
//!
//! The interpreter never talks to hardware directly. Everything it drives or
//! reads goes through these traits, bundled in a `Rig` that the caller owns
//! and lends to the run:
//!
//! - `GdtChannel` - data-distribution interface of one OFP
//! - `SimEngine` - flight simulation engine
//! - `CaptureDevice` - screenshot/video grabber
//! - `Transcoder` - compresses recorded videos
//! - `VideoStore` - decodes recordings into frames (see `video`)
//!
//! `bench` implements all of them in memory; `capture` runs external
//! commands for screenshots, recordings and transcoding.

pub mod bench;
pub mod capture;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::error::RigError;
use crate::noise::NoiseSpec;
use crate::video::VideoStore;

// ============================================================================
// GDT
// ============================================================================

/// GDT data item types, in the order injections try them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Flag,
    String,
    Number,
    Double,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Flag,
        ItemType::String,
        ItemType::Number,
        ItemType::Double,
    ];

    /// Significant digits shown for float items
    pub fn display_width(self) -> Option<i32> {
        match self {
            ItemType::Number => Some(7),
            ItemType::Double => Some(20),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Flag => write!(f, "FLAG"),
            ItemType::String => write!(f, "STRING"),
            ItemType::Number => write!(f, "NUMBER"),
            ItemType::Double => write!(f, "DOUBLE"),
        }
    }
}

/// GDT buffer holding the BIT sequential counters
pub const BIT_COUNTERS_BUFFER: &str = "Bit_Sequential_Counters";

/// Value read back from a GDT item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GdtValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for GdtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GdtValue::Bool(true) => write!(f, "Valid"),
            GdtValue::Bool(false) => write!(f, "Invalid"),
            GdtValue::Int(v) => write!(f, "{}", v),
            GdtValue::Float(v) => write!(f, "{}", v),
            GdtValue::Text(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemReading {
    pub value: Option<GdtValue>,
    pub validity: Option<bool>,
    pub overridden: Option<bool>,
}

/// One GDT connection (one OFP)
pub trait GdtChannel {
    /// Connection name, e.g. `OFP_SR1`
    fn name(&self) -> &str;

    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> Result<(), RigError>;

    fn disconnect(&mut self) -> Result<(), RigError>;

    /// `Ok(false)` when the item exists but not with this type
    fn write_value(&mut self, item_type: ItemType, item: &str, value: &str) -> Result<bool, RigError>;

    fn write_validity(&mut self, item_type: ItemType, item: &str, valid: bool) -> Result<bool, RigError>;

    fn set_override(&mut self, item_type: ItemType, item: &str, enabled: bool) -> Result<bool, RigError>;

    fn write_struct_field(&mut self, structure: &str, field: &str, value: &str) -> Result<bool, RigError>;

    /// Stop forcing a struct field written with `write_struct_field`
    fn release_struct_field(&mut self, structure: &str, field: &str) -> Result<(), RigError>;

    fn read_item(&mut self, item_type: ItemType, item: &str) -> Result<ItemReading, RigError>;

    fn read_struct_field(&mut self, structure: &str, field: &str) -> Result<Option<GdtValue>, RigError>;

    fn read_buffer_element(
        &mut self,
        buffer: &str,
        item: &str,
        element: &str,
    ) -> Result<Option<GdtValue>, RigError>;
}

// ============================================================================
// Simulation engine
// ============================================================================

pub trait SimEngine {
    fn set_value(&mut self, label: &str, unit: &str, value: &str) -> Result<(), RigError>;

    fn inject_noise(&mut self, label: &str, unit: &str, noise: &NoiseSpec) -> Result<(), RigError>;

    fn set_noise_enabled(&mut self, enabled: bool) -> Result<(), RigError>;

    fn unapply_all(&mut self) -> Result<(), RigError>;

    fn unapply_all_on_exit(&mut self) -> Result<(), RigError>;

    fn element_value(&mut self, label: &str, unit: &str) -> Result<String, RigError>;
}

// ============================================================================
// Capture and transcoding
// ============================================================================

/// A recording in progress
pub trait VideoProcess {
    /// Block until the recording has been written
    fn wait(self: Box<Self>) -> Result<(), RigError>;
}

pub trait CaptureDevice {
    fn screenshot(&mut self, path: &Path) -> Result<(), RigError>;

    /// Start recording `duration` into `path` and return immediately
    fn start_video(&mut self, path: &Path, duration: Duration) -> Result<Box<dyn VideoProcess>, RigError>;
}

pub trait Transcoder {
    /// Compress `uncompressed` into `compressed`, then remove `uncompressed`.
    /// Encoder diagnostics go to `log` when given.
    fn transcode(&mut self, uncompressed: &Path, compressed: &Path, log: Option<&File>) -> Result<(), RigError>;
}

// ============================================================================
// Rig
// ============================================================================

/// Everything a run drives
pub struct Rig {
    /// Indexed by channel: 0 = `GDT`, 1 = `GDT_PSP2`
    pub gdt: Vec<Box<dyn GdtChannel>>,
    pub sim: Box<dyn SimEngine>,
    pub capture: Box<dyn CaptureDevice>,
    pub transcoder: Box<dyn Transcoder>,
    pub video: Box<dyn VideoStore>,
}

impl Rig {
    pub fn channel(&mut self, index: usize) -> Result<&mut dyn GdtChannel, RigError> {
        let count = self.gdt.len();
        self.gdt
            .get_mut(index)
            .map(|c| c.as_mut() as &mut dyn GdtChannel)
            .ok_or_else(|| RigError::NotConnected(format!("GDT channel {} (rig has {})", index + 1, count)))
    }

    /// Connect channel `index` unless it already is
    pub fn ensure_connected(&mut self, index: usize) -> Result<(), RigError> {
        let channel = self.channel(index)?;
        if !channel.is_connected() {
            channel.connect()?;
            tracing::info!("GDT: {} connected successfully.", channel.name());
        }
        Ok(())
    }

    /// Disconnect every connected channel, reporting failures per channel
    pub fn disconnect_all(&mut self) -> Vec<RigError> {
        let mut errors = Vec::new();
        for channel in self.gdt.iter_mut().filter(|c| c.is_connected()) {
            match channel.disconnect() {
                Ok(()) => tracing::info!("GDT: {} disconnected successfully.", channel.name()),
                Err(e) => errors.push(e),
            }
        }
        errors
    }
}
