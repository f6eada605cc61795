//! In-memory loopback rig
//!
//! Every collaborator shares one `BenchState`: GDT writes land in a table of
//! declared items that reads return, SIM values are echoed back, the
//! "display" is a fixed raster and recordings replay a fixed frame list.
//! Each call is appended to `events` so tests can check what a run did.
//!
//! A seed file declares the readable state:
//!
//! ```toml
//! screen = "display.png"
//! recording = "flash_frames"
//!
//! [[items]]
//! name = "alt"
//! type = "number"
//! value = "150"
//!
//! [[struct_fields]]
//! structure = "HUD_MODE"
//! field = "u8Mode"
//! value = "3"
//!
//! [sim]
//! Airspeed = "250"
//! ```

use image::RgbImage;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use super::{
    CaptureDevice, GdtChannel, GdtValue, ItemReading, ItemType, Rig, SimEngine, Transcoder, VideoProcess,
};
use crate::error::{ConnectionError, ParameterError, RigError};
use crate::noise::NoiseSpec;
use crate::video::FrameDirectory;

pub type SharedBench = Rc<RefCell<BenchState>>;

/// One collaborator call
#[derive(Debug, Clone, PartialEq)]
pub enum BenchEvent {
    Connected(String),
    Disconnected(String),
    GdtValue { channel: String, item: String, value: String },
    GdtValidity { channel: String, item: String, valid: bool },
    GdtOverride { channel: String, item: String, enabled: bool },
    StructWrite { channel: String, structure: String, field: String, value: String },
    StructRelease { channel: String, structure: String, field: String },
    SimValue { label: String, unit: String, value: String },
    SimNoise { label: String, unit: String, literal: String },
    NoiseEnabled(bool),
    UnapplyAll,
    UnapplyAllOnExit,
    Screenshot(PathBuf),
    VideoStarted(PathBuf),
    Transcoded { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Clone)]
pub struct BenchItem {
    pub item_type: ItemType,
    pub value: Option<GdtValue>,
    pub validity: bool,
    pub overridden: bool,
}

#[derive(Debug, Default)]
pub struct ChannelState {
    pub name: String,
    pub connected: bool,
    /// Make `connect` fail
    pub unreachable: bool,
    pub items: HashMap<String, BenchItem>,
    pub structs: HashMap<(String, String), GdtValue>,
    pub buffers: HashMap<(String, String), GdtValue>,
}

#[derive(Debug, Default)]
pub struct BenchState {
    pub channels: Vec<ChannelState>,
    pub sim_values: HashMap<String, String>,
    pub screen: Option<RgbImage>,
    pub recording: Vec<RgbImage>,
    pub events: Vec<BenchEvent>,
}

impl BenchState {
    /// Declare a GDT item so it can be written and read
    pub fn declare(&mut self, channel: usize, item: &str, item_type: ItemType, value: Option<GdtValue>) {
        if let Some(state) = self.channels.get_mut(channel) {
            state.items.insert(
                item.to_string(),
                BenchItem {
                    item_type,
                    value,
                    validity: true,
                    overridden: false,
                },
            );
        }
    }

    pub fn count(&self, predicate: impl Fn(&BenchEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

/// Parse a cell value the way an item of `item_type` stores it
pub fn parse_item_value(item_type: ItemType, value: &str) -> Result<GdtValue, ParameterError> {
    let invalid = || ParameterError::new("value", format!("\"{}\" is not a valid {} value", value, item_type));
    let trimmed = value.trim();
    match item_type {
        ItemType::Flag => match trimmed.to_lowercase().as_str() {
            "true" | "valid" | "1" => Ok(GdtValue::Bool(true)),
            "false" | "invalid" | "0" => Ok(GdtValue::Bool(false)),
            _ => Err(invalid()),
        },
        ItemType::String => Ok(GdtValue::Text(value.to_string())),
        ItemType::Number => trimmed
            .parse::<i64>()
            .map(GdtValue::Int)
            .or_else(|_| trimmed.parse::<f64>().map(GdtValue::Float))
            .map_err(|_| invalid()),
        ItemType::Double => trimmed.parse::<f64>().map(GdtValue::Float).map_err(|_| invalid()),
    }
}

// ============================================================================
// Seed file
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SeedItem {
    #[serde(default)]
    pub channel: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStructField {
    #[serde(default)]
    pub channel: usize,
    pub structure: String,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCounter {
    #[serde(default)]
    pub channel: usize,
    pub item: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BenchSeed {
    pub screen: Option<PathBuf>,
    pub recording: Option<PathBuf>,
    #[serde(default)]
    pub items: Vec<SeedItem>,
    #[serde(default)]
    pub struct_fields: Vec<SeedStructField>,
    #[serde(default)]
    pub bit_counters: Vec<SeedCounter>,
    #[serde(default)]
    pub sim: HashMap<String, String>,
}

impl BenchSeed {
    pub fn load(path: &Path) -> Result<Self, RigError> {
        let content = fs::read_to_string(path).map_err(|source| RigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content)
            .map_err(|e| ParameterError::new(path.display().to_string(), e.to_string()).into())
    }

    /// Paths inside the seed are relative to the seed file
    fn resolve(base: &Path, path: &Path) -> PathBuf {
        if path.is_relative() { base.join(path) } else { path.to_path_buf() }
    }
}

// ============================================================================
// Rig assembly
// ============================================================================

pub struct BenchRig {
    state: SharedBench,
}

impl BenchRig {
    pub fn new(channel_names: &[&str]) -> Self {
        let state = BenchState {
            channels: channel_names
                .iter()
                .map(|name| ChannelState {
                    name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Bench with state read from a seed file
    pub fn from_seed(channel_names: &[&str], seed_path: &Path) -> Result<Self, RigError> {
        let seed = BenchSeed::load(seed_path)?;
        let base = seed_path.parent().unwrap_or(Path::new("."));
        let bench = Self::new(channel_names);
        {
            let mut state = bench.state.borrow_mut();
            for item in &seed.items {
                let value = match &item.value {
                    Some(v) => Some(parse_item_value(item.item_type, v)?),
                    None => None,
                };
                state.declare(item.channel, &item.name, item.item_type, value);
            }
            for field in &seed.struct_fields {
                if let Some(channel) = state.channels.get_mut(field.channel) {
                    channel.structs.insert(
                        (field.structure.clone(), field.field.clone()),
                        GdtValue::Text(field.value.clone()),
                    );
                }
            }
            for counter in &seed.bit_counters {
                if let Some(channel) = state.channels.get_mut(counter.channel) {
                    channel.buffers.insert(
                        (super::BIT_COUNTERS_BUFFER.to_string(), counter.item.clone()),
                        GdtValue::Int(counter.value),
                    );
                }
            }
            state.sim_values = seed.sim.clone();
            if let Some(screen) = &seed.screen {
                let path = BenchSeed::resolve(base, screen);
                let image = image::open(&path)
                    .map_err(|e| RigError::Capture(format!("{}: {}", path.display(), e)))?;
                state.screen = Some(image.to_rgb8());
            }
            if let Some(recording) = &seed.recording {
                let path = BenchSeed::resolve(base, recording);
                state.recording = crate::video::VideoStore::read_frames(&mut FrameDirectory, &path)?;
            }
        }
        Ok(bench)
    }

    pub fn state(&self) -> SharedBench {
        Rc::clone(&self.state)
    }

    /// Build a rig whose every collaborator is backed by this bench
    pub fn into_rig(self) -> (Rig, SharedBench) {
        let names: Vec<String> = self.state.borrow().channels.iter().map(|c| c.name.clone()).collect();
        let gdt = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                Box::new(BenchGdt {
                    index,
                    name,
                    state: Rc::clone(&self.state),
                }) as Box<dyn GdtChannel>
            })
            .collect();
        let rig = Rig {
            gdt,
            sim: Box::new(BenchSim {
                state: Rc::clone(&self.state),
            }),
            capture: Box::new(BenchCapture {
                state: Rc::clone(&self.state),
            }),
            transcoder: Box::new(BenchTranscoder {
                state: Rc::clone(&self.state),
            }),
            video: Box::new(FrameDirectory),
        };
        (rig, self.state)
    }
}

// ============================================================================
// GDT
// ============================================================================

pub struct BenchGdt {
    index: usize,
    name: String,
    state: SharedBench,
}

impl BenchGdt {
    /// Run `f` on this channel's state once it is connected
    fn with_channel<T>(
        &self,
        f: impl FnOnce(&mut ChannelState, &mut Vec<BenchEvent>) -> Result<T, RigError>,
    ) -> Result<T, RigError> {
        let mut guard = self.state.borrow_mut();
        let BenchState { channels, events, .. } = &mut *guard;
        let channel = channels
            .get_mut(self.index)
            .ok_or_else(|| RigError::NotConnected(format!("GDT channel {}", self.index + 1)))?;
        if !channel.connected {
            return Err(RigError::NotConnected(channel.name.clone()));
        }
        f(channel, events)
    }

    /// Declared item of the requested type, `None` on a type mismatch
    fn typed_item<'a>(
        channel: &'a mut ChannelState,
        item_type: ItemType,
        item: &str,
    ) -> Result<Option<&'a mut BenchItem>, RigError> {
        let entry = channel
            .items
            .get_mut(item)
            .ok_or_else(|| ParameterError::new(item, "unknown data item"))?;
        Ok((entry.item_type == item_type).then_some(entry))
    }
}

impl GdtChannel for BenchGdt {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.state
            .borrow()
            .channels
            .get(self.index)
            .is_some_and(|c| c.connected)
    }

    fn connect(&mut self) -> Result<(), RigError> {
        let mut guard = self.state.borrow_mut();
        let BenchState { channels, events, .. } = &mut *guard;
        let channel = channels
            .get_mut(self.index)
            .ok_or_else(|| ConnectionError::new(format!("GDT {}", self.index + 1), "no such channel"))?;
        if channel.unreachable {
            return Err(ConnectionError::new(
                channel.name.clone(),
                "Connection failed. Please check the configurations.",
            )
            .into());
        }
        channel.connected = true;
        events.push(BenchEvent::Connected(channel.name.clone()));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), RigError> {
        let mut guard = self.state.borrow_mut();
        let BenchState { channels, events, .. } = &mut *guard;
        if let Some(channel) = channels.get_mut(self.index) {
            channel.connected = false;
            events.push(BenchEvent::Disconnected(channel.name.clone()));
        }
        Ok(())
    }

    fn write_value(&mut self, item_type: ItemType, item: &str, value: &str) -> Result<bool, RigError> {
        self.with_channel(|channel, events| {
            let name = channel.name.clone();
            let Some(entry) = Self::typed_item(channel, item_type, item)? else {
                return Ok(false);
            };
            entry.value = Some(parse_item_value(item_type, value)?);
            entry.overridden = true;
            events.push(BenchEvent::GdtValue {
                channel: name,
                item: item.to_string(),
                value: value.to_string(),
            });
            Ok(true)
        })
    }

    fn write_validity(&mut self, item_type: ItemType, item: &str, valid: bool) -> Result<bool, RigError> {
        self.with_channel(|channel, events| {
            let name = channel.name.clone();
            let Some(entry) = Self::typed_item(channel, item_type, item)? else {
                return Ok(false);
            };
            entry.validity = valid;
            entry.overridden = true;
            events.push(BenchEvent::GdtValidity {
                channel: name,
                item: item.to_string(),
                valid,
            });
            Ok(true)
        })
    }

    fn set_override(&mut self, item_type: ItemType, item: &str, enabled: bool) -> Result<bool, RigError> {
        self.with_channel(|channel, events| {
            let name = channel.name.clone();
            let Some(entry) = Self::typed_item(channel, item_type, item)? else {
                return Ok(false);
            };
            entry.overridden = enabled;
            events.push(BenchEvent::GdtOverride {
                channel: name,
                item: item.to_string(),
                enabled,
            });
            Ok(true)
        })
    }

    fn write_struct_field(&mut self, structure: &str, field: &str, value: &str) -> Result<bool, RigError> {
        self.with_channel(|channel, events| {
            channel.structs.insert(
                (structure.to_string(), field.to_string()),
                GdtValue::Text(value.to_string()),
            );
            events.push(BenchEvent::StructWrite {
                channel: channel.name.clone(),
                structure: structure.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            });
            Ok(true)
        })
    }

    fn release_struct_field(&mut self, structure: &str, field: &str) -> Result<(), RigError> {
        self.with_channel(|channel, events| {
            events.push(BenchEvent::StructRelease {
                channel: channel.name.clone(),
                structure: structure.to_string(),
                field: field.to_string(),
            });
            Ok(())
        })
    }

    fn read_item(&mut self, item_type: ItemType, item: &str) -> Result<ItemReading, RigError> {
        self.with_channel(|channel, _| {
            Ok(match Self::typed_item(channel, item_type, item)? {
                Some(entry) => ItemReading {
                    value: entry.value.clone(),
                    validity: Some(entry.validity),
                    overridden: Some(entry.overridden),
                },
                None => ItemReading::default(),
            })
        })
    }

    fn read_struct_field(&mut self, structure: &str, field: &str) -> Result<Option<GdtValue>, RigError> {
        self.with_channel(|channel, _| {
            Ok(channel
                .structs
                .get(&(structure.to_string(), field.to_string()))
                .cloned())
        })
    }

    fn read_buffer_element(
        &mut self,
        buffer: &str,
        item: &str,
        _element: &str,
    ) -> Result<Option<GdtValue>, RigError> {
        self.with_channel(|channel, _| {
            Ok(channel
                .buffers
                .get(&(buffer.to_string(), item.to_string()))
                .cloned())
        })
    }
}

// ============================================================================
// Simulation engine
// ============================================================================

pub struct BenchSim {
    state: SharedBench,
}

impl SimEngine for BenchSim {
    fn set_value(&mut self, label: &str, unit: &str, value: &str) -> Result<(), RigError> {
        let mut state = self.state.borrow_mut();
        if value.is_empty() {
            state.sim_values.remove(label);
        } else {
            state.sim_values.insert(label.to_string(), value.to_string());
        }
        state.events.push(BenchEvent::SimValue {
            label: label.to_string(),
            unit: unit.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn inject_noise(&mut self, label: &str, unit: &str, noise: &NoiseSpec) -> Result<(), RigError> {
        self.state.borrow_mut().events.push(BenchEvent::SimNoise {
            label: label.to_string(),
            unit: unit.to_string(),
            literal: noise.to_string(),
        });
        Ok(())
    }

    fn set_noise_enabled(&mut self, enabled: bool) -> Result<(), RigError> {
        self.state.borrow_mut().events.push(BenchEvent::NoiseEnabled(enabled));
        Ok(())
    }

    fn unapply_all(&mut self) -> Result<(), RigError> {
        self.state.borrow_mut().events.push(BenchEvent::UnapplyAll);
        Ok(())
    }

    fn unapply_all_on_exit(&mut self) -> Result<(), RigError> {
        self.state.borrow_mut().events.push(BenchEvent::UnapplyAllOnExit);
        Ok(())
    }

    fn element_value(&mut self, label: &str, _unit: &str) -> Result<String, RigError> {
        self.state
            .borrow()
            .sim_values
            .get(label)
            .cloned()
            .ok_or_else(|| RigError::Injection(format!("unknown label {}", label)))
    }
}

// ============================================================================
// Capture and transcoding
// ============================================================================

pub struct BenchCapture {
    state: SharedBench,
}

struct FinishedRecording;

impl VideoProcess for FinishedRecording {
    fn wait(self: Box<Self>) -> Result<(), RigError> {
        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<(), RigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RigError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

impl CaptureDevice for BenchCapture {
    fn screenshot(&mut self, path: &Path) -> Result<(), RigError> {
        let mut state = self.state.borrow_mut();
        let screen = state
            .screen
            .as_ref()
            .ok_or_else(|| RigError::Capture("bench has no display frame".to_string()))?;
        create_parent(path)?;
        screen
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| RigError::Capture(format!("{}: {}", path.display(), e)))?;
        state.events.push(BenchEvent::Screenshot(path.to_path_buf()));
        Ok(())
    }

    fn start_video(&mut self, path: &Path, _duration: Duration) -> Result<Box<dyn VideoProcess>, RigError> {
        let mut state = self.state.borrow_mut();
        FrameDirectory::write_all(path, &state.recording)?;
        state.events.push(BenchEvent::VideoStarted(path.to_path_buf()));
        Ok(Box::new(FinishedRecording))
    }
}

pub struct BenchTranscoder {
    state: SharedBench,
}

impl Transcoder for BenchTranscoder {
    fn transcode(&mut self, uncompressed: &Path, compressed: &Path, _log: Option<&File>) -> Result<(), RigError> {
        if compressed.exists() {
            fs::remove_dir_all(compressed).map_err(|source| RigError::Io {
                path: compressed.display().to_string(),
                source,
            })?;
        }
        fs::rename(uncompressed, compressed).map_err(|source| RigError::Io {
            path: uncompressed.display().to_string(),
            source,
        })?;
        self.state.borrow_mut().events.push(BenchEvent::Transcoded {
            from: uncompressed.to_path_buf(),
            to: compressed.to_path_buf(),
        });
        Ok(())
    }
}
