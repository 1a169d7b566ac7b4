/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! odin_adsbrange computes the reception envelope of ADS-B receivers from the positions they report.
//!
//! Each receiver gets its own [`range::RangeEngine`] which keeps the farthest observed position per
//! bearing sector (and optional altitude layer) around the receiver location. A [`session::RangeSession`]
//! feeds the engine from a BaseStation (SBS) socket and periodically exports the envelope as KML
//! polygon or JSON file.

use std::{fs, path::Path};
use serde::Deserialize;

pub mod errors;
pub use errors::{OdinAdsbRangeError, Result};

pub mod geo;
pub use geo::GeoPos;

pub mod range;
pub use range::{RangeEngine, RangePoint, SectorRecord, BootstrapPolicy};

pub mod sbs;
pub mod export;
pub use export::{ExportFormat, RangeSnapshot, LayerShape};

pub mod registry;
pub use registry::{EngineRegistry, SharedEngine};

pub mod config;
pub use config::{RangeConfig, ReceiverConfig};

pub mod session;
pub use session::{RangeSession, SessionStats};

/// load a RON config from the given path
pub fn load_config<C,P> (path: P)->Result<C> where C: for <'a> Deserialize<'a>, P: AsRef<Path> {
    let data = fs::read( path.as_ref())?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}
