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

use std::{collections::HashSet, path::PathBuf, time::Duration};
use serde::{Serialize,Deserialize};

use crate::errors::{Result, OdinAdsbRangeError, config_error};
use crate::export::ExportFormat;
use crate::geo::GeoPos;
use crate::range::BootstrapPolicy;
use crate::sbs::DEFAULT_SBS_PORT;

/// top level config, normally loaded from a RON file
#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct RangeConfig {
    pub receivers: Vec<ReceiverConfig>,
}

impl RangeConfig {
    pub fn validate (&self)->Result<()> {
        if self.receivers.is_empty() {
            return Err( config_error!("no receivers configured"))
        }

        let mut names = HashSet::new();
        for rc in &self.receivers {
            rc.validate()?;
            if !names.insert( rc.name.as_str()) {
                return Err( config_error!("duplicated receiver name '{}'", rc.name))
            }
        }
        Ok(())
    }
}

/// per-receiver session config. Everything except name and address has a default
#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct ReceiverConfig {
    pub name: String, // the receiver station name, also used for output filenames
    pub address: String, // host name or IP address of the receiver
    #[serde(default="default_port")]
    pub port: u16, // BaseStation (SBS) port

    #[serde(default)]
    pub center: Option<GeoPos>, // receiver location, estimated from received positions if None

    #[serde(default="default_sectors")]
    pub sectors: usize,
    #[serde(default)]
    pub layers: usize, // number of 10,000ft altitude layers (0: only all-altitude aggregate)
    #[serde(default)]
    pub bootstrap: BootstrapPolicy,

    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default="default_export_interval")]
    pub export_interval: Duration,
    #[serde(default)]
    pub max_duration: Option<Duration>, // session is terminated after this time (with a final export)
    #[serde(default="default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_port ()->u16 { DEFAULT_SBS_PORT }
fn default_sectors ()->usize { 720 }
fn default_export_interval ()->Duration { Duration::from_secs(5*60) }
fn default_output_dir ()->PathBuf { PathBuf::from(".") }

impl ReceiverConfig {
    pub fn new (name: impl ToString, address: impl ToString)->Self {
        ReceiverConfig {
            name: name.to_string(),
            address: address.to_string(),
            port: default_port(),
            center: None,
            sectors: default_sectors(),
            layers: 0,
            bootstrap: BootstrapPolicy::default(),
            format: ExportFormat::default(),
            export_interval: default_export_interval(),
            max_duration: None,
            output_dir: default_output_dir()
        }
    }

    pub fn validate (&self)->Result<()> {
        if self.name.trim().is_empty() {
            return Err( config_error!("receiver name cannot be empty"))
        }
        if self.sectors == 0 {
            return Err( config_error!("receiver '{}' needs at least one sector", self.name))
        }
        if self.export_interval.is_zero() {
            return Err( config_error!("receiver '{}' export interval cannot be zero", self.name))
        }
        if let Some(c) = &self.center {
            if !c.is_valid() { return Err( config_error!("receiver '{}' has invalid center {}", self.name, c)) }
        }
        Ok(())
    }

    pub fn output_path (&self)->PathBuf {
        self.format.output_path( &self.output_dir, &self.name)
    }
}
