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

//! the range accumulation engine. A `RangeEngine` partitions the area around a receiver into
//! `num_sectors` equal bearing wedges and `num_layers` (+1) altitude layers, and for each
//! (layer,sector) cell keeps the farthest position that was observed so far.
//!
//! Layer 0 always aggregates all altitudes. Layers 1..=num_layers are 10,000ft bands, the top
//! layer being unbounded. Positions without altitude only go into layer 0.
//!
//! If the receiver location is not known upfront the engine starts in bootstrap mode, buffering
//! positions until it can estimate the center as the mean of the first [`BOOTSTRAP_POINTS`] positions.

use std::fmt;
use serde::{Serialize,Deserialize};
use uom::si::{f64::Length, length::foot};
use tracing::{info,debug};

use crate::geo::{GeoPos, initial_bearing, haversine_km, mean_position};
use crate::errors::{Result, OdinAdsbRangeError, config_error};

/// number of positions we accumulate before estimating an unknown receiver center
pub const BOOTSTRAP_POINTS: usize = 500;

/// vertical extent of altitude layers
pub const LAYER_HEIGHT_FT: f64 = 10_000.0;

pub const DEFAULT_SECTORS: usize = 360;

// uom stores lengths in meters, i.e. exact flight levels come back as 9999.999..ft
const LAYER_EPS: f64 = 1e-9;

/// lower altitude bound of a given layer in feet (layer 0 being the all-altitude aggregate starting at 0)
pub fn layer_min_altitude_ft (layer: usize)->f64 {
    layer as f64 * LAYER_HEIGHT_FT
}

pub fn layer_min_altitude (layer: usize)->Length {
    Length::new::<foot>( layer_min_altitude_ft( layer))
}

/// a single observation as decoded from a receiver message
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct RangePoint {
    pub pos: GeoPos,
    pub altitude: Option<Length>, // None means altitude is not known
}

impl RangePoint {
    pub fn new (lat: f64, lon: f64, altitude: Option<Length>)->Self {
        RangePoint { pos: GeoPos::new(lat,lon), altitude }
    }

    pub fn with_altitude_ft (lat: f64, lon: f64, alt_ft: f64)->Self {
        RangePoint { pos: GeoPos::new(lat,lon), altitude: Some( Length::new::<foot>(alt_ft)) }
    }
}

impl fmt::Display for RangePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "RangePoint( pos: {}", self.pos)?;
        if let Some(alt) = self.altitude { write!( f, ", alt: {:.0}ft", alt.get::<foot>())?; }
        write!( f, ")")
    }
}

/// the farthest observation in a (layer,sector) cell
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct SectorRecord {
    pub pos: Option<GeoPos>,
    pub range_km: f64, // NEG_INFINITY if there is no observation yet
}

impl SectorRecord {
    pub const EMPTY: SectorRecord = SectorRecord { pos: None, range_km: f64::NEG_INFINITY };

    pub fn is_empty (&self)->bool { self.pos.is_none() }

    /// replace with new observation if it is strictly farther, i.e. the earliest observation wins on ties
    #[inline]
    fn update (&mut self, pos: &GeoPos, range_km: f64)->bool {
        if range_km > self.range_km {
            self.pos = Some(*pos);
            self.range_km = range_km;
            true
        } else {
            false
        }
    }
}

impl Default for SectorRecord {
    fn default()->Self { SectorRecord::EMPTY }
}

/// what to do with the positions that were used to estimate an unknown center
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default,Serialize,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum BootstrapPolicy {
    /// positions received before the center was estimated are not recorded
    #[default]
    Discard,
    /// once the center is known, all buffered positions are added to the grid in order of arrival
    Replay,
}

/// the per-receiver range state. This is pure computation - the owner has to serialize access
#[derive(Debug)]
pub struct RangeEngine {
    center: Option<GeoPos>,
    num_sectors: usize,
    num_layers: usize,
    bootstrap_policy: BootstrapPolicy,
    bootstrap_buf: Vec<RangePoint>, // only used while center is None

    grid: Vec<SectorRecord>, // (num_layers+1) x num_sectors, row major by layer
    n_points: usize, // number of points that were applied to the grid
}

impl RangeEngine {
    /// create a new engine. If `center` is None we estimate it from the first [`BOOTSTRAP_POINTS`] positions
    pub fn new (center: Option<GeoPos>, num_sectors: usize, num_layers: usize)->Result<Self> {
        if num_sectors == 0 {
            return Err( config_error!("number of sectors has to be positive"))
        }
        if let Some(c) = &center {
            if !c.is_valid() { return Err( config_error!("invalid center position {}", c)) }
        }

        let n_cells = (num_layers + 1).checked_mul( num_sectors)
            .ok_or_else( || config_error!("grid of {num_sectors} sectors x {num_layers} layers too large"))?;

        let bootstrap_buf = if center.is_none() { Vec::with_capacity( BOOTSTRAP_POINTS) } else { Vec::new() };

        Ok( RangeEngine {
            center,
            num_sectors,
            num_layers,
            bootstrap_policy: BootstrapPolicy::default(),
            bootstrap_buf,
            grid: vec![SectorRecord::EMPTY; n_cells],
            n_points: 0
        })
    }

    /// an engine with [`DEFAULT_SECTORS`] and no altitude layers
    pub fn with_defaults (center: Option<GeoPos>)->Result<Self> {
        RangeEngine::new( center, DEFAULT_SECTORS, 0)
    }

    pub fn with_bootstrap_policy (mut self, policy: BootstrapPolicy)->Self {
        self.bootstrap_policy = policy;
        self
    }

    pub fn center (&self)->Option<GeoPos> { self.center }
    pub fn is_bootstrapping (&self)->bool { self.center.is_none() }
    pub fn bootstrap_len (&self)->usize { self.bootstrap_buf.len() }
    pub fn bootstrap_policy (&self)->BootstrapPolicy { self.bootstrap_policy }
    pub fn num_sectors (&self)->usize { self.num_sectors }
    pub fn num_layers (&self)->usize { self.num_layers }
    pub fn n_points (&self)->usize { self.n_points }

    /// process a new observation. While the center is not known this only accumulates the point.
    /// Positions outside of the lat/lon bounds are ignored
    pub fn add_point (&mut self, point: &RangePoint) {
        if !point.pos.is_valid() {
            debug!("ignoring invalid position {}", point.pos);
            return
        }

        match self.center {
            Some(center) => self.record_point( &center, point),
            None => self.bootstrap( point)
        }
    }

    fn record_point (&mut self, center: &GeoPos, point: &RangePoint) {
        let lay = self.find_layer( point.altitude);
        let s = sector_index( initial_bearing( center, &point.pos), self.num_sectors);
        let r = haversine_km( center, &point.pos);

        let i0 = s; // layer 0 is the all-altitude aggregate
        self.grid[i0].update( &point.pos, r);

        if lay > 0 {
            let i = lay * self.num_sectors + s;
            self.grid[i].update( &point.pos, r);
        }

        self.n_points += 1;
    }

    fn bootstrap (&mut self, point: &RangePoint) {
        self.bootstrap_buf.push( *point);

        if self.bootstrap_buf.len() >= BOOTSTRAP_POINTS {
            let buf = std::mem::take( &mut self.bootstrap_buf);

            if let Some(center) = mean_position( buf.iter().map( |p| &p.pos)) {
                info!("estimated receiver center {} from {} positions", center, buf.len());
                self.center = Some(center);

                if self.bootstrap_policy == BootstrapPolicy::Replay {
                    debug!("replaying {} bootstrap positions", buf.len());
                    for p in &buf {
                        self.record_point( &center, p);
                    }
                }
            }
        }
    }

    /// the layer index for a given altitude. Unknown and negative altitudes map to layer 0, everything at or
    /// above the top layer floor is clamped to `num_layers`
    pub fn find_layer (&self, altitude: Option<Length>)->usize {
        match altitude {
            Some(alt) => {
                let lay = (alt.get::<foot>() / LAYER_HEIGHT_FT + LAYER_EPS).floor();
                if lay.is_nan() || lay < 1.0 {
                    0
                } else if lay >= self.num_layers as f64 {
                    self.num_layers
                } else {
                    lay as usize
                }
            }
            None => 0
        }
    }

    /// the sector index of a position, None if the center is not known yet
    pub fn find_sector (&self, pos: &GeoPos)->Option<usize> {
        self.center.as_ref().map( |c| sector_index( initial_bearing( c, pos), self.num_sectors))
    }

    /// great circle distance in km from the center, None if the center is not known yet
    pub fn find_range (&self, pos: &GeoPos)->Option<f64> {
        self.center.as_ref().map( |c| haversine_km( c, pos))
    }

    fn check_layer (&self, layer: usize)->Result<()> {
        if layer > self.num_layers {
            Err( OdinAdsbRangeError::LayerOutOfBounds { layer, num_layers: self.num_layers })
        } else {
            Ok(())
        }
    }

    fn layer_records (&self, layer: usize)->Result<&[SectorRecord]> {
        self.check_layer( layer)?;
        let i0 = layer * self.num_sectors;
        Ok( &self.grid[i0..i0 + self.num_sectors] )
    }

    pub fn record (&self, layer: usize, sector: usize)->Result<&SectorRecord> {
        if sector >= self.num_sectors {
            return Err( OdinAdsbRangeError::SectorOutOfBounds { sector, num_sectors: self.num_sectors })
        }
        Ok( &self.layer_records( layer)?[sector] )
    }

    /// the farthest recorded positions of all sectors in the given layer, in sector order.
    /// Sectors without observation are None
    pub fn range_shape (&self, layer: usize)->Result<Vec<Option<GeoPos>>> {
        Ok( self.layer_records( layer)?.iter().map( |r| r.pos).collect() )
    }

    /// the maximum range over all sectors of a layer, None if the layer does not have observations yet
    pub fn max_range_km (&self, layer: usize)->Result<Option<f64>> {
        let max = self.layer_records( layer)?.iter()
            .filter( |r| !r.is_empty())
            .map( |r| r.range_km)
            .fold( None, |acc: Option<f64>, r| Some( acc.map_or( r, |a| a.max(r))));
        Ok(max)
    }

    /// number of sectors with observations in the given layer
    pub fn n_filled (&self, layer: usize)->Result<usize> {
        Ok( self.layer_records( layer)?.iter().filter( |r| !r.is_empty()).count() )
    }
}

/// map a normalized bearing in degrees to a sector index. The modulo guards against rounding up to `num_sectors`
pub fn sector_index (bearing: f64, num_sectors: usize)->usize {
    let s = (bearing * num_sectors as f64 / 360.0).floor();
    if s.is_nan() || s < 0.0 { 0 } else { (s as usize) % num_sectors }
}
