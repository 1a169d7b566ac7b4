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

//! spherical earth geometry needed to bucket positions around a receiver.
//! All computations use the `geo` haversine metric on a sphere with 6371km mean earth radius
//! (not the WGS84 ellipsoid), which means distances can be off by up to 0.5%.

use std::{f64::consts::PI, fmt};
use geo::{Bearing, Distance, Point};
use geo::algorithm::line_measures::metric_spaces::HaversineMeasure;
use serde::{Serialize,Deserialize};
use uom::si::{f64::Length, length::kilometer};

/// mean earth radius in kilometers
pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.0;

#[inline]
fn haversine ()->HaversineMeasure { HaversineMeasure::new( MEAN_EARTH_RADIUS_KM * 1000.0) }

/// a geodetic position in degrees. Note the field order is lat,lon (as used by the receiver
/// protocol) and not the x,y (lon,lat) order of geometry crates
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPos {
    pub fn new (lat: f64, lon: f64)->Self { GeoPos { lat, lon } }

    /// answer if lat/lon are within their respective [-90,90] and [-180,180] degree bounds
    pub fn is_valid (&self)->bool {
        self.lat.is_finite() && self.lon.is_finite() && self.lat.abs() <= 90.0 && self.lon.abs() <= 180.0
    }

    pub fn point (&self)->Point {
        Point::new( self.lon, self.lat)
    }

    /// initial bearing (forward azimuth) from self to `other` in degrees, normalized to [0,360)
    pub fn bearing_to (&self, other: &GeoPos)->f64 {
        initial_bearing( self, other)
    }

    pub fn distance_to (&self, other: &GeoPos)->Length {
        haversine_distance( self, other)
    }
}

impl From<Point> for GeoPos {
    fn from (p: Point)->Self { GeoPos::new( p.y(), p.x()) }
}

impl fmt::Display for GeoPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5},{:.5})", self.lat, self.lon)
    }
}

/// forward azimuth from `from` to `to` in degrees, clockwise from true north, normalized to [0,360)
pub fn initial_bearing (from: &GeoPos, to: &GeoPos)->f64 {
    let b = haversine().bearing( from.point(), to.point()).rem_euclid( 360.0);
    if b >= 360.0 { 0.0 } else { b } // rem_euclid of tiny negative values rounds up to 360
}

/// great circle distance between two positions on a sphere with mean earth radius
pub fn haversine_distance (from: &GeoPos, to: &GeoPos)->Length {
    Length::new::<kilometer>( haversine_km( from, to))
}

pub fn haversine_km (from: &GeoPos, to: &GeoPos)->f64 {
    let d = haversine().distance( from.point(), to.point()) / 1000.0;

    // the haversine term can round to slightly above 1 for antipodal points
    if d.is_nan() && from.is_valid() && to.is_valid() {
        PI * MEAN_EARTH_RADIUS_KM
    } else {
        d
    }
}

/// arithmetic mean of the given positions, None if there are none.
/// This is not geodetically correct and only meant for point clouds that span a typical receiver footprint
/// (i.e. not the anti-meridian or poles)
pub fn mean_position<'a> (positions: impl IntoIterator<Item=&'a GeoPos>)->Option<GeoPos> {
    let mut n: usize = 0;
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;

    for p in positions {
        lat_sum += p.lat;
        lon_sum += p.lon;
        n += 1;
    }

    if n > 0 {
        Some( GeoPos::new( lat_sum / n as f64, lon_sum / n as f64))
    } else {
        None
    }
}
