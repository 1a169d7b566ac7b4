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

use std::{fmt::Write as FmtWrite, fs, path::{Path,PathBuf}, process, sync::atomic::{AtomicUsize,Ordering}};
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize,Serializer,ser::SerializeSeq};
use uom::si::length::meter;

use crate::errors::{Result,OdinAdsbRangeError};
use crate::geo::GeoPos;
use crate::range::{RangeEngine, layer_min_altitude, layer_min_altitude_ft};

/// KML altitude of the polygon if there are no altitude layers
const AGGREGATE_KML_ALTITUDE_M: f64 = 100.0;

static TMP_SEQ: AtomicUsize = AtomicUsize::new(0);

/// the range envelope of a single layer
#[derive(Debug,Clone,Serialize)]
pub struct LayerShape {
    pub layer: usize,
    pub min_altitude_ft: f64,
    pub max_range_km: Option<f64>,
    #[serde(serialize_with="serialize_lat_lon_pairs")]
    pub points: Vec<Option<GeoPos>>, // one per sector, None if there was no observation
}

impl LayerShape {
    pub fn has_points (&self)->bool { self.points.iter().any( |p| p.is_some()) }
}

/// a consistent copy of all layer envelopes of an engine. This is what we hand over to
/// exporters so that the engine does not have to be locked while we write files
#[derive(Debug,Clone,Serialize)]
pub struct RangeSnapshot {
    pub name: String,
    pub center: Option<GeoPos>,
    pub generated: DateTime<Utc>,
    pub n_points: usize,
    pub layers: Vec<LayerShape>,
}

impl RangeSnapshot {
    pub fn from_engine (name: &str, engine: &RangeEngine)->Result<Self> {
        let mut layers = Vec::with_capacity( engine.num_layers() + 1);
        for layer in 0..=engine.num_layers() {
            layers.push( LayerShape {
                layer,
                min_altitude_ft: layer_min_altitude_ft( layer),
                max_range_km: engine.max_range_km( layer)?,
                points: engine.range_shape( layer)?
            });
        }

        Ok( RangeSnapshot {
            name: name.to_string(),
            center: engine.center(),
            generated: Utc::now(),
            n_points: engine.n_points(),
            layers
        })
    }

    pub fn num_layers (&self)->usize { self.layers.len().saturating_sub(1) }
}

// points are written as [lat,lon] pairs, null for empty sectors
fn serialize_lat_lon_pairs<S> (points: &[Option<GeoPos>], serializer: S)->std::result::Result<S::Ok,S::Error> where S: Serializer {
    let mut seq = serializer.serialize_seq( Some(points.len()))?;
    for p in points {
        seq.serialize_element( &p.map( |p| [p.lat, p.lon]))?;
    }
    seq.end()
}

/// the output format strategy for range snapshots
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default,Serialize,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum ExportFormat {
    Json,
    #[default]
    Kml,
}

impl ExportFormat {
    pub fn file_extension (&self)->&'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Kml => "kml",
        }
    }

    /// pathname of the file we export receiver snapshots to
    pub fn output_path (&self, dir: &Path, name: &str)->PathBuf {
        dir.join( format!("{}_range.{}", name, self.file_extension()))
    }

    pub fn render (&self, snapshot: &RangeSnapshot)->Result<String> {
        match self {
            ExportFormat::Json => Ok( serde_json::to_string( snapshot)? ),
            ExportFormat::Kml => Ok( render_kml( snapshot) )
        }
    }

    /// render and write snapshot to `path`. The file is replaced atomically so that readers never see
    /// partial output. Each call uses its own temporary file so concurrent writers cannot clobber each
    /// other (the last rename wins). Note this is blocking IO
    pub fn write_to (&self, snapshot: &RangeSnapshot, path: &Path)->Result<()> {
        let content = self.render( snapshot)?;

        let mut tmp_name = path.file_name()
            .ok_or_else( || OdinAdsbRangeError::OpFailedError( format!("not a file path: {:?}", path)))?
            .to_os_string();
        tmp_name.push( format!(".{}.{}.tmp", process::id(), TMP_SEQ.fetch_add( 1, Ordering::Relaxed)));
        let tmp_path = path.with_file_name( tmp_name);

        fs::write( &tmp_path, content)?;
        fs::rename( &tmp_path, path)?;
        Ok(())
    }
}

fn xml_escape (s: &str)->String {
    let mut out = String::with_capacity( s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c)
        }
    }
    out
}

/// KML polygons for all non-empty layers. KML coordinates are lon,lat,alt tuples, and LinearRings
/// have to be closed so we repeat the first point
pub fn render_kml (snapshot: &RangeSnapshot)->String {
    let name = xml_escape( &snapshot.name);
    let is_layered = snapshot.num_layers() > 0;
    let mut s = String::with_capacity( 4096);

    // writing into a String does not fail
    let _ = writeln!( s, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!( s, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#);
    let _ = writeln!( s, "  <Document>");
    let _ = writeln!( s, "    <name>{}</name>", name);

    for shape in snapshot.layers.iter().filter( |l| l.has_points()) {
        let alt_m = if is_layered {
            layer_min_altitude( shape.layer).get::<meter>()
        } else {
            AGGREGATE_KML_ALTITUDE_M
        };

        let _ = writeln!( s, "    <Placemark>");
        if is_layered {
            let _ = writeln!( s, "      <name>{} layer {} ({:.0}ft+)</name>", name, shape.layer, shape.min_altitude_ft);
        } else {
            let _ = writeln!( s, "      <name>{}</name>", name);
        }
        let _ = writeln!( s, "      <Polygon>");
        let _ = writeln!( s, "        <extrude>1</extrude>");
        let _ = writeln!( s, "        <altitudeMode>relativeToGround</altitudeMode>");
        let _ = writeln!( s, "        <outerBoundaryIs>");
        let _ = writeln!( s, "          <LinearRing>");
        let _ = write!( s, "            <coordinates>");

        let mut first: Option<&GeoPos> = None;
        for p in shape.points.iter().flatten() {
            if first.is_none() { first = Some(p) }
            let _ = write!( s, "{:.6},{:.6},{:.0} ", p.lon, p.lat, alt_m);
        }
        if let Some(p) = first {
            let _ = write!( s, "{:.6},{:.6},{:.0}", p.lon, p.lat, alt_m);
        }

        let _ = writeln!( s, "</coordinates>");
        let _ = writeln!( s, "          </LinearRing>");
        let _ = writeln!( s, "        </outerBoundaryIs>");
        let _ = writeln!( s, "      </Polygon>");
        let _ = writeln!( s, "    </Placemark>");
    }

    let _ = writeln!( s, "  </Document>");
    let _ = writeln!( s, "</kml>");
    s
}
