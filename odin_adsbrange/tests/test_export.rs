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
#![allow(unused)]

use std::{fs, path::{Path,PathBuf}};
use serde_json::Value;
use odin_adsbrange::{GeoPos, RangeEngine, RangePoint, RangeSnapshot, ExportFormat, export::render_kml};

// run with "cargo test --test test_export -- --nocapture"

fn test_dir (name: &str)->PathBuf {
    let dir = std::env::temp_dir().join( format!("odin_adsbrange_{}_{}", name, std::process::id()));
    fs::create_dir_all( &dir).unwrap();
    dir
}

/// 4 sectors, north and east filled
fn flat_engine ()->RangeEngine {
    let mut engine = RangeEngine::new( Some( GeoPos::new( 0.0, 0.0)), 4, 0).unwrap();
    engine.add_point( &RangePoint::new( 1.0, 0.0, None));
    engine.add_point( &RangePoint::new( 0.0, 2.0, None));
    engine
}

#[test]
fn test_snapshot () {
    let engine = flat_engine();
    let snapshot = RangeSnapshot::from_engine( "test", &engine).unwrap();

    assert_eq!( snapshot.name, "test");
    assert_eq!( snapshot.num_layers(), 0);
    assert_eq!( snapshot.n_points, 2);
    assert_eq!( snapshot.layers.len(), 1);
    assert_eq!( snapshot.layers[0].points, engine.range_shape(0).unwrap());
}

#[test]
fn test_json () {
    let snapshot = RangeSnapshot::from_engine( "test", &flat_engine()).unwrap();
    let json = ExportFormat::Json.render( &snapshot).unwrap();
    println!("{json}");

    let v: Value = serde_json::from_str( &json).unwrap();
    assert_eq!( v["name"], "test");
    assert_eq!( v["center"]["lat"], 0.0);

    let points = v["layers"][0]["points"].as_array().unwrap();
    assert_eq!( points.len(), 4);
    assert_eq!( points[0], serde_json::json!([1.0, 0.0])); // lat,lon
    assert_eq!( points[1], serde_json::json!([0.0, 2.0]));
    assert!( points[2].is_null());
    assert!( points[3].is_null());
}

#[test]
fn test_kml () {
    let snapshot = RangeSnapshot::from_engine( "R&D <1>", &flat_engine()).unwrap();
    let kml = ExportFormat::Kml.render( &snapshot).unwrap();
    println!("{kml}");

    assert!( kml.starts_with( r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!( kml.contains( "<name>R&amp;D &lt;1&gt;</name>"));
    assert_eq!( kml.matches( "<Placemark>").count(), 1);
    assert!( kml.contains( "<altitudeMode>relativeToGround</altitudeMode>"));

    // lon,lat,alt order, empty sectors skipped and ring closed
    let north = "0.000000,1.000000,100";
    let east = "2.000000,0.000000,100";
    assert_eq!( kml.matches( north).count(), 2);
    assert_eq!( kml.matches( east).count(), 1);
    assert!( kml.contains( &format!("<coordinates>{north} {east} {north}</coordinates>")));
}

#[test]
fn test_layered_kml () {
    let mut engine = RangeEngine::new( Some( GeoPos::new( 0.0, 0.0)), 4, 3).unwrap();
    engine.add_point( &RangePoint::with_altitude_ft( 1.0, 0.0, 25_000.0));

    let snapshot = RangeSnapshot::from_engine( "layered", &engine).unwrap();
    assert_eq!( snapshot.layers[2].min_altitude_ft, 20_000.0);

    let kml = render_kml( &snapshot);
    println!("{kml}");

    // only layer 0 (aggregate) and layer 2 have points
    assert_eq!( kml.matches( "<Placemark>").count(), 2);
    assert!( kml.contains( "<name>layered layer 0 (0ft+)</name>"));
    assert!( kml.contains( "<name>layered layer 2 (20000ft+)</name>"));
    assert!( !kml.contains( "layer 1 ("));
    assert!( kml.contains( "0.000000,1.000000,6096 ")); // 20,000ft in meters
    assert!( kml.contains( "0.000000,1.000000,0 "));
}

#[test]
fn test_write () {
    let dir = test_dir( "write");
    let snapshot = RangeSnapshot::from_engine( "ADSB", &flat_engine()).unwrap();

    for format in [ExportFormat::Json, ExportFormat::Kml] {
        let path = format.output_path( &dir, "ADSB");
        assert_eq!( path.file_name().unwrap().to_str().unwrap(), format!("ADSB_range.{}", format.file_extension()));

        format.write_to( &snapshot, &path).unwrap();
        let content = fs::read_to_string( &path).unwrap();
        assert_eq!( content, format.render( &snapshot).unwrap());
    }

    // no temporary files left behind
    let n_tmp = fs::read_dir( &dir).unwrap().filter( |e| e.as_ref().unwrap().path().to_string_lossy().ends_with(".tmp")).count();
    assert_eq!( n_tmp, 0);

    let _ = fs::remove_dir_all( &dir);
}

#[test]
fn test_concurrent_writes () {
    let dir = test_dir( "concurrent_write");
    let path = ExportFormat::Json.output_path( &dir, "shared");

    let handles: Vec<_> = (0..8).map( |i| {
        let path = path.clone();
        std::thread::spawn( move || {
            let mut engine = flat_engine();
            engine.add_point( &RangePoint::new( -(i as f64) - 1.0, 0.0, None));
            let snapshot = RangeSnapshot::from_engine( "shared", &engine).unwrap();
            for _ in 0..10 {
                ExportFormat::Json.write_to( &snapshot, &path).unwrap();
            }
        })
    }).collect();

    for h in handles { h.join().unwrap() }

    // whoever renamed last, the file is complete
    let v: Value = serde_json::from_str( &fs::read_to_string( &path).unwrap()).unwrap();
    assert_eq!( v["name"], "shared");
    assert_eq!( fs::read_dir( &dir).unwrap().count(), 1);

    let _ = fs::remove_dir_all( &dir);
}
