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

use std::{fs, path::PathBuf, time::Duration};
use tokio::sync::watch;
use async_trait::async_trait;
use serde_json::Value;
use odin_adsbrange::{
    load_config, BootstrapPolicy, EngineRegistry, ExportFormat, GeoPos, OdinAdsbRangeError, RangeConfig, RangePoint,
    RangeSession, ReceiverConfig, Result, registry::lock_engine, sbs::{PositionSource, SbsSource}
};

// run with "cargo test --test test_session -- --nocapture"

fn test_dir (name: &str)->PathBuf {
    let dir = std::env::temp_dir().join( format!("odin_adsbrange_{}_{}", name, std::process::id()));
    fs::create_dir_all( &dir).unwrap();
    dir
}

fn test_config (name: &str, dir: &PathBuf)->ReceiverConfig {
    let mut rc = ReceiverConfig::new( name, "localhost");
    rc.center = Some( GeoPos::new( 37.0, -122.0));
    rc.sectors = 8;
    rc.format = ExportFormat::Json;
    rc.export_interval = Duration::from_secs( 3600);
    rc.output_dir = dir.clone();
    rc
}

fn sbs_line (lat: f64, lon: f64, alt: i64)->String {
    format!("MSG,3,111,11111,A04424,111111,2016/03/11,13:07:05.343,2016/03/11,13:07:05.288,,{alt},,,{lat:.5},{lon:.5},,,,,,0\n")
}

/// a source that never delivers anything
struct IdleSource;

#[async_trait]
impl PositionSource for IdleSource {
    async fn next_point (&mut self)->Result<Option<RangePoint>> {
        std::future::pending::<()>().await;
        Ok(None)
    }
}

/// a source that fails after delivering its points
struct FailingSource (Vec<RangePoint>);

#[async_trait]
impl PositionSource for FailingSource {
    async fn next_point (&mut self)->Result<Option<RangePoint>> {
        match self.0.pop() {
            Some(p) => Ok(Some(p)),
            None => Err( OdinAdsbRangeError::OpFailedError("connection reset".into()))
        }
    }
}

#[tokio::test]
async fn test_session_run () {
    let dir = test_dir( "session_run");
    let registry = EngineRegistry::new();
    let session = RangeSession::new( test_config( "rx1", &dir), &registry).unwrap();

    let input: String = [
        sbs_line( 38.0, -122.0, 31000), // north
        sbs_line( 37.0, -121.0, 12000), // east
        "MSG,4,111,11111,AC1FCC,111111,2016/03/11,13:07:07.777,2016/03/11,13:07:07.713,,,316,106,,,1536,,,,,0\n".to_string(),
        sbs_line( 36.5, -122.0, 5000), // south
    ].concat();
    let mut source = SbsSource::new( input.as_bytes());

    let stats = session.run( &mut source).await.unwrap();
    println!("{stats:?}");
    assert_eq!( stats.n_points, 3);
    assert_eq!( stats.n_exports, 1); // only the final one

    let engine = registry.get( "rx1").unwrap();
    assert_eq!( lock_engine( &engine).n_filled(0).unwrap(), 3);

    let path = dir.join( "rx1_range.json");
    let v: Value = serde_json::from_str( &fs::read_to_string( &path).unwrap()).unwrap();
    assert_eq!( v["name"], "rx1");
    assert_eq!( v["layers"][0]["points"].as_array().unwrap().len(), 8);
    assert_eq!( v["layers"][0]["points"][0], serde_json::json!([38.0, -122.0]));

    let _ = fs::remove_dir_all( &dir);
}

#[tokio::test]
async fn test_duplicate_session () {
    let dir = test_dir( "duplicate");
    let registry = EngineRegistry::new();
    let _s1 = RangeSession::new( test_config( "rx", &dir), &registry).unwrap();
    assert!( matches!( RangeSession::new( test_config( "rx", &dir), &registry), Err(OdinAdsbRangeError::InvalidConfig(_))));
    assert_eq!( registry.len(), 1);
    let _ = fs::remove_dir_all( &dir);
}

#[tokio::test]
async fn test_max_duration () {
    let dir = test_dir( "max_duration");
    let registry = EngineRegistry::new();

    let mut rc = test_config( "idle", &dir);
    rc.format = ExportFormat::Kml;
    rc.export_interval = Duration::from_millis( 40);
    rc.max_duration = Some( Duration::from_millis( 200));
    let session = RangeSession::new( rc, &registry).unwrap();

    let stats = session.run( &mut IdleSource).await.unwrap();
    println!("{stats:?}");
    assert_eq!( stats.n_points, 0);
    assert!( stats.n_exports >= 2); // periodic + final
    assert!( dir.join( "idle_range.kml").exists());

    let _ = fs::remove_dir_all( &dir);
}

#[tokio::test]
async fn test_shutdown () {
    let dir = test_dir( "shutdown");
    let registry = EngineRegistry::new();
    let (tx, rx) = watch::channel(false);
    let session = RangeSession::new( test_config( "stopped", &dir), &registry).unwrap().with_shutdown( rx);

    let stopper = tokio::spawn( async move {
        tokio::time::sleep( Duration::from_millis( 50)).await;
        tx.send( true).unwrap();
        tx // keep the sender alive until we are done
    });

    let stats = tokio::time::timeout( Duration::from_secs( 5), session.run( &mut IdleSource)).await
        .expect("session did not terminate on shutdown")
        .unwrap();
    assert_eq!( stats.n_exports, 1);
    assert!( dir.join( "stopped_range.json").exists());

    let _tx = stopper.await.unwrap();
    let _ = fs::remove_dir_all( &dir);
}

#[tokio::test]
async fn test_dropped_shutdown_sender () {
    let dir = test_dir( "dropped_sender");
    let registry = EngineRegistry::new();
    let (tx, rx) = watch::channel(false);
    drop(tx);

    let mut rc = test_config( "orphan", &dir);
    rc.max_duration = Some( Duration::from_millis( 100));
    let session = RangeSession::new( rc, &registry).unwrap().with_shutdown( rx);

    // a closed channel is not a shutdown request, we only stop at the max duration
    let t0 = tokio::time::Instant::now();
    let stats = session.run( &mut IdleSource).await.unwrap();
    assert!( t0.elapsed() >= Duration::from_millis( 100));
    assert_eq!( stats.n_exports, 1);

    let _ = fs::remove_dir_all( &dir);
}

#[tokio::test]
async fn test_source_failure () {
    let dir = test_dir( "source_failure");
    let registry = EngineRegistry::new();
    let session = RangeSession::new( test_config( "failing", &dir), &registry).unwrap();

    let mut source = FailingSource( vec![ RangePoint::new( 38.0, -122.0, None) ]);
    let res = session.run( &mut source).await;
    assert!( res.is_err());

    // we still get the final export
    assert!( dir.join( "failing_range.json").exists());
    assert_eq!( lock_engine( session.engine()).n_points(), 1);

    let _ = fs::remove_dir_all( &dir);
}

#[tokio::test]
async fn test_bootstrap_session () {
    let dir = test_dir( "bootstrap");
    let registry = EngineRegistry::new();

    let mut rc = test_config( "roaming", &dir);
    rc.center = None;
    rc.bootstrap = BootstrapPolicy::Replay;
    let session = RangeSession::new( rc, &registry).unwrap();

    let mut input = String::new();
    for i in 0..600 {
        let a = (i as f64).to_radians() * 7.0;
        input.push_str( &sbs_line( 37.0 + a.sin(), -122.0 + a.cos(), 20000));
    }
    let mut source = SbsSource::new( input.as_bytes());
    let stats = session.run( &mut source).await.unwrap();
    assert_eq!( stats.n_points, 600);

    let engine = lock_engine( session.engine());
    let center = engine.center().unwrap();
    println!("estimated center: {center}");
    assert!( (center.lat - 37.0).abs() < 0.1);
    assert!( (center.lon + 122.0).abs() < 0.1);
    assert_eq!( engine.n_points(), 600); // replayed
    drop(engine);

    let _ = fs::remove_dir_all( &dir);
}

#[test]
fn test_registry_snapshots () {
    let dir = test_dir( "registry");
    let registry = EngineRegistry::new();
    let _b = RangeSession::new( test_config( "b", &dir), &registry).unwrap();
    let _a = RangeSession::new( test_config( "a", &dir), &registry).unwrap();

    assert_eq!( registry.names(), vec!["a".to_string(), "b".to_string()]);
    let snapshots = registry.snapshot_all().unwrap();
    assert_eq!( snapshots.len(), 2);
    assert_eq!( snapshots[0].name, "a");

    assert!( registry.remove( "a").is_some());
    assert!( !registry.contains( "a"));
    assert_eq!( registry.len(), 1);

    let _ = fs::remove_dir_all( &dir);
}

#[test]
fn test_load_config () {
    let config: RangeConfig = load_config( "configs/adsb_range.ron").unwrap();
    config.validate().unwrap();
    assert_eq!( config.receivers.len(), 2);

    let home = &config.receivers[0];
    assert_eq!( home.layers, 4);
    assert_eq!( home.max_duration, Some( Duration::from_secs( 86400)));
    assert_eq!( home.output_path(), PathBuf::from("ranges/home_range.kml"));

    let portable = &config.receivers[1];
    assert_eq!( portable.port, 30003);
    assert_eq!( portable.sectors, 720);
    assert_eq!( portable.center, None);
    assert_eq!( portable.bootstrap, BootstrapPolicy::Replay);
    assert_eq!( portable.format, ExportFormat::Json);
    assert_eq!( portable.export_interval, Duration::from_secs( 300));
}

#[test]
fn test_invalid_config () {
    let mut rc = ReceiverConfig::new( "rx", "localhost");
    rc.sectors = 0;
    assert!( rc.validate().is_err());

    let rc = ReceiverConfig::new( " ", "localhost");
    assert!( rc.validate().is_err());

    let config = RangeConfig { receivers: vec![ ReceiverConfig::new( "x", "a"), ReceiverConfig::new( "x", "b") ] };
    assert!( matches!( config.validate(), Err(OdinAdsbRangeError::InvalidConfig(_))));
}
