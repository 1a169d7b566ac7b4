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

use std::{path::PathBuf, time::Duration};
use anyhow::{anyhow, Result};
use clap::Parser;
use lazy_static::lazy_static;
use tokio::{sync::watch, task::JoinSet};
use tracing::{info,warn,error};
use tracing_subscriber::EnvFilter;

use odin_adsbrange::{
    load_config, BootstrapPolicy, EngineRegistry, ExportFormat, GeoPos, RangeConfig, ReceiverConfig,
    registry::lock_engine, sbs::DEFAULT_SBS_PORT, session::run_sbs_session
};

#[derive(Parser,Debug)]
#[command(name="adsb_range", about="Save a map shape showing the range of ADS-B messages received")]
struct CliOpts {
    #[arg(short, long, help="RON file with receiver configs (replaces all receiver options)")]
    config: Option<PathBuf>,

    #[arg(short, long, default_value="ADSB", help="name of the receiver")]
    name: String,

    #[arg(short, long, help="IP address or hostname of the receiver")]
    address: Option<String>,

    #[arg(short, long, default_value_t=DEFAULT_SBS_PORT, help="BaseStation port of the receiver")]
    port: u16,

    #[arg(long, allow_negative_numbers=true, help="latitude of the receiver in decimal degrees (estimated if not set)")]
    lat: Option<f64>,

    #[arg(long, allow_negative_numbers=true, help="longitude of the receiver in decimal degrees (estimated if not set)")]
    lon: Option<f64>,

    #[arg(short, long, help="write range in JSON format instead of KML")]
    json: bool,

    #[arg(long, default_value_t=720, help="number of bearing sectors")]
    sectors: usize,

    #[arg(long, default_value_t=0, help="number of 10,000ft altitude layers")]
    layers: usize,

    #[arg(long, default_value_t=300, help="export interval in seconds")]
    interval: u64,

    #[arg(long, help="maximum session duration in hours")]
    max_hours: Option<f64>,

    #[arg(long, default_value=".", help="directory to write range files to")]
    output_dir: PathBuf,

    #[arg(long, help="add positions used to estimate the receiver location to the range")]
    replay_bootstrap: bool,
}

lazy_static! { static ref ARGS: CliOpts = CliOpts::parse(); }

fn receiver_config_from_args ()->Result<ReceiverConfig> {
    let address = ARGS.address.as_ref().ok_or_else( || anyhow!("either --config or --address is required"))?;

    let center = match (ARGS.lat, ARGS.lon) {
        (Some(lat), Some(lon)) => Some( GeoPos::new( lat, lon)),
        (None, None) => None,
        _ => return Err( anyhow!("--lat and --lon have to be both set or both omitted"))
    };

    let mut rc = ReceiverConfig::new( &ARGS.name, address);
    rc.port = ARGS.port;
    rc.center = center;
    rc.sectors = ARGS.sectors;
    rc.layers = ARGS.layers;
    rc.format = if ARGS.json { ExportFormat::Json } else { ExportFormat::Kml };
    rc.export_interval = Duration::from_secs( ARGS.interval);
    rc.max_duration = match ARGS.max_hours {
        Some(h) if h > 0.0 => Some( Duration::from_secs_f64( h * 3600.0)),
        Some(_) => return Err( anyhow!("--max-hours has to be positive")),
        None => None
    };
    rc.output_dir = ARGS.output_dir.clone();
    if ARGS.replay_bootstrap { rc.bootstrap = BootstrapPolicy::Replay }

    Ok(rc)
}

fn get_range_config ()->Result<RangeConfig> {
    let config = if let Some(path) = &ARGS.config {
        load_config::<RangeConfig,_>( path)?
    } else {
        RangeConfig { receivers: vec![ receiver_config_from_args()? ] }
    };

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main ()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new("info")))  // use RUST_LOG to set max level
        .init();

    let config = get_range_config()?;
    let registry = EngineRegistry::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut sessions = JoinSet::new();
    for rc in config.receivers.iter().cloned() {
        let registry = registry.clone();
        let shutdown = shutdown_rx.clone();
        sessions.spawn( async move {
            let name = rc.name.clone();
            (name, run_sbs_session( rc, &registry, shutdown).await)
        });
    }

    loop {
        tokio::select! {
            next = sessions.join_next() => {
                match next {
                    Some(Ok((name, Ok(stats)))) => info!("receiver '{}' terminated after {} positions", name, stats.n_points),
                    Some(Ok((name, Err(e)))) => error!("receiver '{}' failed: {}", name, e),
                    Some(Err(e)) => error!("session task failed: {}", e),
                    None => break
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if *shutdown_tx.borrow() {
                    warn!("interrupted again, aborting sessions");
                    sessions.abort_all();
                } else {
                    warn!("interrupted, writing final range files");
                    let _ = shutdown_tx.send( true); // sessions terminate with a final export
                }
            }
        }
    }

    for name in registry.names() {
        if let Some(shared) = registry.get( &name) {
            let engine = lock_engine( &shared);
            let max_range = engine.max_range_km(0)?.unwrap_or(0.0);
            info!("{}: {} positions, {}/{} sectors covered, max range {:.1}km",
                  name, engine.n_points(), engine.n_filled(0)?, engine.num_sectors(), max_range);
        }
    }

    Ok(())
}
