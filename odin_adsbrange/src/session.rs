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

use std::{path::PathBuf, sync::Arc};
use tokio::{self, sync::watch, time::{self, Instant, MissedTickBehavior}};
use tracing::{info,warn,error,debug};

use crate::config::ReceiverConfig;
use crate::errors::Result;
use crate::export::RangeSnapshot;
use crate::range::{RangeEngine, BOOTSTRAP_POINTS};
use crate::registry::{EngineRegistry, SharedEngine, lock_engine};
use crate::sbs::{PositionSource, SbsSource};

#[derive(Debug,Default,Clone,Copy,PartialEq,Eq)]
pub struct SessionStats {
    pub n_points: usize,  // points fed into the engine (including bootstrap points)
    pub n_exports: usize, // successful exports, including the final one
}

/// a session feeds the positions of one receiver into its own engine and periodically exports the
/// range envelope. The session terminates when the source is exhausted, the optional max duration
/// is exceeded or a shutdown is requested, in all cases with a final export
pub struct RangeSession {
    config: Arc<ReceiverConfig>,
    engine: SharedEngine,
    shutdown: Option<watch::Receiver<bool>>,
}

impl RangeSession {
    /// create the engine for the configured receiver and register it under the receiver name
    pub fn new (config: ReceiverConfig, registry: &EngineRegistry)->Result<Self> {
        config.validate()?;

        let engine = RangeEngine::new( config.center, config.sectors, config.layers)?
            .with_bootstrap_policy( config.bootstrap);
        let engine = registry.register( &config.name, engine)?;

        if config.center.is_none() {
            info!("no center for receiver '{}', estimating from first {} positions", config.name, BOOTSTRAP_POINTS);
        }

        Ok( RangeSession { config: Arc::new(config), engine, shutdown: None } )
    }

    /// terminate `run` (with a final export) once `true` is sent on the corresponding channel
    pub fn with_shutdown (mut self, shutdown: watch::Receiver<bool>)->Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn name (&self)->&str { self.config.name.as_str() }
    pub fn config (&self)->&ReceiverConfig { self.config.as_ref() }
    pub fn engine (&self)->&SharedEngine { &self.engine }

    /// take a consistent snapshot of all engine layers
    pub fn snapshot (&self)->Result<RangeSnapshot> {
        let engine = lock_engine( &self.engine);
        RangeSnapshot::from_engine( &self.config.name, &engine)
    }

    /// snapshot the engine and write it in the configured format. The engine lock is only held
    /// during the snapshot, the file write happens in a blocking task
    pub async fn export (&self)->Result<PathBuf> {
        let snapshot = self.snapshot()?;
        let format = self.config.format;
        let path = self.config.output_path();

        let p = path.clone();
        tokio::task::spawn_blocking( move || format.write_to( &snapshot, &p)).await??;

        info!("written range of '{}' to {:?}", self.config.name, path);
        Ok(path)
    }

    async fn checked_export (&self, stats: &mut SessionStats) {
        match self.export().await {
            Ok(_) => stats.n_exports += 1,
            Err(e) => error!("export of '{}' failed: {}", self.config.name, e)
        }
    }

    /// process positions from `source` until it is exhausted, fails or the max session duration is reached
    pub async fn run<S> (&self, source: &mut S)->Result<SessionStats> where S: PositionSource {
        let mut stats = SessionStats::default();

        let period = self.config.export_interval;
        let mut ticker = time::interval_at( Instant::now() + period, period);
        ticker.set_missed_tick_behavior( MissedTickBehavior::Delay);

        let deadline = self.config.max_duration.map( |d| Instant::now() + d);
        let timeout = async move {
            match deadline {
                Some(t) => time::sleep_until(t).await,
                None => std::future::pending::<()>().await
            }
        };
        tokio::pin!(timeout);

        let mut shutdown = self.shutdown.clone();
        let stop = async move {
            if let Some(rx) = shutdown.as_mut() {
                if rx.wait_for( |stop| *stop).await.is_ok() { return }
            }
            std::future::pending::<()>().await // no shutdown channel, or sender dropped
        };
        tokio::pin!(stop);

        let res: Result<()> = loop {
            tokio::select! {
                next = source.next_point() => {
                    match next {
                        Ok(Some(p)) => {
                            lock_engine( &self.engine).add_point( &p);
                            stats.n_points += 1;
                        }
                        Ok(None) => {
                            info!("position source of '{}' closed", self.config.name);
                            break Ok(())
                        }
                        Err(e) => {
                            warn!("position source of '{}' failed: {}", self.config.name, e);
                            break Err(e)
                        }
                    }
                }
                _ = ticker.tick() => {
                    debug!("periodic export of '{}' after {} points", self.config.name, stats.n_points);
                    self.checked_export( &mut stats).await;
                }
                _ = &mut timeout => {
                    info!("max session duration of '{}' reached", self.config.name);
                    break Ok(())
                }
                _ = &mut stop => {
                    info!("shutdown of '{}' requested", self.config.name);
                    break Ok(())
                }
            }
        };

        self.checked_export( &mut stats).await;
        res.map( |_| stats)
    }
}

/// connect to the configured receiver and run a session for it until the source closes, the max duration
/// is reached or `true` is sent on the `shutdown` channel
pub async fn run_sbs_session (config: ReceiverConfig, registry: &EngineRegistry, shutdown: watch::Receiver<bool>)->Result<SessionStats> {
    let mut connect_shutdown = shutdown.clone();
    let session = RangeSession::new( config, registry)?.with_shutdown( shutdown);
    let cfg = session.config();

    let mut source = tokio::select! {
        res = SbsSource::connect( &cfg.address, cfg.port) => res?,
        Ok(_) = connect_shutdown.wait_for( |stop| *stop) => {
            info!("shutdown of '{}' requested before connecting", cfg.name);
            return Ok( SessionStats::default())
        }
    };
    info!("connected to receiver '{}' at {}:{}", cfg.name, cfg.address, cfg.port);

    let stats = session.run( &mut source).await?;
    info!("session '{}' done: {} lines, {} positions, {} parse errors, {} exports",
          cfg.name, source.n_lines(), source.n_positions(), source.n_errors(), stats.n_exports);
    Ok(stats)
}
