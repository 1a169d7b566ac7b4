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

use std::sync::{Arc,Mutex,MutexGuard};
use dashmap::DashMap;

use crate::errors::{Result, OdinAdsbRangeError, config_error};
use crate::export::RangeSnapshot;
use crate::range::RangeEngine;

/// an engine that is shared between the session that feeds it and whoever exports it.
/// The lock must not be held across await points
pub type SharedEngine = Arc<Mutex<RangeEngine>>;

/// lock a shared engine, recovering from poisoned locks (engine state is consistent between add_point calls)
pub fn lock_engine (engine: &SharedEngine)->MutexGuard<'_,RangeEngine> {
    engine.lock().unwrap_or_else( |poisoned| poisoned.into_inner())
}

/// the set of active engines, keyed by receiver name. This is passed explicitly to whatever needs to
/// enumerate engines (there is no global engine list)
#[derive(Debug,Default,Clone)]
pub struct EngineRegistry {
    engines: Arc<DashMap<String,SharedEngine>>,
}

impl EngineRegistry {
    pub fn new ()->Self { EngineRegistry::default() }

    pub fn register (&self, name: &str, engine: RangeEngine)->Result<SharedEngine> {
        let shared = Arc::new( Mutex::new( engine));

        match self.engines.entry( name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err( config_error!("engine '{}' already registered", name)),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert( shared.clone());
                Ok(shared)
            }
        }
    }

    pub fn get (&self, name: &str)->Option<SharedEngine> {
        self.engines.get( name).map( |e| e.value().clone())
    }

    pub fn remove (&self, name: &str)->Option<SharedEngine> {
        self.engines.remove( name).map( |(_,e)| e)
    }

    pub fn contains (&self, name: &str)->bool { self.engines.contains_key( name) }

    /// sorted list of registered engine names
    pub fn names (&self)->Vec<String> {
        let mut names: Vec<String> = self.engines.iter().map( |e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len (&self)->usize { self.engines.len() }
    pub fn is_empty (&self)->bool { self.engines.is_empty() }

    /// snapshots of all registered engines, sorted by name
    pub fn snapshot_all (&self)->Result<Vec<RangeSnapshot>> {
        let mut snapshots = Vec::with_capacity( self.engines.len());
        for name in self.names() {
            if let Some(shared) = self.get( &name) {
                let engine = lock_engine( &shared);
                snapshots.push( RangeSnapshot::from_engine( &name, &engine)?);
            }
        }
        Ok(snapshots)
    }
}
