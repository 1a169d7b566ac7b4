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

use thiserror::Error;

pub type Result<T> = std::result::Result<T,OdinAdsbRangeError>;

#[derive(Error,Debug)]
pub enum OdinAdsbRangeError {

    #[error("parse error {0}")]
    ParseError(String),

    #[error("IO error {0}")]
    IOError( #[from] std::io::Error),

    #[error("config error {0}")]
    ConfigError( #[from] ron::error::SpannedError),

    #[error("JSON error {0}")]
    JsonError( #[from] serde_json::Error),

    #[error("task join error {0}")]
    JoinError( #[from] tokio::task::JoinError),

    #[error("layer {layer} out of bounds (configured layers: 0..={num_layers})")]
    LayerOutOfBounds { layer: usize, num_layers: usize },

    #[error("sector {sector} out of bounds (configured sectors: {num_sectors})")]
    SectorOutOfBounds { sector: usize, num_sectors: usize },

    #[error("invalid config {0}")]
    InvalidConfig(String),

    #[error("operation failed {0}")]
    OpFailedError(String)
}

macro_rules! parse_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinAdsbRangeError::ParseError( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use parse_error;

macro_rules! config_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        OdinAdsbRangeError::InvalidConfig( format!( $fmt $(, $arg)* ))
    };
}
pub (crate) use config_error;
