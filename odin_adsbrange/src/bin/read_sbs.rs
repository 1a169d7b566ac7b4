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

use anyhow::Result;
use clap::Parser;
use lazy_static::lazy_static;
use uom::si::length::kilometer;
use tokio::{self, net::TcpStream, io::{BufReader, AsyncBufReadExt}};
use odin_adsbrange::{GeoPos, sbs::{DEFAULT_SBS_PORT, SbsFields, parse_msg}};

#[derive(Parser,Debug)]
#[command(about="ADS-B BaseStation socket position monitor")]
struct CliOpts {
    #[arg(help="host name or IP address of the receiver")]
    address: String,

    #[arg(short, long, default_value_t=DEFAULT_SBS_PORT, help="BaseStation port of the receiver")]
    port: u16,

    #[arg(long, allow_negative_numbers=true, requires="lon", help="receiver latitude to show bearing and distance")]
    lat: Option<f64>,

    #[arg(long, allow_negative_numbers=true, requires="lat", help="receiver longitude to show bearing and distance")]
    lon: Option<f64>,
}

lazy_static! { static ref ARGS: CliOpts = CliOpts::parse(); }

#[tokio::main]
async fn main() -> Result<()> {
    let center = ARGS.lat.zip( ARGS.lon).map( |(lat,lon)| GeoPos::new( lat, lon));

    let stream = TcpStream::connect( (ARGS.address.as_str(), ARGS.port)).await?;
    let mut reader = BufReader::with_capacity( 4096, stream);
    let mut line = String::new();

    while reader.read_line( &mut line).await? > 0 {
        let fields = SbsFields::new( &line);
        match parse_msg( &fields) {
            Ok(Some(pos)) => {
                if let Some(c) = &center {
                    println!("{pos} bearing: {:.1}, dist: {:.1}km", c.bearing_to( &pos.point.pos), pos.point.pos.distance_to(c).get::<kilometer>());
                } else {
                    println!("{pos}");
                }
            }
            Ok(None) => {}
            Err(e) => println!("PARSE ERROR: {e}")
        }
        line.clear();
    }
    Ok(())
}
