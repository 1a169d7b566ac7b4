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

use std::{fmt, str::FromStr};
use async_trait::async_trait;
use tokio::{net::TcpStream, io::{AsyncBufRead, AsyncBufReadExt, BufReader}};
use uom::si::{f64::Length, length::foot};
use tracing::{warn,debug};

use crate::errors::{Result, OdinAdsbRangeError, parse_error};
use crate::range::RangePoint;

/// default BaseStation port of dump1090 and compatible receivers
pub const DEFAULT_SBS_PORT: u16 = 30003;

const MAX_FIELDS: usize = 24;

/// something that produces decoded receiver positions. Implementations have to filter out messages
/// without position, i.e. every returned point is supposed to be fed into the engine.
/// `Ok(None)` means the source is exhausted
#[async_trait]
pub trait PositionSource: Send {
    async fn next_point (&mut self)->Result<Option<RangePoint>>;
}

/// a zero-copy field accessor for a single comma separated SBS line
pub struct SbsFields<'a> {
    line: &'a str,
    bounds: [(usize,usize); MAX_FIELDS],
    len: usize,
}

impl<'a> SbsFields<'a> {
    pub fn new (line: &'a str)->Self {
        let line = line.trim_end_matches( ['\r','\n']);
        let mut bounds = [(0,0); MAX_FIELDS];
        let mut len = 0;
        let mut i0 = 0;

        for i in memchr::memchr_iter( b',', line.as_bytes()) {
            if len >= MAX_FIELDS { break }
            bounds[len] = (i0,i);
            len += 1;
            i0 = i+1;
        }
        if len < MAX_FIELDS {
            bounds[len] = (i0, line.len());
            len += 1;
        }

        SbsFields { line, bounds, len }
    }

    pub fn line (&self)->&'a str { self.line }
    pub fn len (&self)->usize { self.len }
    pub fn is_empty (&self)->bool { self.line.is_empty() }

    /// the trimmed field value, None if the field is missing or blank
    pub fn str_field (&self, i: usize)->Option<&'a str> {
        if i < self.len {
            let (i0,i1) = self.bounds[i];
            let s = self.line[i0..i1].trim();
            if s.is_empty() { None } else { Some(s) }
        } else {
            None
        }
    }

    /// the parsed field value, None if the field is missing or blank and an error if it is malformed
    pub fn field<T: FromStr> (&self, i: usize)->Result<Option<T>> {
        match self.str_field(i) {
            Some(s) => s.parse::<T>().map( Some).map_err( |_| parse_error!("malformed field {} '{}' in SBS message: {}", i, s, self.line)),
            None => Ok(None)
        }
    }
}

/// a decoded position message
#[derive(Debug)]
pub struct SbsPosition<'a> {
    pub icao24: &'a str,
    pub on_ground: bool,
    pub point: RangePoint,
}

impl<'a> fmt::Display for SbsPosition<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "SbsPosition( icao24: {}, on_ground: {}, {})", self.icao24, self.on_ground, self.point)
    }
}

/// SBS as documented on http://woodair.net/SBS/Article/Barebones42_Socket_Data.htm
///
/// Message examples:
///  MSG,3,111,11111,A04424,111111,2016/03/11,13:07:05.343,2016/03/11,13:07:05.288,,11025,,,37.17274,-122.03935,,,,,,0
///  MSG,4,111,11111,AC1FCC,111111,2016/03/11,13:07:07.777,2016/03/11,13:07:07.713,,,316,106,,,1536,,,,,0
///
/// the fields we use:
///   0: message type (MSG, SEL, ID, AIR, STA, CLK)
///   1: transmission type (MSG only: 2: ES surface position, 3: ES airborne position)
///   4: ICAO 24 bit id
///  11: mode-C altitude in ft (flight level based, *not* AMSL)
///  14: latitude
///  15: longitude
///
/// returns `Ok(None)` for all messages that do not carry a position
pub fn parse_msg<'a> (fields: &SbsFields<'a>)->Result<Option<SbsPosition<'a>>> {
    if fields.str_field(0) != Some("MSG") {
        return Ok(None)
    }

    let msg_type: u64 = fields.field(1)?.ok_or_else( || parse_error!("missing transmission type in SBS message: {}", fields.line()))?;
    let on_ground = match msg_type {
        2 => true,
        3 => false,
        _ => return Ok(None)
    };

    let (latitude, longitude) = match (fields.field::<f64>(14)?, fields.field::<f64>(15)?) {
        (Some(lat), Some(lon)) => (lat,lon),
        _ => return Ok(None) // dump1090 sends position messages without position if it could not decode CPR yet
    };

    let mut altitude = fields.field::<f64>(11)?.map( Length::new::<foot>);
    if on_ground && altitude.is_none() {
        altitude = Some( Length::new::<foot>(0.0));
    }

    let point = RangePoint::new( latitude, longitude, altitude);
    if !point.pos.is_valid() {
        return Err( parse_error!("position out of range in SBS message: {}", fields.line()))
    }

    let icao24 = fields.str_field(4).unwrap_or("");
    Ok( Some( SbsPosition{ icao24, on_ground, point }) )
}

/// convenience function to get the position (if any) from a single SBS line
pub fn parse_position (line: &str)->Result<Option<RangePoint>> {
    let fields = SbsFields::new( line);
    Ok( parse_msg( &fields)?.map( |p| p.point) )
}

/// a [`PositionSource`] that reads SBS lines from an async reader (normally a receiver socket)
pub struct SbsSource<R> {
    reader: R,
    buf: Vec<u8>, // persists between calls so that a cancelled read does not lose partial lines

    n_lines: usize,
    n_positions: usize,
    n_errors: usize,
}

impl SbsSource<BufReader<TcpStream>> {
    pub async fn connect (address: &str, port: u16)->Result<Self> {
        let stream = TcpStream::connect( (address, port)).await?;
        debug!("connected to SBS source {}:{}", address, port);
        Ok( SbsSource::new( BufReader::with_capacity( 8192, stream)) )
    }
}

impl<R> SbsSource<R> where R: AsyncBufRead + Unpin + Send {
    pub fn new (reader: R)->Self {
        SbsSource { reader, buf: Vec::with_capacity(256), n_lines: 0, n_positions: 0, n_errors: 0 }
    }

    pub fn n_lines (&self)->usize { self.n_lines }
    pub fn n_positions (&self)->usize { self.n_positions }
    pub fn n_errors (&self)->usize { self.n_errors }

    fn process_line (&mut self)->Option<RangePoint> {
        self.n_lines += 1;

        let res = match std::str::from_utf8( &self.buf) {
            Ok(line) => parse_position( line),
            Err(_) => Err( parse_error!("SBS message is not valid UTF-8"))
        };

        match res {
            Ok(Some(p)) => {
                self.n_positions += 1;
                Some(p)
            }
            Ok(None) => None,
            Err(e) => {
                self.n_errors += 1;
                warn!("PARSE ERROR: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl<R> PositionSource for SbsSource<R> where R: AsyncBufRead + Unpin + Send {
    async fn next_point (&mut self)->Result<Option<RangePoint>> {
        loop {
            let n = self.reader.read_until( b'\n', &mut self.buf).await?;
            if n == 0 && self.buf.is_empty() {
                return Ok(None)
            }

            let res = self.process_line();
            self.buf.clear();

            if res.is_some() {
                return Ok(res)
            }
        }
    }
}
