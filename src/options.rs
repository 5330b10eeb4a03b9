//! Command option parsers
//!
//! Structured options parsed from a flat argument list, for the command layer
//! that sits above the keyspace. Keywords are matched case-insensitively.
//! Coordinate validation is delegated to a [`CoordinateVerifier`] so the
//! geohash math stays outside this crate.

use std::collections::{BTreeMap, BTreeSet};

use crate::codec::value::parse_f64;
use crate::error::{AtlasError, Result};

/// Get-pattern keyword that requests member coordinates
pub const WITHCOORDINATES: &str = "withcoordinates";

/// Get-pattern keyword that requests member distances
pub const WITHDISTANCES: &str = "withdistances";

fn invalid(msg: impl Into<String>) -> AtlasError {
    AtlasError::InvalidArgument(msg.into())
}

fn is_keyword(arg: &str, keyword: &str) -> bool {
    arg.eq_ignore_ascii_case(keyword)
}

fn parse_double(arg: &str) -> Option<f64> {
    parse_f64(arg.as_bytes())
}

// =============================================================================
// Coordinates
// =============================================================================

/// Coordinate system of a geo argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordType {
    #[default]
    Wgs84,
    Mercator,
}

impl CoordType {
    pub fn parse(token: &str) -> Option<Self> {
        if is_keyword(token, "wgs84") {
            Some(CoordType::Wgs84)
        } else if is_keyword(token, "mercator") {
            Some(CoordType::Mercator)
        } else {
            None
        }
    }
}

/// Validates a coordinate pair for a coordinate system
pub trait CoordinateVerifier {
    fn verify(&self, coord_type: CoordType, x: f64, y: f64) -> bool;
}

impl<F> CoordinateVerifier for F
where
    F: Fn(CoordType, f64, f64) -> bool,
{
    fn verify(&self, coord_type: CoordType, x: f64, y: f64) -> bool {
        self(coord_type, x, y)
    }
}

fn parse_coord_type(args: &[String], off: usize) -> Result<CoordType> {
    let token = args.get(off).map(String::as_str).unwrap_or("");
    CoordType::parse(token).ok_or_else(|| {
        tracing::warn!("Invalid coord-type:{}.", token);
        invalid(format!("Invalid coord-type:{}", token))
    })
}

/// Parse and verify the coordinate pair at `args[off]`, `args[off + 1]`
fn parse_coordinates(
    args: &[String],
    off: usize,
    coord_type: CoordType,
    verifier: &dyn CoordinateVerifier,
) -> Result<(f64, f64)> {
    let (xs, ys) = match (args.get(off), args.get(off + 1)) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(invalid("Invalid coordinates: missing value")),
    };
    let bad = || invalid(format!("Invalid coordinates {}/{}", xs, ys));
    let x = parse_double(xs).ok_or_else(bad)?;
    let y = parse_double(ys).ok_or_else(bad)?;
    if !verifier.verify(coord_type, x, y) {
        return Err(bad());
    }
    Ok((x, y))
}

// =============================================================================
// Sorted-set ranges
// =============================================================================

/// A lexicographic member range such as `[a (z`
///
/// An empty `min` is unbounded low and an empty `max` is unbounded high.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LexRange {
    pub min: Vec<u8>,
    pub max: Vec<u8>,
    pub include_min: bool,
    pub include_max: bool,
}

fn verify_lex_boundary(s: &[u8]) -> bool {
    match s {
        b"-" | b"+" => true,
        [b'(', ..] | [b'[', ..] => true,
        _ => false,
    }
}

impl LexRange {
    /// Parse `-`, `+`, `(value` (exclusive) or `[value` (inclusive) bounds
    pub fn parse(min: &[u8], max: &[u8]) -> Result<Self> {
        if !verify_lex_boundary(min) || !verify_lex_boundary(max) {
            return Err(invalid("min or max not valid string range item"));
        }
        let mut range = LexRange::default();
        if min == b"-" || min == b"+" {
            range.include_min = true;
        } else {
            range.include_min = min[0] == b'[';
            range.min = min[1..].to_vec();
        }
        if max == b"-" || max == b"+" {
            range.include_max = true;
        } else {
            range.include_max = max[0] == b'[';
            range.max = max[1..].to_vec();
        }
        if range.min > range.max && !range.max.is_empty() {
            return Err(invalid("min is greater than max"));
        }
        Ok(range)
    }

    pub fn is_min_unbounded(&self) -> bool {
        self.min.is_empty()
    }

    pub fn is_max_unbounded(&self) -> bool {
        self.max.is_empty()
    }

    /// Whether `member` falls inside the range
    pub fn contains(&self, member: &[u8]) -> bool {
        let above_min = self.is_min_unbounded()
            || if self.include_min {
                member >= self.min.as_slice()
            } else {
                member > self.min.as_slice()
            };
        let below_max = self.is_max_unbounded()
            || if self.include_max {
                member <= self.max.as_slice()
            } else {
                member < self.max.as_slice()
            };
        above_min && below_max
    }
}

/// `WITHSCORES` / `LIMIT offset count` trailer of sorted-set range commands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZSetQueryOptions {
    pub withscores: bool,
    pub withlimit: bool,
    pub limit_offset: i32,
    pub limit_count: i32,
}

impl ZSetQueryOptions {
    pub fn parse(args: &[String], idx: usize) -> Result<Self> {
        let mut opts = ZSetQueryOptions::default();
        let mut i = idx;
        while i < args.len() {
            let arg = args[i].as_str();
            if is_keyword(arg, "withscores") {
                opts.withscores = true;
            } else if is_keyword(arg, "limit") {
                let (offset, count) = match (args.get(i + 1), args.get(i + 2)) {
                    (Some(o), Some(c)) => (o, c),
                    _ => return Err(invalid("syntax error")),
                };
                opts.limit_offset = offset
                    .parse()
                    .map_err(|_| invalid("value is not an integer or out of range"))?;
                opts.limit_count = count
                    .parse()
                    .map_err(|_| invalid("value is not an integer or out of range"))?;
                opts.withlimit = true;
                i += 2;
            } else {
                return Err(invalid("syntax error"));
            }
            i += 1;
        }
        Ok(opts)
    }
}

// =============================================================================
// Geo options
// =============================================================================

/// `<wgs84|mercator> <x> <y> <member> [attr value]...`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoAddOptions {
    pub coord_type: CoordType,
    pub x: f64,
    pub y: f64,
    pub value: String,
    pub attrs: BTreeMap<String, String>,
}

impl GeoAddOptions {
    pub fn parse(args: &[String], off: usize, verifier: &dyn CoordinateVerifier) -> Result<Self> {
        let coord_type = parse_coord_type(args, off)?;
        let (x, y) = parse_coordinates(args, off + 1, coord_type, verifier)?;
        let value = args
            .get(off + 3)
            .cloned()
            .ok_or_else(|| invalid("no member specified"))?;

        let mut attrs = BTreeMap::new();
        let mut i = off + 4;
        while i < args.len() {
            let attr_value = args.get(i + 1).ok_or_else(|| {
                invalid(format!(
                    "Invalid attribute {} with no value followed.",
                    args[i]
                ))
            })?;
            attrs.insert(args[i].clone(), attr_value.clone());
            i += 2;
        }

        Ok(Self {
            coord_type,
            x,
            y,
            value,
            attrs,
        })
    }
}

/// One `GET` pattern (or coordinate/distance request) of a geo search
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeoSearchGetOption {
    pub get_pattern: String,
    /// Pattern was written `#.name` and names a member attribute
    pub get_attr: bool,
    pub get_coordinates: bool,
    pub get_distances: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoSearchOptions {
    pub nosort: bool,
    pub asc: bool,
    pub offset: i32,
    pub limit: i32,
    pub radius: u32,
    pub coord_type: CoordType,
    pub x: f64,
    pub y: f64,
    pub by_location: bool,
    pub by_member: bool,
    pub member: String,
    pub in_members: bool,
    pub submembers: BTreeSet<String>,
    pub get_patterns: Vec<GeoSearchGetOption>,
    pub includes: BTreeMap<String, String>,
    pub excludes: BTreeMap<String, String>,
}

impl Default for GeoSearchOptions {
    fn default() -> Self {
        Self {
            nosort: true,
            asc: true,
            offset: 0,
            limit: -1,
            radius: 0,
            coord_type: CoordType::default(),
            x: 0.0,
            y: 0.0,
            by_location: false,
            by_member: false,
            member: String::new(),
            in_members: false,
            submembers: BTreeSet::new(),
            get_patterns: Vec::new(),
            includes: BTreeMap::new(),
            excludes: BTreeMap::new(),
        }
    }
}

/// Upper bound (exclusive) of a search radius
const MAX_RADIUS: u32 = 10_000_000;

impl GeoSearchOptions {
    pub fn parse(args: &[String], off: usize, verifier: &dyn CoordinateVerifier) -> Result<Self> {
        let mut opts = GeoSearchOptions::default();
        let mut i = off;
        while i < args.len() {
            let arg = args[i].as_str();
            // arguments left after the keyword
            let left = args.len() - i - 1;
            if is_keyword(arg, "asc") {
                opts.nosort = false;
                opts.asc = true;
            } else if is_keyword(arg, "desc") {
                opts.nosort = false;
                opts.asc = false;
            } else if is_keyword(arg, "limit") && left >= 2 {
                let bad = || invalid("Invalid limit/offset value.");
                opts.offset = args[i + 1].parse().map_err(|_| bad())?;
                opts.limit = args[i + 2].parse().map_err(|_| bad())?;
                i += 2;
            } else if is_keyword(arg, "radius") && left >= 1 {
                let radius: u32 = args[i + 1]
                    .parse()
                    .map_err(|_| invalid("Invalid radius value."))?;
                if !(1..MAX_RADIUS).contains(&radius) {
                    return Err(invalid("Invalid radius value."));
                }
                opts.radius = radius;
                i += 1;
            } else if let (Some(coord_type), true) = (CoordType::parse(arg), left >= 2) {
                let bad = || invalid("Invalid location value.");
                let x = parse_double(&args[i + 1]).ok_or_else(bad)?;
                let y = parse_double(&args[i + 2]).ok_or_else(bad)?;
                if !verifier.verify(coord_type, x, y) {
                    return Err(bad());
                }
                opts.coord_type = coord_type;
                opts.x = x;
                opts.y = y;
                opts.by_location = true;
                i += 2;
            } else if is_keyword(arg, "member") && left >= 1 {
                opts.member = args[i + 1].clone();
                opts.by_member = true;
                i += 1;
            } else if is_keyword(arg, "in") && left >= 1 {
                let count: usize = args[i + 1]
                    .parse()
                    .map_err(|_| invalid("Invalid member value."))?;
                if count > left - 1 {
                    return Err(invalid("Invalid member value."));
                }
                opts.submembers
                    .extend(args[i + 2..i + 2 + count].iter().cloned());
                opts.in_members = true;
                i += count + 1;
            } else if is_keyword(arg, "get") && left >= 1 {
                let pattern = &args[i + 1];
                let mut get = GeoSearchGetOption {
                    get_pattern: pattern.clone(),
                    ..Default::default()
                };
                if pattern.len() > 2 && pattern.as_bytes()[..2].eq_ignore_ascii_case(b"#.") {
                    get.get_attr = true;
                    get.get_pattern = pattern[2..].to_string();
                }
                opts.get_patterns.push(get);
                i += 1;
            } else if is_keyword(arg, "include") && left >= 2 {
                if opts.includes.contains_key(&args[i + 1]) {
                    return Err(invalid(format!(
                        "duplicate include key pattern:{}",
                        args[i + 1]
                    )));
                }
                opts.includes.insert(args[i + 1].clone(), args[i + 2].clone());
                i += 2;
            } else if is_keyword(arg, "exclude") && left >= 2 {
                if opts.excludes.contains_key(&args[i + 1]) {
                    return Err(invalid(format!(
                        "duplicate exclude key pattern:{}",
                        args[i + 1]
                    )));
                }
                opts.excludes.insert(args[i + 1].clone(), args[i + 2].clone());
                i += 2;
            } else if is_keyword(arg, WITHCOORDINATES) {
                opts.get_patterns.push(GeoSearchGetOption {
                    get_coordinates: true,
                    ..Default::default()
                });
            } else if is_keyword(arg, WITHDISTANCES) {
                opts.get_patterns.push(GeoSearchGetOption {
                    get_distances: true,
                    ..Default::default()
                });
            } else {
                tracing::debug!("Invalid geosearch option:{}", arg);
                return Err(invalid("Invalid geosearch options."));
            }
            i += 1;
        }

        if opts.radius < 1 {
            return Err(invalid("no radius specified"));
        }
        if !opts.by_location && !opts.by_member {
            return Err(invalid("no location/member specified"));
        }
        Ok(opts)
    }
}

// =============================================================================
// Area options
// =============================================================================

/// `<member> <wgs84|mercator> x1 y1 x2 y2 x3 y3 ...`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AreaAddOptions {
    pub value: String,
    pub coord_type: CoordType,
    pub xx: Vec<f64>,
    pub yy: Vec<f64>,
}

impl AreaAddOptions {
    pub fn parse(args: &[String], off: usize, verifier: &dyn CoordinateVerifier) -> Result<Self> {
        let value = args
            .get(off)
            .cloned()
            .ok_or_else(|| invalid("no member specified"))?;
        let coord_type = parse_coord_type(args, off + 1)?;
        let mut xx = Vec::new();
        let mut yy = Vec::new();
        let mut i = off + 2;
        while i + 1 < args.len() {
            let (x, y) = parse_coordinates(args, i, coord_type, verifier)?;
            xx.push(x);
            yy.push(y);
            i += 2;
        }
        if xx.len() < 3 {
            return Err(invalid("At least 3 vertex needed."));
        }
        if let Some(rest) = args.get(i) {
            return Err(invalid(format!("Rest arg:{}", rest)));
        }
        Ok(Self {
            value,
            coord_type,
            xx,
            yy,
        })
    }
}

/// `<wgs84|mercator> x y [get-pattern]...`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AreaLocateOptions {
    pub coord_type: CoordType,
    pub x: f64,
    pub y: f64,
    pub get_patterns: Vec<String>,
}

impl AreaLocateOptions {
    pub fn parse(args: &[String], off: usize, verifier: &dyn CoordinateVerifier) -> Result<Self> {
        let coord_type = parse_coord_type(args, off)?;
        let (x, y) = parse_coordinates(args, off + 1, coord_type, verifier)?;
        let get_patterns = args.iter().skip(off + 3).cloned().collect();
        Ok(Self {
            coord_type,
            x,
            y,
            get_patterns,
        })
    }
}
