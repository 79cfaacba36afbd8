// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Display units. Stored data is always metric; conversion happens on output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const METERS_PER_MILE: f64 = 1609.344;
const METERS_PER_FOOT: f64 = 0.3048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Km,
    Mi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationUnit {
    M,
    Ft,
}

impl DistanceUnit {
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            DistanceUnit::Km => meters / 1000.0,
            DistanceUnit::Mi => meters / METERS_PER_MILE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Km => "km",
            DistanceUnit::Mi => "mi",
        }
    }
}

impl ElevationUnit {
    pub fn from_meters(&self, meters: f64) -> f64 {
        match self {
            ElevationUnit::M => meters,
            ElevationUnit::Ft => meters / METERS_PER_FOOT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationUnit::M => "m",
            ElevationUnit::Ft => "ft",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ElevationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "km" => Ok(DistanceUnit::Km),
            "mi" => Ok(DistanceUnit::Mi),
            other => Err(format!("unknown distance unit '{}' (expected mi or km)", other)),
        }
    }
}

impl FromStr for ElevationUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" => Ok(ElevationUnit::M),
            "ft" => Ok(ElevationUnit::Ft),
            other => Err(format!("unknown elevation unit '{}' (expected ft or m)", other)),
        }
    }
}

/// Distance and elevation units used by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Units {
    pub distance: DistanceUnit,
    pub elevation: ElevationUnit,
}

impl Units {
    pub const US: Units = Units {
        distance: DistanceUnit::Mi,
        elevation: ElevationUnit::Ft,
    };

    pub const METRIC: Units = Units {
        distance: DistanceUnit::Km,
        elevation: ElevationUnit::M,
    };

    /// Resolve a named preset (`us` or `metric`).
    pub fn preset(name: &str) -> Option<Units> {
        match name.trim().to_ascii_lowercase().as_str() {
            "us" => Some(Units::US),
            "metric" => Some(Units::METRIC),
            _ => None,
        }
    }
}

impl Default for Units {
    fn default() -> Self {
        Units::US
    }
}
