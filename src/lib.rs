// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Heatmap-Sync: incremental activity sync for a calendar heatmap
//!
//! This crate pulls activities from Strava or Garmin Connect, keeps a
//! canonical history with a resumable backfill cursor, and emits daily
//! aggregates plus the JSON artifact a static dashboard reads.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;
