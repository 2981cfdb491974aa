// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kilometer and lap splits.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How a split was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/src/lib/generated/")
)]
pub enum SplitKind {
    /// Emitted when cumulative distance crosses a kilometer boundary
    AutoKm,
    /// Lap button
    Manual,
}

/// A finalized segment of a session. Never revised once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/src/lib/generated/")
)]
pub struct Split {
    /// 1-based, counted per kind
    pub index: u32,
    pub distance_m: f64,
    pub duration_s: f64,
    pub avg_pace_s_per_km: f64,
    pub start_elapsed_s: f64,
    pub end_elapsed_s: f64,
    pub kind: SplitKind,
}
