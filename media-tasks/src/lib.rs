//! Media Tasks Library
//!
//! Profile-driven media operations run as background tasks:
//! - Profile catalog (built-in plus persisted custom profiles)
//! - Hardware capability probing that gates accelerated profiles
//! - Placeholder substitution into argument vectors
//! - Background downloads and transcodes with pollable progress
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


pub mod api;
pub mod capability;
pub mod command;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod library;
pub mod naming;
pub mod profiles;
pub mod progress;
pub mod runner;
pub mod transcoder;

pub use capability::{Capability, CapabilityProber};
pub use command::{CommandBuilder, ParamValue, Parameters};
pub use downloader::{DownloadEngine, DownloadOutcome, DownloadTick, TickStatus, YtDlpEngine};
pub use engine::TaskEngine;
pub use error::{MediaTaskError, Result};
pub use profiles::{Profile, ProfileRegistry};
pub use progress::{ProgressStore, UpdateOutcome};
pub use runner::{ProgressReporter, TaskRunner};
pub use transcoder::{has_video_stream, ProcessLauncher, ProcessOutput, SystemLauncher};
