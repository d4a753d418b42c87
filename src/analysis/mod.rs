// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Statistical key detection.

pub mod correlation;
pub mod key_profile;

pub use correlation::{pearson, pearson_slices};
pub use key_profile::{
    classify, display_key, duration_sample, key_profiles, KeyEstimate, KeyProfile, Mode,
    MAJOR_TEMPLATE, MINOR_TEMPLATE,
};
