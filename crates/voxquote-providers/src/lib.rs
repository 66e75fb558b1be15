// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voice-platform webhook adapters for Voxquote.
//!
//! Each adapter implements [`voxquote_core::Provider`]: it authenticates the
//! sender, decodes the vendor JSON, validates and sanitizes it, and produces
//! a canonical [`voxquote_core::CallEvent`]. [`ProviderRegistry`] routes an
//! incoming request to its adapter by webhook path.

pub mod bland;
pub mod common;
pub mod custom;
pub mod registry;
pub mod retell;
pub mod signature;
pub mod timestamp;
pub mod validate;
pub mod vapi;

pub use bland::BlandProvider;
pub use common::{ParseSettings, Secret};
pub use custom::CustomProvider;
pub use registry::{ProviderInfo, ProviderRegistry, build_registry};
pub use retell::RetellProvider;
pub use signature::SignatureError;
pub use vapi::VapiProvider;
