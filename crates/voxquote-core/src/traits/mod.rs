// SPDX-FileCopyrightText: 2026 Voxquote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions implemented by vendor adapters.

pub mod provider;

pub use provider::Provider;
