// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input safety for the chanlink delivery system.
//!
//! Provides the payload blocklist, idempotent HTML escaping, identifier
//! whitelisting with an optional allow-list, and the [`Validator`] that
//! combines them at the write boundary.

pub mod blocklist;
pub mod escape;
pub mod identifier;
pub mod validator;

pub use blocklist::Blocklist;
pub use escape::escape_html;
pub use identifier::{AllowList, validate_identifier};
pub use validator::Validator;
