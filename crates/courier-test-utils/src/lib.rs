// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators for Courier integration tests.
//!
//! All mocks are builder-style fixtures implementing the collaborator traits
//! from `courier-core`, with call counters where a caching contract needs to
//! be asserted.

pub mod directories;
pub mod mailer;

pub use directories::{
    MockAccountDirectory, MockDomainLookup, MockItemDirectory, MockUserDirectory,
};
pub use mailer::RecordingMailer;
