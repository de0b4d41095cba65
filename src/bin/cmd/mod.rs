// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod inspect;
mod map;
mod play;

pub use inspect::InspectCmd;
pub use map::MapCmd;
pub use play::PlayCmd;
