// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Installs a formatted global subscriber filtered by `RUST_LOG` (default `info`).
///
/// A second call, or a call after another global subscriber was installed,
/// returns [`TelemetryInitError::AlreadyInitialised`].
pub fn init_tracing() -> Result<(), TelemetryInitError> {
    INITIALISED
        .set(())
        .map_err(|_| TelemetryInitError::AlreadyInitialised)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stdout().is_terminal());
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|_| TelemetryInitError::AlreadyInitialised)
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryInitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
}
