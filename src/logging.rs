//! Ambient structured logging conveniences (spec §6 CLI surface:
//! `--debug`). The core itself never installs a subscriber — every
//! module logs through plain `tracing` macros and trusts whatever
//! subscriber the embedder set up. This module only offers a ready-made
//! one for embedders/tests that don't want to assemble
//! `tracing-subscriber` by hand; it carries no remote transport —
//! `--remote-log-port` stays an external collaborator's concern (spec
//! §6 "CLI surface (consumed only)").

use tracing_subscriber::{fmt, EnvFilter};

/// The filter implied by the `--debug` CLI flag: debug level for this
/// crate's own spans, info for everything else.
pub fn env_filter(debug: bool) -> EnvFilter {
    let directive = if debug { "tfm_core=debug,info" } else { "info" };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a plain stderr `fmt` subscriber as the global default.
/// Idempotent: a second call is a no-op, since `tracing`'s global
/// dispatcher refuses to be replaced once set.
pub fn install_default_subscriber(debug: bool) {
    let _ = fmt().with_env_filter(env_filter(debug)).with_writer(std::io::stderr).try_init();
}
