//! # Logging
//!
//! One-shot `tracing` setup for hosts that do not install their own
//! subscriber.
//!
//! | Platform | Subscriber                               |
//! |----------|------------------------------------------|
//! | Native   | `tracing-subscriber` fmt + `EnvFilter`   |
//! | Web      | `tracing-wasm` + console panic hook      |
//!
//! Natively `RUST_LOG` wins over the built-in filter.

use once_cell::sync::OnceCell;

/// Filter used natively when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,offline_files_core=debug";

/// Filter used natively in verbose mode when `RUST_LOG` is unset
pub const VERBOSE_FILTER: &str = "debug";

static INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. Returns `false` if this already ran.
///
/// `verbose` (or the `verbose-logging` feature) lowers the default level.
pub fn init(verbose: bool) -> bool {
    let mut installed = false;
    INIT.get_or_init(|| {
        install(verbose || cfg!(feature = "verbose-logging"));
        installed = true;
    });
    installed
}

/// Check if [`init`] has run
pub fn is_initialized() -> bool {
    INIT.get().is_some()
}

#[cfg(not(target_arch = "wasm32"))]
fn install(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .try_init();

    // A host (or test harness) may have installed a subscriber already
    if result.is_ok() {
        tracing::info!("Offline Files Core v{} logging ready", crate::version());
    }
}

#[cfg(target_arch = "wasm32")]
fn install(verbose: bool) {
    console_error_panic_hook::set_once();

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );
    tracing::info!("Offline Files Core v{} logging ready", crate::version());
}
