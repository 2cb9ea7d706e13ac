//! Tracing setup for hosts embedding the board.

/// Install a `tracing-subscriber` fmt subscriber.
///
/// Safe to call more than once; later calls leave the installed subscriber alone.
pub fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt().try_init() {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
