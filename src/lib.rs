// Library surface for the binary and for headless integration tests.
pub mod app_dirs;
pub mod config;
pub mod cue;
pub mod error;
pub mod logging;
pub mod mixer;
pub mod phase;
pub mod playback;
pub mod runtime;
pub mod session;
pub mod store;
pub mod tone;
pub mod ui;
