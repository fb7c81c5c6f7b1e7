// Adapters layer: concrete implementations of the domain ports.

pub mod runner;

pub use runner::{RecordedCommand, RecordingRunner, ShellRunner};
