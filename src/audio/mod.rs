#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod recorder;
pub mod session;
pub mod sniffer;
pub mod wav;
