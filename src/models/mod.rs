mod account;
mod device;
mod session;

pub use account::{Account, ActivationState};
pub use device::Device;
pub use session::Session;
