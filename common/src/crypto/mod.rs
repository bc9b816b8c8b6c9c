mod ed25519;
mod hash;

pub use ed25519::*;
pub use hash::*;
