//! Session token issuance/validation and the request authorization gate.
//! Keep the public surface thin and split implementation across sub-modules.

mod gate;
mod session;

pub use gate::AuthorizationGate;
pub use session::{SessionClaims, Sessions};
