//! Recording mock gateways for tests.
//!
//! Each mock journals the calls it receives behind an async lock so tests
//! can assert on counts and arguments after driving the code under test.

mod mock_opener;
mod mock_player;
mod mock_transport;
mod mock_verification;

pub use mock_opener::MockOpener;
pub use mock_player::{MockPlayer, PlayerCommand};
pub use mock_transport::{Attempt, MockTransport};
pub use mock_verification::{MockVerification, VerificationCall};
