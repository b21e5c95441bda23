//! Time and randomness behind a trait.
//!
//! The connection state machine and the chat client never read a clock or an
//! RNG directly. Tests plug in a virtual clock and a seeded RNG; the transport
//! plugs in the system ones.

use std::{future::Future, ops::Sub, time::Duration};

/// Source of time and randomness for the client.
///
/// # Contract
///
/// - `now()` is monotonic
/// - `random_bytes()` is cryptographically secure outside tests, since
///   message nonces are drawn from it
/// - a seeded implementation yields the same bytes for the same seed
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant: `std::time::Instant` or a virtual one.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Wait for `duration`. Reconnect backoff only; protocol code never sleeps.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Milliseconds since the Unix epoch, stamped on outgoing messages.
    fn wall_clock_millis(&self) -> u64;

    /// Random `u64`, big-endian from [`Environment::random_bytes`].
    fn random_u64(&self) -> u64 {
        u64::from_be_bytes(self.random_array())
    }

    /// Random fixed-size array, e.g. an AES-GCM nonce.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}
