/*!
 * Core delivery pipeline: durable progress, retry policy and the loop tying
 * source, sink and checkpoint together
 */

pub mod delivery;
pub mod progress;
pub mod retry;

pub use delivery::{DeliveryLoop, DeliveryOutcome, DeliverySettings};
pub use progress::{inspect, Progress, ProgressSnapshot, StoredCheckpoint};
pub use retry::{Retry, RetryPolicy};
