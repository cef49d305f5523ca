/// Redis integration
///
/// - `client`: shared connection with health checks
/// - `session`: session keys with TTL
/// - `stream_writer`: account event stream publisher
///
/// ```text
/// login  ──SET EX──> session:{account_id}
/// logout ──DEL────> session:{account_id}
/// events ──XADD───> events:accounts
/// ```

pub mod client;
pub mod session;
pub mod stream_writer;

pub use client::{RedisClient, RedisClientError, RedisConfig};
pub use session::RedisSessionStore;
pub use stream_writer::{StreamWriter, StreamWriterConfig};
