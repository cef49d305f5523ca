/// API route handlers
///
/// - `health`: Health check endpoint
/// - `drivers`: Driver account endpoints under `/api/driver`

pub mod drivers;
pub mod health;
