/// Middleware modules for the API server
///
/// - `security`: security and caching headers

pub mod security;
