/// API route handlers
///
/// This module contains the public boundary, organized by resource:
///
/// - `health`: Health check endpoint
/// - `session`: Session cookie authentication
/// - `me`: Current-user endpoints and logout
/// - `admin`: System index views for administrators

pub mod admin;
pub mod health;
pub mod me;
pub mod session;
