//! Authentication and authorization for timewarden
//!
//! Provides:
//! - JWT token validation (tokens are issued by the workspace's session service)
//! - Role levels for route authorization

pub mod jwt;
pub mod roles;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
pub use roles::{required_role, Role};
