pub mod jwt;
pub mod password;

pub use jwt::{AuthUser, JwtKeys};
pub use password::{hash_password, verify_password};
