//! Companies and their users. Only the slice the invitation workflow provisions
//! and the pre-alert workflow checks ownership against.

pub mod domain;
pub mod repository;

pub use domain::{Company, NewCompany, User, UserId, UserRole};
pub use repository::{CompanyRepository, UserRepository};
