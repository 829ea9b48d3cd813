pub mod accounts;
pub mod invitations;
pub mod packages;
pub mod prealerts;
