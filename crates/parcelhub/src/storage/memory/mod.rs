mod accounts;
mod invitations;
mod packages;
mod prealerts;

pub use accounts::{InMemoryCompanyRepository, InMemoryUserRepository};
pub use invitations::InMemoryInvitationRepository;
pub use packages::InMemoryPackageRepository;
pub use prealerts::InMemoryPreAlertRepository;
