pub mod profile;
pub mod user;

pub use profile::ProfileService;
pub use user::UserService;
