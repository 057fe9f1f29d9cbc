pub mod tenant;

pub use tenant::{RequireAdminTenant, RequireTenant};
