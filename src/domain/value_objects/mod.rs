pub mod branch_name;
pub mod credentials;
pub mod permission;
pub mod presence;
pub mod restriction;
