pub mod emails;
pub mod projects;
pub mod rotations;
pub mod users;
