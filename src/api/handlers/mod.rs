pub mod google;
pub mod health;
