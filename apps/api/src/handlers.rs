pub mod codes;
pub mod entries;
pub mod health;
pub mod mail;
pub mod principals;
pub mod secrets;
