pub mod bookings;
pub mod contact;
pub mod dashboard;
pub mod destination;
pub mod package;
pub mod photo;
pub mod user;
