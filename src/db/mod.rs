pub mod bookings;
pub mod mongo;
pub mod users;
