pub mod callback;
pub mod csv;
