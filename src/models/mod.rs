pub mod aggregate;
pub mod goal;
pub mod row;
pub mod token;
pub mod workspace;
