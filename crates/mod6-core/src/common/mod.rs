pub mod bandmodel;
pub mod env;
pub mod fortran;
pub mod units;
