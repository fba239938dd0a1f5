pub mod aging;
pub mod breakdown;
pub mod mixing;
pub mod offline;
pub mod qa;
pub mod recall;
pub mod receiving;
pub mod reports;
pub mod reservations;
pub mod rework;
pub mod sales;
