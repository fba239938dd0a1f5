pub mod aging;
pub mod breakdown;
pub mod enums;
pub mod lot;
pub mod mixing;
pub mod offline;
pub mod production;
pub mod qa;
pub mod recall;
pub mod reference;
pub mod reports;
pub mod reservation;
pub mod rework;
pub mod receiving;
pub mod sale;
