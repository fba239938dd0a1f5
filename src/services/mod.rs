pub mod aging_service;
pub mod availability_service;
pub mod breakdown_service;
pub mod lot_code_service;
pub mod mixing_service;
pub mod offline_service;
pub mod qa_service;
pub mod recall_service;
pub mod receiving_service;
pub mod reports_service;
pub mod reservation_service;
pub mod rework_service;
pub mod sales_service;
pub mod traceability_service;
