pub mod patient;
pub mod records;

pub use patient::PatientService;
pub use records::MedicalRecordService;
