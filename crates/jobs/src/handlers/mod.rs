//! Shipped job handlers.
//!
//! Each handler only expands settings into units and runs one unit; the
//! business logic sits behind a collaborator trait supplied by the caller.

pub mod employee_importation;
pub mod payroll;
pub mod timekeeping;

pub use employee_importation::{EmployeeImportationHandler, EmployeeImporter};
pub use payroll::{PayrollHandler, PayrollProcessor};
pub use timekeeping::{EmployeeDay, TimekeepingHandler, TimekeepingProcessor};
