//! Manager approval workflow: assembling timesheets from time records,
//! reconciling tracked hours, approval transitions and week navigation.

pub mod approval;
pub mod hours;
pub mod reconcile;
pub mod week;
