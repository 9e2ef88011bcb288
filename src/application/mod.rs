//! Task orchestration: the reconciler, the service wrapping the REST API, and one use
//! case per task.

pub mod reconciler;
pub mod services;
pub mod use_cases;
