//! Plan provisioning: request validation, the transactional store seam and
//! the coordinator that writes a whole plan graph or nothing.

pub mod plan;
