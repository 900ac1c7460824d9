// Domain layer - Rig data model, free of I/O
pub mod ramp;
pub mod report;
pub mod series;
pub mod session;
pub mod stats;
pub mod telemetry;
