// Application layer - Use cases orchestrating the domain over the ports
pub mod aggregator;
pub mod events;
pub mod peer_dispatch;
pub mod peer_link;
pub mod report_archive;
pub mod report_service;
pub mod session_controller;
pub mod telemetry_pipeline;
