pub mod assist;
pub mod relay;
