// Test modules for all components
pub mod support;
