mod binding_tests;
mod isolation_tests;
mod lifecycle_tests;
