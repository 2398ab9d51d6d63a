// Persisted engine state
pub mod checkpoint;
// Routines for logging
pub mod logger;
// Routines for output
pub mod output;
// Routines for settings
pub mod settings;
