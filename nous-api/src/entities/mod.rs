// Public entities for the NOUS API
// This module contains data structures that cross the HTTP boundary

// Chat, batch, usage and provider payloads
pub mod ai;

// Common entities for error handling
pub mod common;
