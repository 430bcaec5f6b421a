/*
 * Responsibility
 * - Router-level middleware: bearer verification, CORS, HTTP plumbing
 */
pub mod auth;
pub mod cors;
pub mod http;
