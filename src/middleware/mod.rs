//! Ambient HTTP middleware. Authenticated session handling, the admin login
//! form, and OAuth token refresh are explicit non-goals (§1) — this service
//! trusts an already-authenticated caller identity handed to it by whatever
//! upstream layer terminates the session (a reverse proxy or gateway).

pub mod actor;
