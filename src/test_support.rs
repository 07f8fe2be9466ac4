//! Test-only helpers shared by colocated unit tests. Not compiled into the real binary.

use rocket::local::blocking::Client;

use crate::config::Config;

/// Builds a tracked test client around a fresh Rocket instance for `config`. Each call
/// gets entirely fresh in-memory state (no shared registry/hub across tests).
pub fn test_client(config: Config) -> Client {
    let rocket = crate::build_rocket(config);
    Client::tracked(rocket).expect("valid rocket instance")
}
