use bootstrap_signaling::config::Config;
use rocket::local::blocking::Client;

pub fn test_client(config: Config) -> Client {
    let rocket = bootstrap_signaling::build_rocket(config);
    Client::tracked(rocket).expect("valid rocket instance")
}

pub fn auth_config(secret: &str) -> Config {
    Config {
        signal_token_sha256: Some(bootstrap_signaling::auth::sha256_hex(secret)),
        ..Config::default()
    }
}
