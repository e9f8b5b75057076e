use std::io::Write;
use whatsapp_manager::config::Config;
use whatsapp_manager::sync::SyncSettings;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults_without_file() {
    let config = Config::load_from(None).unwrap();

    assert_eq!(config.server_port, 5000);
    assert_eq!(config.clients_page_size, 10);
    assert_eq!(config.refresh_interval_secs, 30);
    assert!(!config.is_production());
    assert!(config.cors_enabled);
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
server_port = 8080
environment = "production"
static_dir = "/srv/dashboard"
gateway_url = "https://project.example.co"
gateway_anon_key = "anon-key"
clients_page_size = 25
refresh_interval_secs = 10
"#,
    );

    let config = Config::load_from(Some(file.path())).unwrap();
    assert_eq!(config.server_port, 8080);
    assert!(config.is_production());
    assert_eq!(config.static_dir, "/srv/dashboard");
    assert_eq!(config.gateway_anon_key, "anon-key");

    let settings = SyncSettings::from(&config);
    assert_eq!(settings.page_size, 25);
    assert_eq!(settings.refresh_interval.as_secs(), 10);
}

#[test]
fn test_missing_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(Some(&dir.path().join("absent"))).unwrap();
    assert_eq!(config.server_port, 5000);
}

#[test]
fn test_zero_page_size_rejected() {
    let file = write_config("clients_page_size = 0\n");
    assert!(Config::load_from(Some(file.path())).is_err());
}

#[test]
fn test_privileged_port_rejected() {
    let file = write_config("server_port = 80\n");
    assert!(Config::load_from(Some(file.path())).is_err());
}

#[test]
fn test_invalid_gateway_url_rejected() {
    let file = write_config("gateway_url = \"not a url\"\n");
    assert!(Config::load_from(Some(file.path())).is_err());
}

#[test]
fn test_log_filter_uses_level() {
    let file = write_config("log_level = \"debug\"\n");
    let config = Config::load_from(Some(file.path())).unwrap();
    assert!(config.log_filter().contains("whatsapp_manager=debug"));
}
