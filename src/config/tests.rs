use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.database.url, None);
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.listing.page_size, 10);
    assert_eq!(settings.listing.related_limit, 3);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.listing.page_size = Some(20);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        listing_page_size: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.listing.page_size, 5);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn page_size_is_clamped_into_range() {
    let mut raw = RawSettings::default();
    raw.listing.page_size = Some(0);
    let settings = Settings::from_raw(raw.clone()).expect("valid settings");
    assert_eq!(settings.listing.page_size, 1);

    raw.listing.page_size = Some(10_000);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.listing.page_size, MAX_PAGE_SIZE);
}

#[test]
fn invalid_values_name_the_offending_key() {
    let mut raw = RawSettings::default();
    raw.database.max_connections = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero pool size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "database.max_connections",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());
    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(err, LoadError::Invalid { key: "logging.level", .. }));

    let mut raw = RawSettings::default();
    raw.server.host = Some("not a host".to_string());
    let err = Settings::from_raw(raw).expect_err("bad host");
    assert!(matches!(err, LoadError::Invalid { key: "server.host", .. }));
}

#[test]
fn blank_database_url_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.require_url().is_err());
}

#[test]
fn config_file_values_are_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lectern-test.toml");
    std::fs::write(
        &path,
        "[listing]\npage_size = 25\nrelated_limit = 0\n\n[database]\nurl = \"postgres://localhost/lectern\"\n",
    )
    .expect("write config");

    let args = CliArgs {
        config_file: Some(path),
        command: None,
    };
    let settings = load(&args).expect("settings load");

    assert_eq!(settings.listing.page_size, 25);
    assert_eq!(settings.listing.related_limit, 0);
    assert_eq!(
        settings.database.require_url().expect("url"),
        "postgres://localhost/lectern"
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["lectern"]);
    assert!(args.command.is_none());
    assert!(args.config_file.is_none());
}

#[test]
fn parse_import_arguments() {
    let args = CliArgs::parse_from([
        "lectern",
        "import",
        "--database-url",
        "postgres://example",
        "content.toml",
    ]);

    match args.command.expect("import command") {
        Command::Import(import) => {
            assert_eq!(import.file, PathBuf::from("content.toml"));
            assert_eq!(
                import.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "lectern",
        "serve",
        "--server-port",
        "8080",
        "--log-json",
        "true",
        "--listing-related-limit",
        "5",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_port, Some(8080));
            assert_eq!(serve.overrides.log_json, Some(true));
            assert_eq!(serve.overrides.listing_related_limit, Some(5));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
