use serde_json::json;
use trellis_config::{ConfigError, Options, OptionsExt, OptionsProvider};
use trellis_core::{into_service, App, Container, Handler, HttpRequest, HttpResponse};

#[test]
fn test_later_options_override_earlier_scalars() {
    let mut options = Options::from_value(json!({
        "session": {"auto_start": true, "name": "sid"},
        "debug": false,
    }))
    .unwrap();

    options.merge(Options::from_value(json!({"session": {"auto_start": false}})).unwrap());

    assert_eq!(options.get("session.auto_start").unwrap(), json!(false));
    assert_eq!(options.get("session.name").unwrap(), json!("sid"));
    assert_eq!(options.get("debug").unwrap(), json!(false));
}

#[test]
fn test_lists_union_instead_of_replacing() {
    let mut options = Options::from_value(json!({"hosts": ["a", "b"]})).unwrap();
    options.merge(Options::from_value(json!({"hosts": ["b", "c"]})).unwrap());
    assert_eq!(options.get("hosts").unwrap(), json!(["a", "b", "c"]));
}

#[test]
fn test_unknown_path_is_an_error() {
    let options = Options::from_value(json!({"a": 1})).unwrap();
    assert!(matches!(
        options.get("a.b.c"),
        Err(ConfigError::UnknownPath(path)) if path == "a.b.c"
    ));
    assert_eq!(options.get_or("a.b.c", json!("fallback")), json!("fallback"));
}

#[test]
fn test_load_json_file() {
    let path = std::env::temp_dir().join("trellis_options_test.json");
    std::fs::write(&path, r#"{"server": {"port": 8080}}"#).unwrap();

    let options = Options::from_file(&path).unwrap();
    assert_eq!(options.get_as::<u16>("server.port").unwrap(), 8080);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_load_toml_file() {
    let path = std::env::temp_dir().join("trellis_options_test.toml");
    std::fs::write(&path, "[server]\nport = 8080\nname = \"trellis\"\n").unwrap();

    let options = Options::from_file(&path).unwrap();
    assert_eq!(options.get_as::<u16>("server.port").unwrap(), 8080);
    assert_eq!(options.get("server.name").unwrap(), json!("trellis"));

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_unknown_extension_is_rejected() {
    let path = std::env::temp_dir().join("trellis_options_test.yaml");
    std::fs::write(&path, "key: value\n").unwrap();

    assert!(matches!(
        Options::from_file(&path),
        Err(ConfigError::UnknownExtension(ext)) if ext == "yaml"
    ));

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_provider_freezes_merged_options_into_the_container() {
    let container = Container::new();
    container
        .provider("Options", OptionsProvider::default())
        .unwrap();

    // Factories downstream of "Options" see the merged tree.
    container
        .factory("SessionAutoStart", ["Options"], |args| {
            let options = args.arg::<Options>(0)?;
            let auto_start = options.get_or("session.auto_start", json!(true));
            Ok(into_service(auto_start == json!(true)))
        })
        .unwrap();

    let provider = container.get_as::<OptionsProvider>("OptionsProvider").unwrap();
    provider.add(Options::from_value(json!({"session": {"auto_start": true}})).unwrap());
    provider.add(Options::from_value(json!({"session": {"auto_start": false}})).unwrap());

    container.boot().unwrap();
    assert!(!*container.get_as::<bool>("SessionAutoStart").unwrap());
}

#[tokio::test]
async fn test_app_options_sugar() {
    let app = App::new();
    app.options(Options::from_value(json!({"greeting": "hello", "shout": false})).unwrap())
        .unwrap();
    app.options(Options::from_value(json!({"shout": true})).unwrap())
        .unwrap();

    app.get(
        "/greet",
        Handler::injected(["Options"], |args| {
            let options = args.arg::<Options>(0)?;
            let mut greeting: String = options.get_as("greeting")?;
            if options.get_as("shout")? {
                greeting = greeting.to_uppercase();
            }
            Ok(HttpResponse::ok().with_text(greeting))
        }),
    )
    .unwrap();
    app.boot().unwrap();

    let res = app.try_handle(HttpRequest::get("/greet")).await.unwrap();
    assert_eq!(res.body_text(), "HELLO");
}

#[test]
fn test_options_sugar_registers_the_provider_once() {
    let app = App::new();
    app.options(Options::from_value(json!({"a": 1})).unwrap())
        .unwrap();
    app.options(Options::from_value(json!({"b": 2})).unwrap())
        .unwrap();

    assert!(app.container().has("Options"));
    assert!(app.container().has("OptionsProvider"));

    app.boot().unwrap();
    let options = app.container().get_as::<Options>("Options").unwrap();
    assert_eq!(options.get("a").unwrap(), json!(1));
    assert_eq!(options.get("b").unwrap(), json!(2));
}
