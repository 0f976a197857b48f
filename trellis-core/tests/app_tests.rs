use std::sync::Mutex;
use trellis_core::{
    into_service, App, DelegateArgs, Error, Handler, HttpRequest, HttpResponse, Injected,
    ResolvedArgs,
};

#[tokio::test]
async fn test_four_step_lifecycle() {
    // construct
    let app = App::new();

    // register
    app.constant("greeting", "hello".to_string()).unwrap();
    app.factory("shout", ["greeting"], |args| {
        let greeting = args.arg::<String>(0)?;
        Ok(into_service(greeting.to_uppercase()))
    })
    .unwrap();
    app.get(
        "/shout",
        Handler::injected(["shout"], |args| {
            let shout = args.arg::<String>(0)?;
            Ok(HttpResponse::ok().with_text(shout.as_str()))
        }),
    )
    .unwrap();

    // boot
    app.boot().unwrap();

    // handle
    let res = app.try_handle(HttpRequest::get("/shout")).await.unwrap();
    assert_eq!(res.body_text(), "HELLO");
}

#[tokio::test]
async fn test_handle_before_boot_fails() {
    let app = App::new();
    app.get("/", Handler::from_fn(|_| async { Ok(HttpResponse::ok()) }))
        .unwrap();

    assert!(matches!(
        app.try_handle(HttpRequest::get("/")).await,
        Err(Error::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_route_registration_after_boot_fails() {
    let app = App::new();
    app.boot().unwrap();

    assert!(matches!(
        app.get("/late", Handler::from_fn(|_| async { Ok(HttpResponse::ok()) })),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn test_router_delegates_are_registered() {
    let app = App::new();

    match app.delegate("bogus", DelegateArgs::new()) {
        Err(Error::UnknownDelegate { known, .. }) => {
            for delegate in [
                "get", "post", "put", "patch", "delete", "any", "request", "context", "before",
                "after", "otherwise", "error",
            ] {
                assert!(known.contains(&delegate.to_string()), "missing {delegate}");
            }
        }
        other => panic!("expected unknown delegate error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_raw_delegate_registers_a_route() {
    let app = App::new();
    app.delegate(
        "get",
        DelegateArgs::new()
            .with_str("/raw")
            .with_handler(Handler::from_fn(|_| async {
                Ok(HttpResponse::ok().with_text("raw delegate"))
            })),
    )
    .unwrap();
    app.boot().unwrap();

    let res = app.try_handle(HttpRequest::get("/raw")).await.unwrap();
    assert_eq!(res.body_text(), "raw delegate");
}

#[tokio::test]
async fn test_config_closures_run_before_requests() {
    let app = App::new();
    app.constant("visits", Mutex::new(Vec::<String>::new()))
        .unwrap();
    app.config(Injected::new(["visits"], |args: ResolvedArgs| {
        let visits = args.arg::<Mutex<Vec<String>>>(0)?;
        visits.lock().unwrap().push("configured".to_string());
        Ok(())
    }))
    .unwrap();
    app.get(
        "/visits",
        Handler::injected(["visits"], |args| {
            let visits = args.arg::<Mutex<Vec<String>>>(0)?;
            Ok(HttpResponse::ok().with_text(visits.lock().unwrap().join(",")))
        }),
    )
    .unwrap();
    app.boot().unwrap();

    let res = app.try_handle(HttpRequest::get("/visits")).await.unwrap();
    assert_eq!(res.body_text(), "configured");
}

#[tokio::test]
async fn test_handle_maps_unrecovered_errors_to_500() {
    let app = App::new();
    app.get(
        "/explode",
        Handler::from_fn(|_| async { Err(Error::Handler("boom".into())) }),
    )
    .unwrap();
    app.boot().unwrap();

    let res = app.handle(HttpRequest::get("/explode")).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.body_text(), "Internal server error");

    // Unmatched requests go the same way when nothing else catches them.
    let res = app.handle(HttpRequest::get("/missing")).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.body_text(), "Internal server error");
}

#[tokio::test]
async fn test_container_is_reachable_from_the_app() {
    let app = App::new();
    app.constant("answer", 42usize).unwrap();
    app.boot().unwrap();

    assert!(app.container().has("Router"));
    assert_eq!(*app.container().get_as::<usize>("answer").unwrap(), 42);
}

#[tokio::test]
async fn test_shared_service_state_across_requests() {
    let app = App::new();
    app.constant("counter", Mutex::new(0usize)).unwrap();
    app.post(
        "/bump",
        Handler::injected(["counter"], |args| {
            let counter = args.arg::<Mutex<usize>>(0)?;
            let mut value = counter.lock().unwrap();
            *value += 1;
            Ok(HttpResponse::ok().with_text(value.to_string()))
        }),
    )
    .unwrap();
    app.boot().unwrap();

    let first = app.try_handle(HttpRequest::post("/bump")).await.unwrap();
    let second = app.try_handle(HttpRequest::post("/bump")).await.unwrap();
    assert_eq!(first.body_text(), "1");
    assert_eq!(second.body_text(), "2");
}
