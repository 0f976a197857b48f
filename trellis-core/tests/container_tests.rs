use std::sync::{Arc, Mutex};
use trellis_core::{
    into_service, Container, Delegate, DelegateArgs, Error, FactoryRecipe, Injected, ResolvedArgs,
    ServiceProvider,
};

#[test]
fn test_register_and_resolve_constant() {
    let container = Container::new();
    container.constant("greeting", "hello".to_string()).unwrap();

    let greeting = container.get_as::<String>("greeting").unwrap();
    assert_eq!(*greeting, "hello");
}

#[test]
fn test_resolve_unknown_service() {
    let container = Container::new();
    let result = container.get("missing");
    assert!(matches!(result, Err(Error::UnknownService(name)) if name == "missing"));
}

#[test]
fn test_factory_with_dependencies() {
    let container = Container::new();
    container.constant("base", 21usize).unwrap();
    container
        .factory("doubled", ["base"], |args| {
            let base = args.arg::<usize>(0)?;
            Ok(into_service(*base * 2))
        })
        .unwrap();

    assert_eq!(*container.get_as::<usize>("doubled").unwrap(), 42);
}

#[test]
fn test_factory_is_lazy_and_singleton() {
    let container = Container::new();
    let builds = Arc::new(Mutex::new(0));

    let counter = builds.clone();
    container
        .factory("expensive", Vec::<String>::new(), move |_args| {
            *counter.lock().unwrap() += 1;
            Ok(into_service("built".to_string()))
        })
        .unwrap();

    container.boot().unwrap();
    assert_eq!(*builds.lock().unwrap(), 0, "boot must not force lazy services");

    let first = container.get("expensive").unwrap();
    let second = container.get("expensive").unwrap();
    assert_eq!(*builds.lock().unwrap(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_resolve_many() {
    let container = Container::new();
    container.constant("a", 1usize).unwrap();
    container.constant("b", 2usize).unwrap();

    let values = container.resolve(&["a", "b"]).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(*values[1].clone().downcast::<usize>().unwrap(), 2);
}

#[test]
fn test_circular_dependency_names_the_chain() {
    let container = Container::new();
    container
        .factory("A", ["B"], |args| Ok(args.raw(0).unwrap().clone()))
        .unwrap();
    container
        .factory("B", ["A"], |args| Ok(args.raw(0).unwrap().clone()))
        .unwrap();

    match container.get("A") {
        Err(Error::CircularDependency { chain }) => {
            assert_eq!(chain, vec!["A", "B", "A"]);
        }
        other => panic!("expected circular dependency error, got {other:?}"),
    }
}

#[test]
fn test_duplicate_names_are_rejected() {
    let container = Container::new();
    container.constant("once", 1usize).unwrap();
    assert!(matches!(
        container.constant("once", 2usize),
        Err(Error::DuplicateName(_))
    ));

    // Values may be re-registered, but only by another value.
    container.value("mutable", 1usize).unwrap();
    container.value("mutable", 2usize).unwrap();
    assert_eq!(*container.get_as::<usize>("mutable").unwrap(), 2);
    assert!(matches!(
        container.constant("mutable", 3usize),
        Err(Error::DuplicateName(_))
    ));
}

#[test]
fn test_registration_after_boot_fails() {
    let container = Container::new();
    container.boot().unwrap();

    assert!(matches!(
        container.constant("late", 1usize),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        container.value("late", 1usize),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        container.factory("late", Vec::<String>::new(), |_| Ok(into_service(0usize))),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        container.config(Injected::new(Vec::<String>::new(), |_| Ok(()))),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        container.delegate("anything", DelegateArgs::new()),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn test_double_boot_fails() {
    let container = Container::new();
    container.boot().unwrap();
    assert!(matches!(container.boot(), Err(Error::IllegalState(_))));
}

#[test]
fn test_config_closures_run_in_order_at_boot() {
    let container = Container::new();
    container
        .constant("log", Mutex::new(Vec::<String>::new()))
        .unwrap();

    for step in ["first", "second", "third"] {
        container
            .config(Injected::new(["log"], move |args: ResolvedArgs| {
                let log = args.arg::<Mutex<Vec<String>>>(0)?;
                log.lock().unwrap().push(step.to_string());
                Ok(())
            }))
            .unwrap();
    }

    container.boot().unwrap();

    let log = container.get_as::<Mutex<Vec<String>>>("log").unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

struct CalcProvider {
    marks: Arc<Mutex<Vec<String>>>,
}

impl ServiceProvider for CalcProvider {
    fn factory(&self) -> FactoryRecipe {
        FactoryRecipe::new(["base"], |args| {
            let base = args.arg::<usize>(0)?;
            Ok(into_service(*base + 1))
        })
    }

    fn delegates(&self) -> Vec<Delegate> {
        let marks = self.marks.clone();
        vec![Delegate::new("mark", move |args: DelegateArgs| {
            marks.lock().unwrap().push(args.str_at(0)?);
            Ok(())
        })]
    }
}

#[test]
fn test_provider_backed_service() {
    let container = Container::new();
    container.constant("base", 41usize).unwrap();
    container
        .provider(
            "Calc",
            CalcProvider {
                marks: Arc::new(Mutex::new(Vec::new())),
            },
        )
        .unwrap();

    container.boot().unwrap();
    assert_eq!(*container.get_as::<usize>("Calc").unwrap(), 42);
}

#[test]
fn test_provider_object_is_reachable_from_config() {
    let container = Container::new();
    container.constant("base", 1usize).unwrap();

    let marks = Arc::new(Mutex::new(Vec::new()));
    container
        .provider("Calc", CalcProvider { marks: marks.clone() })
        .unwrap();

    // Config closures can reach the provider object itself.
    container
        .config(Injected::new(["CalcProvider"], |args: ResolvedArgs| {
            let provider = args.arg::<CalcProvider>(0)?;
            provider.marks.lock().unwrap().push("configured".to_string());
            Ok(())
        }))
        .unwrap();

    container.boot().unwrap();
    assert_eq!(*marks.lock().unwrap(), vec!["configured"]);
}

#[test]
fn test_delegate_calls_queue_until_boot() {
    let container = Container::new();
    container.constant("base", 1usize).unwrap();

    let marks = Arc::new(Mutex::new(Vec::new()));
    container
        .provider("Calc", CalcProvider { marks: marks.clone() })
        .unwrap();

    container
        .delegate("mark", DelegateArgs::new().with_str("first"))
        .unwrap();
    container
        .delegate("mark", DelegateArgs::new().with_str("second"))
        .unwrap();
    assert!(marks.lock().unwrap().is_empty(), "delegates run at boot");

    container.boot().unwrap();
    assert_eq!(*marks.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn test_unknown_delegate_lists_known_names() {
    let container = Container::new();
    container.constant("base", 1usize).unwrap();
    container
        .provider(
            "Calc",
            CalcProvider {
                marks: Arc::new(Mutex::new(Vec::new())),
            },
        )
        .unwrap();

    match container.delegate("nope", DelegateArgs::new()) {
        Err(Error::UnknownDelegate { name, known }) => {
            assert_eq!(name, "nope");
            assert_eq!(known, vec!["mark"]);
        }
        other => panic!("expected unknown delegate error, got {other:?}"),
    }
}

#[test]
fn test_import_merges_definitions() {
    let first = Container::new();
    first.constant("hello", "world".to_string()).unwrap();
    first.value("foo", "bar".to_string()).unwrap();

    let second = Container::new();
    second.constant("hello2", "world2".to_string()).unwrap();

    let container = Container::new();
    container.import(&first).unwrap();
    container.import(&second).unwrap();
    container.boot().unwrap();

    assert_eq!(*container.get_as::<String>("hello").unwrap(), "world");
    assert_eq!(*container.get_as::<String>("foo").unwrap(), "bar");
    assert_eq!(*container.get_as::<String>("hello2").unwrap(), "world2");
}

#[test]
fn test_import_conflict_fails() {
    let first = Container::new();
    first.constant("hello", 1usize).unwrap();

    let container = Container::new();
    container.constant("hello", 2usize).unwrap();
    assert!(matches!(
        container.import(&first),
        Err(Error::DuplicateName(_))
    ));
}

#[test]
fn test_build_error_propagates() {
    let container = Container::new();
    container
        .factory("broken", Vec::<String>::new(), |_| {
            Err(Error::Internal("build exploded".into()))
        })
        .unwrap();

    assert!(matches!(
        container.get("broken"),
        Err(Error::Internal(message)) if message == "build exploded"
    ));
}

#[test]
fn test_build_error_resurfaces_on_every_resolution() {
    let container = Container::new();
    container
        .factory("broken", Vec::<String>::new(), |_| {
            Err(Error::Internal("build exploded".into()))
        })
        .unwrap();

    // A failed build must not leave the record mid-build, so the same
    // error comes back instead of a phantom cycle.
    for _ in 0..2 {
        match container.get("broken") {
            Err(Error::Internal(message)) => assert_eq!(message, "build exploded"),
            other => panic!("expected the original build error, got {other:?}"),
        }
    }
}

#[test]
fn test_missing_dependency_resurfaces_on_every_resolution() {
    let container = Container::new();
    container
        .factory("needy", ["absent"], |args| Ok(args.raw(0).unwrap().clone()))
        .unwrap();

    for _ in 0..2 {
        match container.get("needy") {
            Err(Error::UnknownService(name)) => assert_eq!(name, "absent"),
            other => panic!("expected unknown service, got {other:?}"),
        }
    }
}

#[test]
fn test_cycle_error_resurfaces_on_every_resolution() {
    let container = Container::new();
    container
        .factory("A", ["B"], |args| Ok(args.raw(0).unwrap().clone()))
        .unwrap();
    container
        .factory("B", ["A"], |args| Ok(args.raw(0).unwrap().clone()))
        .unwrap();

    for _ in 0..2 {
        match container.get("A") {
            Err(Error::CircularDependency { chain }) => {
                assert_eq!(chain, vec!["A", "B", "A"]);
            }
            other => panic!("expected circular dependency error, got {other:?}"),
        }
    }
}

#[test]
fn test_service_recovers_after_transient_build_failure() {
    let container = Container::new();
    let attempts = Arc::new(Mutex::new(0));

    let counter = attempts.clone();
    container
        .factory("flaky", Vec::<String>::new(), move |_| {
            let mut attempts = counter.lock().unwrap();
            *attempts += 1;
            if *attempts == 1 {
                Err(Error::Internal("first attempt fails".into()))
            } else {
                Ok(into_service("ready".to_string()))
            }
        })
        .unwrap();

    assert!(container.get("flaky").is_err());
    assert_eq!(*container.get_as::<String>("flaky").unwrap(), "ready");
    assert_eq!(*attempts.lock().unwrap(), 2);
}

#[test]
fn test_conflicting_provider_registration_leaves_no_trace() {
    let container = Container::new();
    container.constant("Calc", 1usize).unwrap();

    let result = container.provider(
        "Calc",
        CalcProvider {
            marks: Arc::new(Mutex::new(Vec::new())),
        },
    );
    assert!(matches!(result, Err(Error::DuplicateName(name)) if name == "Calc"));

    // Neither the provider constant nor its delegates may survive the
    // failed registration.
    assert!(!container.has("CalcProvider"));
    assert!(matches!(
        container.delegate("mark", DelegateArgs::new().with_str("x")),
        Err(Error::UnknownDelegate { .. })
    ));
}
