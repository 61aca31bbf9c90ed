//! `HookMap`: lazy per-key hooks.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tapestry_hooks::{Hook, HookKind, HookMap, HookMapInterceptor, Interceptor};
use test_utils::EventLog;

fn loaders() -> HookMap<String, (String,), String> {
    HookMap::new(|ext: &String| Hook::async_series_bail().named(format!("load.{ext}")))
}

#[tokio::test]
async fn each_key_gets_its_own_hook() {
    let map = loaders();
    map.for_key(&"json".into())
        .tap_promise("JsonLoader", |(source,)| async move { Ok(Some(format!("json({source})"))) })
        .unwrap();
    map.for_key(&"css".into())
        .tap("CssLoader", |(source,)| Ok(Some(format!("css({source})"))))
        .unwrap();

    let json = map.for_key(&"json".into());
    assert_eq!(json.kind(), HookKind::AsyncSeriesBail);
    assert_eq!(json.name().as_deref(), Some("load.json"));
    assert_eq!(
        json.call_async(("{}".into(),)).await.unwrap().as_deref(),
        Some("json({})")
    );
    assert_eq!(
        map.for_key(&"css".into()).call(("a{}".into(),)).unwrap().as_deref(),
        Some("css(a{})")
    );
    assert_eq!(map.keys(), ["json", "css"]);
}

#[test]
fn for_each_existing_visits_only_created_hooks() {
    let built = Arc::new(AtomicUsize::new(0));
    let b = Arc::clone(&built);
    let map: HookMap<u8, (u8,)> = HookMap::new(move |_| {
        b.fetch_add(1, Ordering::SeqCst);
        Hook::sync()
    });
    assert!(map.is_empty());

    map.for_key(&1);
    map.for_key(&2);
    map.for_key(&1);

    let mut visited = Vec::new();
    map.for_each_existing(|key, hook| visited.push((*key, hook.tap_count())));
    assert_eq!(visited, [(1, 0), (2, 0)]);
    assert_eq!(built.load(Ordering::SeqCst), 2);
    assert!(map.get(&3).is_none());
    assert_eq!(map.len(), 2);
}

#[test]
fn map_interceptor_decorates_every_new_hook() {
    let log = EventLog::new();
    let map: HookMap<&'static str, (u32,)> = HookMap::new(|_| Hook::sync());

    let l = log.clone();
    map.intercept(HookMapInterceptor::<&'static str, (u32,)>::new("audit").on_factory(move |key, hook| {
        let l = l.clone();
        let key = *key;
        hook.intercept(Interceptor::<(u32,)>::new("audit").on_call(move |_, (x,)| {
            l.push(format!("{key}:{x}"));
            Ok(())
        }))
        .expect("no register callback to fail");
        hook
    }));

    map.for_key(&"js").call((1,)).unwrap();
    map.for_key(&"ts").call((2,)).unwrap();
    map.for_key(&"js").call((3,)).unwrap();
    assert_eq!(log.events(), ["js:1", "ts:2", "js:3"]);
}
