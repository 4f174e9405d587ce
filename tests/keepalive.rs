use std::{cell::Cell, rc::Rc};

use leptos_promo::{
    config::KeepAliveConfig,
    dom::{Dom, MemoryDom, NodeId},
    keepalive::{KeepAlive, Kept},
    registry::{ComponentRegistry, PROMO_CTA_TAG},
};

fn hosts(dom: &MemoryDom) -> (NodeId, NodeId) {
    let body = dom.body().unwrap();
    let a = dom.create_element("section");
    let b = dom.create_element("section");
    dom.append_child(&body, &a);
    dom.append_child(&body, &b);
    (a, b)
}

fn button(populated: Rc<Cell<usize>>) -> impl FnOnce(&MemoryDom, &NodeId) {
    move |dom: &MemoryDom, container: &NodeId| {
        populated.set(populated.get() + 1);
        let button = dom.create_element("button");
        dom.set_text(&button, "Buy now");
        dom.append_child(container, &button);
    }
}

#[test]
fn slot_moves_between_hosts_without_rebuilding() {
    let dom = MemoryDom::new();
    let (a, b) = hosts(&dom);
    let cache = KeepAlive::new(dom.clone());
    let populated = Rc::new(Cell::new(0));

    let Kept::Slot(slot) = cache.acquire_or_create("cta", button(populated.clone())) else {
        panic!("document available");
    };
    let content = slot.content().unwrap();
    let rendered = dom.children(&content);
    slot.mount(&a);
    assert_eq!(dom.parent(&content), Some(a));

    slot.unmount(&a);
    let root = cache.root().unwrap();
    assert_eq!(dom.parent(&content), Some(root));
    assert!(dom.is_connected(&content));

    let kept = cache.acquire_or_create("cta", button(populated.clone()));
    let slot = kept.slot().unwrap();
    slot.mount(&b);
    assert_eq!(slot.content(), Some(content));
    assert_eq!(dom.parent(&content), Some(b));
    assert_eq!(dom.children(&content), rendered);
    assert_eq!(populated.get(), 1);
}

#[test]
fn hidden_root_is_created_once() {
    let dom = MemoryDom::new();
    let body = dom.body().unwrap();
    let cache = KeepAlive::new(dom.clone());
    assert_eq!(cache.root(), None);

    cache.acquire_or_create("cta", |_: &MemoryDom, _: &NodeId| ());
    cache.acquire_or_create("banner", |_: &MemoryDom, _: &NodeId| ());
    let root = cache.root().unwrap();
    assert_eq!(dom.children(&body), vec![root]);
    assert_eq!(dom.attribute(&root, "id").as_deref(), Some("__keepalive__"));
    assert_eq!(dom.attribute(&root, "style").as_deref(), Some("display:none"));
    assert_eq!(dom.children(&root).len(), 2);
}

#[test]
fn root_id_is_configurable() {
    let dom = MemoryDom::new();
    let config = KeepAliveConfig {
        root_id: "kept".to_string(),
    };
    let cache = KeepAlive::with_config(Some(dom.clone()), &config);
    cache.acquire_or_create("cta", |_: &MemoryDom, _: &NodeId| ());
    let root = cache.root().unwrap();
    assert_eq!(dom.attribute(&root, "id").as_deref(), Some("kept"));
}

#[test]
fn stale_unmount_leaves_new_host_alone() {
    let dom = MemoryDom::new();
    let (a, b) = hosts(&dom);
    let cache = KeepAlive::new(dom.clone());
    let kept = cache.acquire_or_create("cta", button(Rc::new(Cell::new(0))));
    let slot = kept.slot().unwrap();

    slot.mount(&a);
    // the new view mounts before the old one is cleaned up
    slot.mount(&b);
    slot.unmount(&a);
    let content = slot.content().unwrap();
    assert_eq!(dom.parent(&content), Some(b));
    assert_eq!(cache.host_of("cta"), Some(b));
}

#[test]
fn release_from_a_former_host_keeps_the_slot() {
    let dom = MemoryDom::new();
    let (a, b) = hosts(&dom);
    let cache = KeepAlive::new(dom.clone());
    let kept = cache.acquire_or_create("cta", button(Rc::new(Cell::new(0))));
    let slot = kept.slot().unwrap();
    let content = slot.content().unwrap();

    slot.mount(&a);
    slot.mount(&b);
    assert!(!cache.release_from("cta", &a));
    assert_eq!(dom.parent(&content), Some(b));
    assert!(dom.children(&a).is_empty());

    assert!(cache.release_from("cta", &b));
    assert_eq!(dom.parent(&content), cache.root());
    assert_eq!(cache.host_of("cta"), None);
    // nothing left to release
    assert!(!cache.release_from("cta", &b));
    assert!(!cache.release_from("banner", &b));
}

#[test]
fn without_document_content_renders_inline() {
    let cache = KeepAlive::<MemoryDom>::unavailable();
    assert!(!cache.is_available());
    let populated = Rc::new(Cell::new(0));

    let kept = cache.acquire_or_create("cta", button(populated.clone()));
    assert!(kept.slot().is_none());
    let render = kept.into_inline().expect("handed back");

    let dom = MemoryDom::new();
    let host = dom.create_element("div");
    render(&dom, &host);
    assert_eq!(populated.get(), 1);
    assert_eq!(dom.children(&host).len(), 1);
    assert!(!cache.contains("cta"));
}

#[test]
fn destroy_and_teardown() {
    let dom = MemoryDom::new();
    let (a, _) = hosts(&dom);
    let cache = KeepAlive::new(dom.clone());
    let populated = Rc::new(Cell::new(0));

    let kept = cache.acquire_or_create("cta", button(populated.clone()));
    let first = kept.slot().unwrap().content().unwrap();
    kept.slot().unwrap().mount(&a);
    cache.destroy("cta");
    assert!(!cache.contains("cta"));
    assert!(dom.children(&a).is_empty());
    assert!(!dom.is_connected(&first));

    let kept = cache.acquire_or_create("cta", button(populated.clone()));
    assert_ne!(kept.slot().unwrap().content(), Some(first));
    assert_eq!(populated.get(), 2);

    let root = cache.root().unwrap();
    cache.teardown();
    assert!(!dom.is_connected(&root));
    assert_eq!(cache.root(), None);
    assert!(!cache.contains("cta"));
}

#[test]
fn keeps_registry_rendered_call_to_action() {
    let dom = MemoryDom::new();
    let (a, b) = hosts(&dom);
    let cache = KeepAlive::new(dom.clone());
    let registry = ComponentRegistry::with_defaults();

    let build = |dom: &MemoryDom, container: &NodeId| {
        let cta = registry.create(dom, PROMO_CTA_TAG, &[("data-cta", "Grab it")]);
        dom.append_child(container, &cta);
    };
    let Kept::Slot(slot) = cache.acquire_or_create("cta", build) else {
        panic!("document available");
    };
    slot.mount(&a);
    slot.mount(&b);

    let content = slot.content().unwrap();
    let cta = dom.children(&content)[0];
    let shadow = dom.shadow_root(&cta).expect("upgraded");
    let label = dom
        .children(&shadow)
        .into_iter()
        .find(|node| dom.tag_name(node) == "button")
        .map(|node| dom.text(&node));
    assert_eq!(label.as_deref(), Some("Grab it"));
    assert_eq!(dom.parent(&content), Some(b));
}
