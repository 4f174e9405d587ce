//! Browser implementations of the host interfaces, backed by `web-sys`.
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Element, Node, ShadowRootInit, ShadowRootMode};

use crate::{
    bus::{EventBus, COUNTDOWN_DONE},
    component::{PromoPage, PromoRuntime},
    config::{KeepAliveConfig, RuntimeConfig},
    coordinator::{FlagStore, PriceCoordinator},
    dom::Dom,
    error::{Error, Result},
    keepalive::{KeepAlive, Kept},
    pricing::ServerPricing,
    registry::{ComponentRegistry, PROMO_CTA_TAG},
    state::{PromoState, PROMO_MARKER},
    time::{Clock, SystemClock},
};

/// The page's document.
#[derive(Clone)]
pub struct BrowserDom {
    document: web_sys::Document,
}

impl BrowserDom {
    pub fn new() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self { document })
    }
}

impl Dom for BrowserDom {
    type Node = Node;

    fn create_element(&self, tag: &str) -> Node {
        match self.document.create_element(tag) {
            Ok(element) => element.into(),
            Err(error) => {
                leptos::logging::warn!("dom: cannot create <{tag}>: {error:?}");
                self.document.create_document_fragment().into()
            }
        }
    }

    fn body(&self) -> Option<Node> {
        self.document.body().map(Into::into)
    }

    fn append_child(&self, parent: &Node, child: &Node) {
        if let Err(error) = parent.append_child(child) {
            leptos::logging::warn!("dom: append failed: {error:?}");
        }
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn remove(&self, node: &Node) {
        if let Some(parent) = node.parent_node() {
            let _ = parent.remove_child(node);
        }
    }

    fn tag_name(&self, node: &Node) -> String {
        node.dyn_ref::<Element>()
            .map(Element::tag_name)
            .unwrap_or_else(|| node.node_name())
            .to_ascii_lowercase()
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn set_attribute(&self, node: &Node, name: &str, value: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            let _ = element.set_attribute(name, value);
        }
    }

    fn set_text(&self, node: &Node, text: &str) {
        node.set_text_content(Some(text));
    }

    fn attach_shadow(&self, host: &Node) -> Option<Node> {
        let init = ShadowRootInit::new(ShadowRootMode::Open);
        host.dyn_ref::<Element>()?
            .attach_shadow(&init)
            .ok()
            .map(Into::into)
    }

    fn shadow_root(&self, host: &Node) -> Option<Node> {
        host.dyn_ref::<Element>()?.shadow_root().map(Into::into)
    }

    fn on_click(&self, node: &Node, listener: Rc<dyn Fn()>) {
        let callback = Closure::<dyn Fn()>::new(move || (*listener)());
        if let Err(error) =
            node.add_event_listener_with_callback("click", callback.as_ref().unchecked_ref())
        {
            leptos::logging::warn!("dom: cannot listen for clicks: {error:?}");
        }
        // kept alive along with the node it listens on
        callback.forget();
    }
}

/// Flags from `window.localStorage`, read afresh on every access.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageFlags;

impl FlagStore for LocalStorageFlags {
    fn get(&self, key: &str) -> Option<String> {
        web_sys::window()?
            .local_storage()
            .ok()
            .flatten()?
            .get_item(key)
            .ok()
            .flatten()
    }
}

/// Read the [`PromoState`] rendered by the server into the page.
pub fn read_promo_state() -> Result<PromoState> {
    let element = web_sys::window()
        .and_then(|window| window.document())
        .and_then(|document| document.query_selector(&format!("[{PROMO_MARKER}]")).ok().flatten())
        .ok_or(Error::Handoff {
            field: PROMO_MARKER,
            value: String::new(),
        })?;
    PromoState::from_attributes(|name| element.get_attribute(name))
}

/// The document bound parts of the runtime: keep-alive slots and the
/// registry of imperatively rendered elements.
pub struct BrowserHost {
    dom: BrowserDom,
    keep_alive: KeepAlive<BrowserDom>,
    registry: ComponentRegistry<BrowserDom>,
}

impl BrowserHost {
    pub fn new(config: &KeepAliveConfig) -> Option<Self> {
        let dom = BrowserDom::new()?;
        Some(Self {
            keep_alive: KeepAlive::with_config(Some(dom.clone()), config),
            registry: ComponentRegistry::with_defaults(),
            dom,
        })
    }

    /// Provide this to the view tree.  The host is not `Send`, hence it
    /// is kept in local arena storage.
    pub fn provide(self) {
        provide_context(StoredValue::new_local(self));
    }

    pub fn keep_alive(&self) -> &KeepAlive<BrowserDom> {
        &self.keep_alive
    }

    /// Show the call to action of slot `id` inside `host`, creating it
    /// on first use.
    pub fn mount_call_to_action(&self, id: &str, label: &str, host: &Node) {
        let kept = self.keep_alive.acquire_or_create(id, |dom: &BrowserDom, container: &Node| {
            let element = self
                .registry
                .create(dom, PROMO_CTA_TAG, &[("data-cta", label)]);
            dom.append_child(container, &element);
        });
        match kept {
            Kept::Slot(slot) => slot.mount(host),
            Kept::Inline(render) => render(&self.dom, host),
        }
    }

    /// Park the call to action of slot `id` again, unless a host other
    /// than `host` has taken it over in the meantime.
    pub fn unmount_call_to_action(&self, id: &str, host: &Node) {
        if !self.keep_alive.release_from(id, host) {
            leptos::logging::log!("keep-alive: slot {id} already moved on, left in place");
        }
    }
}

/// Keep the call to action of slot `id` mounted in `host` for as long as
/// the calling component lives.
pub(crate) fn bind_call_to_action(
    id: &'static str,
    label: String,
    host: NodeRef<leptos::html::Span>,
) {
    let Some(browser) = use_context::<StoredValue<BrowserHost, LocalStorage>>() else {
        return;
    };
    // the host this view mounted into, if any
    let mounted = StoredValue::new_local(None::<Node>);
    Effect::new(move |_| {
        if let Some(element) = host.get() {
            let node: Node = element.into();
            browser.try_with_value(|browser| browser.mount_call_to_action(id, &label, &node));
            mounted.set_value(Some(node));
        }
    });
    on_cleanup(move || {
        if let Some(node) = mounted.try_get_value().flatten() {
            browser.try_with_value(|browser| browser.unmount_call_to_action(id, &node));
        }
    });
}

/// Hydrate the promotion page rendered by the server.
pub fn hydrate_page(config: RuntimeConfig) {
    let now = SystemClock.now_ms();
    let state = PromoState::resolve(None, read_promo_state, now);
    let bus = EventBus::new();
    let coordinator = PriceCoordinator::new(
        bus.clone(),
        ServerPricing,
        LocalStorageFlags,
        config.pricing.clone(),
    );
    let host = BrowserHost::new(&config.keep_alive);
    let teardown = bus.clone();
    bus.subscribe(
        &COUNTDOWN_DONE,
        crate::bus::handler(|_: &()| leptos::logging::log!("promotion ended, purchase disabled")),
    );
    leptos::mount::hydrate_body(move || {
        if let Some(host) = host {
            host.provide();
        }
        on_cleanup(move || teardown.clear());
        view! {
            <PromoRuntime bus=bus coordinator=coordinator config=config>
                <PromoPage state=state/>
            </PromoRuntime>
        }
    });
}
