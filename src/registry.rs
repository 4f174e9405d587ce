//! An explicit registry of imperatively rendered elements.
//!
//! Rather than relying on a global, define-if-absent custom element
//! registry, the elements a page knows how to render on its own are
//! listed here once at startup, as a mapping from tag name to a factory
//! that renders into an element of that tag.
use std::{collections::HashMap, rc::Rc};

use crate::dom::Dom;

/// Renders the internals of an element that was created with its tag.
pub type Factory<D> = Rc<dyn Fn(&D, &<D as Dom>::Node)>;

/// Tag of the style-isolated call to action.
pub const PROMO_CTA_TAG: &str = "promo-shadow";
/// Label used when the host element carries no `data-cta`.
pub const DEFAULT_CTA_LABEL: &str = "Buy now";
/// Label of the call to action once clicked.
pub const ORDER_PLACED_LABEL: &str = "Order placed (demo)";
/// Set on the call to action's host once an order was placed.
pub const ORDERED: &str = "data-ordered";

const UPGRADED: &str = "data-upgraded";

pub struct ComponentRegistry<D: Dom> {
    factories: HashMap<String, Factory<D>>,
}

impl<D: Dom> Default for ComponentRegistry<D> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<D: Dom> ComponentRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry knowing the elements of the promotion page.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PROMO_CTA_TAG, promo_cta::<D>);
        registry
    }

    /// Register `factory` for `tag`.
    ///
    /// A tag can only be registered once; later registrations are
    /// ignored and `false` is returned.
    pub fn register<F>(&mut self, tag: &str, factory: F) -> bool
    where
        F: Fn(&D, &D::Node) + 'static,
    {
        let tag = tag.to_ascii_lowercase();
        if self.factories.contains_key(&tag) {
            leptos::logging::log!("registry: `{tag}` already registered, ignoring");
            return false;
        }
        self.factories.insert(tag, Rc::new(factory));
        true
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(&tag.to_ascii_lowercase())
    }

    /// Render the internals of `element` if its tag is registered.
    ///
    /// An element is only ever upgraded once; `true` is returned only for
    /// the call that did so.
    pub fn upgrade(&self, dom: &D, element: &D::Node) -> bool {
        if dom.attribute(element, UPGRADED).is_some() {
            return false;
        }
        let tag = dom.tag_name(element).to_ascii_lowercase();
        let Some(factory) = self.factories.get(&tag) else {
            return false;
        };
        (**factory)(dom, element);
        dom.set_attribute(element, UPGRADED, "");
        true
    }

    /// Create an element of `tag`, with `attributes`, and upgrade it.
    pub fn create(&self, dom: &D, tag: &str, attributes: &[(&str, &str)]) -> D::Node {
        let element = dom.create_element(tag);
        for (name, value) in attributes {
            dom.set_attribute(&element, name, value);
        }
        self.upgrade(dom, &element);
        element
    }
}

/// The call to action: a button inside a shadow root, so the page's
/// styles do not leak into it while `part="button"` and CSS variables
/// still allow deliberate theming.
///
/// Clicking it places a (pretend) order: the button confirms it and the
/// host is marked with [`ORDERED`].  A host marked `aria-disabled="true"`
/// takes no orders.
pub fn promo_cta<D: Dom>(dom: &D, host: &D::Node) {
    let Some(shadow) = dom.attach_shadow(host) else {
        return;
    };
    let style = dom.create_element("style");
    dom.set_text(&style, ":host{display:inline-block} button{}");
    let button = dom.create_element("button");
    dom.set_attribute(&button, "part", "button");
    let label = dom
        .attribute(host, "data-cta")
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| DEFAULT_CTA_LABEL.to_string());
    dom.set_text(&button, &label);
    dom.on_click(&button, {
        let (dom, host, button) = (dom.clone(), host.clone(), button.clone());
        Rc::new(move || {
            if dom.attribute(&host, "aria-disabled").as_deref() == Some("true") {
                return;
            }
            leptos::logging::log!("cta: order placed");
            dom.set_text(&button, ORDER_PLACED_LABEL);
            dom.set_attribute(&host, ORDERED, "");
        })
    });
    dom.append_child(&shadow, &style);
    dom.append_child(&shadow, &button);
}
