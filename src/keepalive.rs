//! Keep-alive slots for imperatively rendered DOM subtrees.
//!
//! Some content cannot simply be re-rendered when the component showing
//! it is unmounted, e.g. an element with a shadow root and its own
//! runtime state.  The [`KeepAlive`] cache gives such content a
//! permanent container that is only ever moved, never recreated:
//!
//! - on first use of a slot id the container is created inside a hidden
//!   root element (itself created once, at the end of `<body>`) and the
//!   slot content is rendered into it, exactly once;
//! - [`SlotRef::mount`] moves the container under whatever host element
//!   the current view provides;
//! - [`KeepAlive::release`] moves it back under the hidden root, where it
//!   waits, intact, for the next host;
//! - [`KeepAlive::destroy`] finally removes it.
//!
//! Outside of a document (i.e. during server-side rendering) there is
//! nothing to keep alive; every operation is then a no-op and
//! [`acquire_or_create`](KeepAlive::acquire_or_create) hands the content
//! back untouched as [`Kept::Inline`].
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{config::KeepAliveConfig, dom::Dom};

/// Something that can render itself into a slot container.
pub trait SlotContent<D: Dom> {
    fn populate(self, dom: &D, container: &D::Node);
}

impl<D, F> SlotContent<D> for F
where
    D: Dom,
    F: FnOnce(&D, &D::Node),
{
    fn populate(self, dom: &D, container: &D::Node) {
        self(dom, container)
    }
}

/// The result of [`KeepAlive::acquire_or_create`].
pub enum Kept<D: Dom, C> {
    /// The content lives in a persistent slot.
    Slot(SlotRef<D>),
    /// No document is available; render the content as usual.
    Inline(C),
}

/// A process-wide keep-alive cache.  Clones share the same slots.
///
/// The cache is bound to the thread owning the document.
pub struct KeepAlive<D: Dom> {
    inner: Rc<RefCell<KeepAliveInner<D>>>,
}

struct KeepAliveInner<D: Dom> {
    dom: Option<D>,
    root_id: String,
    root: Option<D::Node>,
    slots: HashMap<String, Slot<D::Node>>,
}

struct Slot<N> {
    content: N,
    host: Option<N>,
}

/// A reference to a slot, to be mounted by the view displaying it.
pub struct SlotRef<D: Dom> {
    id: String,
    cache: KeepAlive<D>,
}

impl<D: Dom> Clone for KeepAlive<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Dom> KeepAlive<D> {
    pub fn new(dom: D) -> Self {
        Self::with_config(Some(dom), &KeepAliveConfig::default())
    }

    /// A cache for an environment without a document.
    pub fn unavailable() -> Self {
        Self::with_config(None, &KeepAliveConfig::default())
    }

    pub fn with_config(dom: Option<D>, config: &KeepAliveConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(KeepAliveInner {
                dom,
                root_id: config.root_id.clone(),
                root: None,
                slots: HashMap::new(),
            })),
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.borrow().dom.is_some()
    }

    /// The hidden root, created on first call.
    ///
    /// Creating it again is a silent no-op that returns the existing one.
    fn ensure_root(&self) -> Option<D::Node> {
        let mut inner = self.inner.borrow_mut();
        if let Some(root) = &inner.root {
            return Some(root.clone());
        }
        let dom = inner.dom.clone()?;
        let Some(body) = dom.body() else {
            leptos::logging::warn!("keep-alive: document has no body, slots will not persist");
            return None;
        };
        let root = dom.create_element("div");
        dom.set_attribute(&root, "id", &inner.root_id);
        dom.set_attribute(&root, "style", "display:none");
        dom.append_child(&body, &root);
        inner.root = Some(root.clone());
        Some(root)
    }

    /// Return the slot `id`, creating and populating it with `content`
    /// if it does not exist yet.
    ///
    /// For an existing slot `content` is dropped without being used.
    pub fn acquire_or_create<C>(&self, id: &str, content: C) -> Kept<D, C>
    where
        C: SlotContent<D>,
    {
        let Some(root) = self.ensure_root() else {
            return Kept::Inline(content);
        };
        let created = {
            let mut inner = self.inner.borrow_mut();
            match inner.dom.clone() {
                Some(dom) if !inner.slots.contains_key(id) => {
                    let container = dom.create_element("div");
                    dom.set_attribute(&container, "data-keepalive-slot", id);
                    dom.append_child(&root, &container);
                    inner.slots.insert(
                        id.to_string(),
                        Slot {
                            content: container.clone(),
                            host: None,
                        },
                    );
                    Some((dom, container))
                }
                _ => None,
            }
        };
        // populated outside of the borrow as content may well use the cache
        if let Some((dom, container)) = created {
            content.populate(&dom, &container);
        }
        Kept::Slot(SlotRef {
            id: id.to_string(),
            cache: self.clone(),
        })
    }

    /// Move the slot back under the hidden root, keeping it alive.
    pub fn release(&self, id: &str) {
        let mut inner = self.inner.borrow_mut();
        let (Some(dom), Some(root)) = (inner.dom.clone(), inner.root.clone()) else {
            return;
        };
        if let Some(slot) = inner.slots.get_mut(id) {
            if dom.parent(&slot.content).as_ref() != Some(&root) {
                dom.append_child(&root, &slot.content);
            }
            slot.host = None;
        }
    }

    /// Release the slot, but only if `host` still holds it.
    ///
    /// A view being unmounted calls this rather than [`release`], as by
    /// then another view may already have mounted the slot elsewhere.
    ///
    /// [`release`]: KeepAlive::release
    pub fn release_from(&self, id: &str, host: &D::Node) -> bool {
        if self.host_of(id).as_ref() != Some(host) {
            return false;
        }
        self.release(id);
        true
    }

    /// Remove the slot for good; the next acquire starts afresh.
    pub fn destroy(&self, id: &str) {
        let mut inner = self.inner.borrow_mut();
        let Some(dom) = inner.dom.clone() else {
            return;
        };
        if let Some(slot) = inner.slots.remove(id) {
            dom.remove(&slot.content);
        }
    }

    /// Remove every slot and the hidden root.
    pub fn teardown(&self) {
        let mut inner = self.inner.borrow_mut();
        let Some(dom) = inner.dom.clone() else {
            return;
        };
        for (_, slot) in inner.slots.drain() {
            dom.remove(&slot.content);
        }
        if let Some(root) = inner.root.take() {
            dom.remove(&root);
        }
    }

    pub fn root(&self) -> Option<D::Node> {
        self.inner.borrow().root.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.borrow().slots.contains_key(id)
    }

    pub fn content_of(&self, id: &str) -> Option<D::Node> {
        self.inner
            .borrow()
            .slots
            .get(id)
            .map(|slot| slot.content.clone())
    }

    pub fn host_of(&self, id: &str) -> Option<D::Node> {
        self.inner
            .borrow()
            .slots
            .get(id)
            .and_then(|slot| slot.host.clone())
    }
}

impl<D: Dom> SlotRef<D> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> Option<D::Node> {
        self.cache.content_of(&self.id)
    }

    /// Move the slot content under `host`.
    ///
    /// A slot has at most one host; mounting it elsewhere takes it away
    /// from the previous one.
    pub fn mount(&self, host: &D::Node) {
        let mut inner = self.cache.inner.borrow_mut();
        let Some(dom) = inner.dom.clone() else {
            return;
        };
        if let Some(slot) = inner.slots.get_mut(&self.id) {
            if dom.parent(&slot.content).as_ref() != Some(host) {
                dom.append_child(host, &slot.content);
            }
            slot.host = Some(host.clone());
        }
    }

    /// See [`KeepAlive::release_from`].
    pub fn unmount(&self, host: &D::Node) -> bool {
        self.cache.release_from(&self.id, host)
    }
}

impl<D: Dom, C> Kept<D, C> {
    pub fn slot(&self) -> Option<&SlotRef<D>> {
        match self {
            Kept::Slot(slot) => Some(slot),
            Kept::Inline(_) => None,
        }
    }

    pub fn into_inline(self) -> Option<C> {
        match self {
            Kept::Slot(_) => None,
            Kept::Inline(content) => Some(content),
        }
    }
}

mod debug {
    use super::*;
    use std::fmt;

    impl<D: Dom> fmt::Debug for KeepAlive<D> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let inner = self.inner.borrow();
            let mut slots = inner.slots.keys().collect::<Vec<_>>();
            slots.sort_unstable();
            f.debug_struct("KeepAlive")
                .field("available", &inner.dom.is_some())
                .field("root", &inner.root)
                .field("slots", &slots)
                .finish()
        }
    }

    impl<D: Dom> fmt::Debug for SlotRef<D> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("SlotRef").field("id", &self.id).finish()
        }
    }
}
