//! Delivery of popup requests to page agents.
//!
//! In a browser, the popup reaches a page's agent through the runtime's
//! messaging API, and delivery fails when the page has no agent yet (the
//! content script was never injected). `Tabs` is that seam.
//!
//! `LocalTabs` implements it in-process: each provisioned page runs its
//! `PageAgent` on a dedicated thread, and requests travel over a channel
//! with a one-shot reply channel per request. One response per request, no
//! ordering between requests to different pages, no timeouts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::agent::PageAgent;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::message::{Request, Response};
use crate::store::Store;

/// Host-assigned page handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access to open pages and their agents.
pub trait Tabs {
    /// The page the user is looking at.
    fn active_tab(&self) -> Result<TabId>;

    /// Deliver a request to the page's agent and wait for its reply.
    ///
    /// Fails with [`Error::NoReceiver`] when the page has no agent.
    fn send(&self, tab: TabId, request: Request) -> Result<Response>;

    /// Attach an agent to the page (inject the content script).
    fn provision(&self, tab: TabId) -> Result<()>;
}

type Envelope = (Request, mpsc::Sender<Response>);

fn deliver(tab: TabId, sender: &mpsc::Sender<Envelope>, request: Request) -> Result<Response> {
    let (reply_tx, reply_rx) = mpsc::channel();

    sender
        .send((request, reply_tx))
        .map_err(|_| Error::NoReceiver(tab))?;
    reply_rx.recv().map_err(|_| Error::NoReceiver(tab))
}

/// A page agent running on its own thread.
pub struct AgentHandle<D, S> {
    tab: TabId,
    sender: Option<mpsc::Sender<Envelope>>,
    thread: Option<JoinHandle<PageAgent<D, S>>>,
}

impl<D, S> AgentHandle<D, S>
where
    D: Document + Send + 'static,
    S: Store + 'static,
{
    /// Start the agent's thread. With `run_on_load`, the agent restores its
    /// stored state before serving requests.
    pub fn spawn(tab: TabId, agent: PageAgent<D, S>, run_on_load: bool) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Envelope>();

        let thread = thread::Builder::new()
            .name(format!("page-agent-{tab}"))
            .spawn(move || {
                let mut agent = agent;
                if run_on_load {
                    let outcome = agent.on_load();
                    debug!("Agent for tab {} loaded: {:?}", tab, outcome);
                }

                for (request, reply) in receiver {
                    let response = agent.handle(request);
                    if reply.send(response).is_err() {
                        debug!("Requester for tab {} went away before the reply", tab);
                    }
                }

                agent
            })?;

        Ok(Self {
            tab,
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Send a request and block until the agent replies.
    pub fn send(&self, request: Request) -> Result<Response> {
        deliver(self.tab, &self.connect()?, request)
    }

    /// A sender that outlives any lock held on this handle.
    fn connect(&self) -> Result<mpsc::Sender<Envelope>> {
        self.sender.clone().ok_or(Error::NoReceiver(self.tab))
    }

    /// Stop the agent and hand it back. `None` if its thread panicked.
    pub fn shutdown(mut self) -> Option<PageAgent<D, S>> {
        self.sender.take();
        self.thread.take().and_then(|thread| thread.join().ok())
    }
}

impl<D, S> Drop for AgentHandle<D, S> {
    fn drop(&mut self) {
        // Closing the channel ends the agent's loop.
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Agent thread for tab {} panicked", self.tab);
            }
        }
    }
}

struct Page<D, S> {
    /// Document waiting for an agent; moved into the agent on provisioning.
    document: Option<D>,
    agent: Option<AgentHandle<D, S>>,
}

/// In-process stand-in for the browser's tabs and messaging.
pub struct LocalTabs<D, S, F> {
    pages: Mutex<BTreeMap<TabId, Page<D, S>>>,
    active: Mutex<Option<TabId>>,
    next_id: AtomicU32,
    factory: F,
}

impl<D, S, F> LocalTabs<D, S, F>
where
    D: Document + Send + 'static,
    S: Store + 'static,
    F: Fn(D) -> PageAgent<D, S>,
{
    /// `factory` builds the agent for a page's document when it is provisioned.
    pub fn new(factory: F) -> Self {
        Self {
            pages: Mutex::new(BTreeMap::new()),
            active: Mutex::new(None),
            next_id: AtomicU32::new(1),
            factory,
        }
    }

    /// Open a page and make it active. With `with_agent`, the agent is
    /// attached right away and restores stored state.
    pub fn open_page(&self, document: D, with_agent: bool) -> Result<TabId> {
        let tab = TabId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pages.lock().insert(
            tab,
            Page {
                document: Some(document),
                agent: None,
            },
        );
        *self.active.lock() = Some(tab);
        debug!("Opened tab {}", tab);

        if with_agent {
            self.provision(tab)?;
        }
        Ok(tab)
    }

    pub fn set_active(&self, tab: TabId) -> Result<()> {
        if !self.pages.lock().contains_key(&tab) {
            return Err(Error::NoActivePage);
        }
        *self.active.lock() = Some(tab);
        Ok(())
    }

    /// Whether the page has an agent attached.
    pub fn has_agent(&self, tab: TabId) -> bool {
        self.pages
            .lock()
            .get(&tab)
            .is_some_and(|page| page.agent.is_some())
    }

    /// Close a page, stopping its agent, and return its document.
    pub fn close_page(&self, tab: TabId) -> Option<D> {
        let page = self.pages.lock().remove(&tab)?;
        {
            let mut active = self.active.lock();
            if *active == Some(tab) {
                *active = None;
            }
        }

        match page.agent {
            Some(agent) => agent.shutdown().map(PageAgent::into_document),
            None => page.document,
        }
    }
}

impl<D, S, F> Tabs for LocalTabs<D, S, F>
where
    D: Document + Send + 'static,
    S: Store + 'static,
    F: Fn(D) -> PageAgent<D, S>,
{
    fn active_tab(&self) -> Result<TabId> {
        (*self.active.lock()).ok_or(Error::NoActivePage)
    }

    fn send(&self, tab: TabId, request: Request) -> Result<Response> {
        // Only the lookup holds the lock; a slow agent stalls its own page.
        let sender = self
            .pages
            .lock()
            .get(&tab)
            .and_then(|page| page.agent.as_ref())
            .ok_or(Error::NoReceiver(tab))?
            .connect()?;
        deliver(tab, &sender, request)
    }

    fn provision(&self, tab: TabId) -> Result<()> {
        let mut pages = self.pages.lock();
        let page = pages.get_mut(&tab).ok_or(Error::NoReceiver(tab))?;

        if page.agent.is_some() {
            debug!("Tab {} already has an agent", tab);
            return Ok(());
        }

        let Some(document) = page.document.take() else {
            return Err(Error::NoReceiver(tab));
        };

        let agent = (self.factory)(document);
        page.agent = Some(AgentHandle::spawn(tab, agent, true)?);
        debug!("Provisioned agent for tab {}", tab);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::agent::AgentState;
    use crate::document::{HtmlDocument, Location, STYLE_ELEMENT_ID};
    use crate::settings::SettingsRecord;
    use crate::store::{MemoryStore, SettingsStore};

    fn document(url: &str) -> HtmlDocument {
        HtmlDocument::empty(Location::parse(url).unwrap())
    }

    fn tabs(
        store: Arc<MemoryStore>,
    ) -> LocalTabs<
        HtmlDocument,
        Arc<MemoryStore>,
        impl Fn(HtmlDocument) -> PageAgent<HtmlDocument, Arc<MemoryStore>>,
    > {
        LocalTabs::new(move |doc: HtmlDocument| {
            PageAgent::new(doc, SettingsStore::new(store.clone()))
        })
    }

    /// Document whose first style injection waits for a release signal.
    struct GatedDocument {
        inner: HtmlDocument,
        entered: Option<mpsc::Sender<()>>,
        release: Option<mpsc::Receiver<()>>,
    }

    impl Document for GatedDocument {
        fn location(&self) -> &Location {
            self.inner.location()
        }

        fn is_ready(&self) -> bool {
            self.inner.is_ready()
        }

        fn append_style_to_head(&mut self, id: &str, css: &str) {
            if let Some(entered) = self.entered.take() {
                let _ = entered.send(());
            }
            if let Some(release) = self.release.take() {
                let _ = release.recv();
            }
            self.inner.append_style_to_head(id, css);
        }

        fn remove_element(&mut self, id: &str) -> bool {
            self.inner.remove_element(id)
        }

        fn count_elements(&self, id: &str) -> usize {
            self.inner.count_elements(id)
        }
    }

    fn apply(enabled: bool) -> Request {
        Request::ApplyDarkMode {
            enabled,
            settings: Some(SettingsRecord::default()),
        }
    }

    #[test]
    fn test_handle_round_trip_and_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let agent = PageAgent::new(document("https://a.com/"), SettingsStore::new(store));
        let handle = AgentHandle::spawn(TabId(7), agent, false).unwrap();

        let response = handle.send(apply(true)).unwrap();
        assert!(response.enabled());
        assert_eq!(handle.tab(), TabId(7));

        let agent = handle.shutdown().unwrap();
        assert_eq!(agent.state(), AgentState::Active);
    }

    #[test]
    fn test_slow_agent_does_not_block_other_tabs() {
        let store = Arc::new(MemoryStore::new());
        let tabs = LocalTabs::new(move |doc: GatedDocument| {
            PageAgent::new(doc, SettingsStore::new(store.clone()))
        });

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let slow = tabs
            .open_page(
                GatedDocument {
                    inner: document("https://slow.com/"),
                    entered: Some(entered_tx),
                    release: Some(release_rx),
                },
                true,
            )
            .unwrap();
        let other = tabs
            .open_page(
                GatedDocument {
                    inner: document("https://other.com/"),
                    entered: None,
                    release: None,
                },
                false,
            )
            .unwrap();

        thread::scope(|scope| {
            let pending = scope.spawn(|| tabs.send(slow, apply(true)));
            entered_rx.recv().unwrap();

            // The slow agent is mid-request; other pages stay reachable.
            tabs.provision(other).unwrap();
            assert!(tabs.has_agent(other));
            assert!(!tabs.send(other, Request::GetState).unwrap().enabled());

            release_tx.send(()).unwrap();
            assert!(pending.join().unwrap().unwrap().enabled());
        });

        let doc = tabs.close_page(slow).unwrap();
        assert_eq!(doc.count_elements(STYLE_ELEMENT_ID), 1);
    }

    #[test]
    fn test_no_active_tab() {
        let tabs = tabs(Arc::new(MemoryStore::new()));
        assert!(matches!(tabs.active_tab(), Err(Error::NoActivePage)));
    }

    #[test]
    fn test_send_without_agent_fails() {
        let tabs = tabs(Arc::new(MemoryStore::new()));
        let tab = tabs.open_page(document("https://a.com/"), false).unwrap();

        assert_eq!(tabs.active_tab().unwrap(), tab);
        assert!(!tabs.has_agent(tab));
        assert!(matches!(
            tabs.send(tab, Request::GetState),
            Err(Error::NoReceiver(t)) if t == tab
        ));
    }

    #[test]
    fn test_provision_then_send() {
        let tabs = tabs(Arc::new(MemoryStore::new()));
        let tab = tabs.open_page(document("https://a.com/"), false).unwrap();

        tabs.provision(tab).unwrap();
        assert!(tabs.has_agent(tab));
        // Provisioning twice keeps the existing agent.
        tabs.provision(tab).unwrap();

        assert!(tabs.send(tab, apply(true)).unwrap().enabled());

        let doc = tabs.close_page(tab).unwrap();
        assert_eq!(doc.count_elements(STYLE_ELEMENT_ID), 1);
        assert!(tabs.active_tab().is_err());
    }

    #[test]
    fn test_provisioned_agent_restores_global_state() {
        let store = Arc::new(MemoryStore::new());
        SettingsStore::new(store.clone())
            .save_globals(&SettingsRecord::default(), true)
            .unwrap();

        let tabs = tabs(store);
        let tab = tabs.open_page(document("https://a.com/"), true).unwrap();

        assert!(tabs.send(tab, Request::GetState).unwrap().enabled());
    }

    #[test]
    fn test_close_page_without_agent_returns_document() {
        let tabs = tabs(Arc::new(MemoryStore::new()));
        let tab = tabs.open_page(document("https://a.com/"), false).unwrap();
        let doc = tabs.close_page(tab).unwrap();
        assert_eq!(doc.count_elements(STYLE_ELEMENT_ID), 0);
        assert!(tabs.close_page(tab).is_none());
    }

    #[test]
    fn test_set_active() {
        let tabs = tabs(Arc::new(MemoryStore::new()));
        let first = tabs.open_page(document("https://a.com/"), false).unwrap();
        let second = tabs.open_page(document("https://b.com/"), false).unwrap();

        assert_eq!(tabs.active_tab().unwrap(), second);
        tabs.set_active(first).unwrap();
        assert_eq!(tabs.active_tab().unwrap(), first);
        assert!(tabs.set_active(TabId(99)).is_err());
    }
}
