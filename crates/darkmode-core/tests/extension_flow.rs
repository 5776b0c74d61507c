//! End-to-end flows: popup, page agents and storage working together.

use std::sync::Arc;

use darkmode_core::config::ControlConfig;
use darkmode_core::{
    ApplyOutcome, ControlSurface, Document, HtmlDocument, JsonFileStore, LoadOutcome, LocalTabs,
    Location, PageAgent, PageId, PopupForm, Request, Response, STYLE_ELEMENT_ID, SaveOutcome,
    SettingsRecord, SettingsStore, Tabs, ThemeStyle, generate,
};

const PAGE: &str = "<!DOCTYPE html><html><head><title>News</title></head><body><p>hi</p></body></html>";

fn page(url: &str) -> HtmlDocument {
    HtmlDocument::from_html(Location::parse(url).unwrap(), PAGE)
}

fn surface(
    store: Arc<JsonFileStore>,
) -> ControlSurface<
    Arc<JsonFileStore>,
    LocalTabs<
        HtmlDocument,
        Arc<JsonFileStore>,
        impl Fn(HtmlDocument) -> PageAgent<HtmlDocument, Arc<JsonFileStore>>,
    >,
> {
    let page_store = store.clone();
    let tabs = LocalTabs::new(move |document: HtmlDocument| {
        PageAgent::new(document, SettingsStore::new(page_store.clone()))
    });
    ControlSurface::new(SettingsStore::new(store), tabs, ControlConfig::default())
}

fn sepia_form(enabled: bool) -> PopupForm {
    PopupForm {
        enabled,
        settings: SettingsRecord {
            darkness_level: 60,
            theme_style: ThemeStyle::Sepia,
            ..SettingsRecord::default()
        },
    }
}

#[test]
fn test_apply_renders_single_style_element() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("storage.json")));
    let surface = surface(store);

    let tab = surface
        .tabs()
        .open_page(page("https://news.example/today"), true)
        .unwrap();

    assert!(surface.apply(&sepia_form(true)).is_applied());
    assert!(surface.apply(&sepia_form(true)).is_applied());

    let document = surface.tabs().close_page(tab).unwrap();
    assert_eq!(document.count_elements(STYLE_ELEMENT_ID), 1);

    let html = document.render();
    assert_eq!(html.matches("id=\"dark-mode-pro-style\"").count(), 1);
    assert!(html.contains("sepia(100%)"));
    assert!(html.find("dark-mode-pro-style").unwrap() < html.find("</head>").unwrap());
}

#[test]
fn test_apply_then_disable_renders_original_page() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("storage.json")));
    let surface = surface(store);

    let tab = surface
        .tabs()
        .open_page(page("https://news.example/today"), true)
        .unwrap();
    surface.apply(&sepia_form(true));
    surface.apply(&sepia_form(false));

    let document = surface.tabs().close_page(tab).unwrap();
    assert_eq!(document.render(), PAGE);
}

#[test]
fn test_apply_to_page_without_agent_provisions_it() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("storage.json")));
    let surface = surface(store.clone());

    let tab = surface
        .tabs()
        .open_page(page("https://old.example/"), false)
        .unwrap();
    assert!(matches!(
        surface.tabs().send(tab, Request::GetState),
        Err(darkmode_core::Error::NoReceiver(_))
    ));

    let outcome = surface.apply(&sepia_form(true));
    assert_eq!(
        outcome,
        ApplyOutcome::AppliedAfterProvision(Response::Applied {
            success: true,
            enabled: true
        })
    );

    let state = SettingsStore::new(store)
        .page_state(&PageId::new("old.example", "/"))
        .unwrap()
        .unwrap();
    assert!(state.enabled);
    assert_eq!(state.url, "https://old.example/");
}

#[test]
fn test_page_state_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let url = "https://docs.example/guide";

    {
        let surface = surface(Arc::new(JsonFileStore::new(&path)));
        let tab = surface.tabs().open_page(page(url), true).unwrap();
        surface.apply(&sepia_form(true));
        surface.tabs().close_page(tab);
    }

    // A fresh agent on the same page restores the stored snapshot, even
    // though the global toggle was never saved.
    let store = Arc::new(JsonFileStore::new(&path));
    let mut agent = PageAgent::new(page(url), SettingsStore::new(store));
    assert_eq!(agent.on_load(), LoadOutcome::RestoredPage);

    let settings = agent.settings().unwrap().clone();
    assert_eq!(settings.theme_style, ThemeStyle::Sepia);
    assert_eq!(settings.darkness_level, 60);
    assert_eq!(agent.document().styles()[0].text, generate(&settings));
}

#[test]
fn test_saved_globals_apply_to_new_pages() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("storage.json")));
    let surface = surface(store.clone());

    assert!(matches!(
        surface.save(&sepia_form(true)),
        SaveOutcome::Saved { label: "Saved!", .. }
    ));

    // Reopening the popup shows what was saved.
    let form = surface.open();
    assert!(form.enabled);
    assert_eq!(form.settings.theme_style, ThemeStyle::Sepia);
    assert_eq!(form.darkness_label(), "60%");

    let tab = surface
        .tabs()
        .open_page(page("https://fresh.example/"), true)
        .unwrap();
    let state = surface.tabs().send(tab, Request::GetState).unwrap();
    assert!(state.enabled());

    // Auto-apply on load does not write a page state.
    assert!(SettingsStore::new(store).page_states().unwrap().is_empty());
}

#[test]
fn test_save_with_toggle_off_keeps_new_pages_plain() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("storage.json")));
    let surface = surface(store);

    surface.save(&sepia_form(false));

    let tab = surface
        .tabs()
        .open_page(page("https://plain.example/"), true)
        .unwrap();
    let document = surface.tabs().close_page(tab).unwrap();
    assert_eq!(document.count_elements(STYLE_ELEMENT_ID), 0);
    assert_eq!(surface.open().settings.theme_style, ThemeStyle::Sepia);
}
