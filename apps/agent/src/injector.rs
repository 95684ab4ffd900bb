//! Value Injector: writes values and files through the host page's own event
//! lifecycle so framework-managed inputs register the change.
//!
//! Nothing here returns an error: every outcome is a per-field `bool`.

use std::time::Duration;

use tracing::{debug, warn};

use crate::dom::{DomEvent, ElementId, EventKind, FileBlob, Page};
use crate::lexicon::DROP_ZONE_SELECTORS;

/// Delay between a successful file attach and scrolling the field into view.
pub const SCROLL_CONFIRM_DELAY: Duration = Duration::from_millis(300);

/// focus → assign → `input` → `change` → blur.
pub fn set_text_value<P: Page + ?Sized>(page: &P, element: ElementId, value: &str) -> bool {
    page.focus(element);
    let assigned = page.assign_value(element, value);
    if let Err(e) = &assigned {
        debug!("Text assignment on {:?} rejected: {}", element, e);
    } else {
        page.dispatch(element, DomEvent::bubbling(EventKind::Input));
        page.dispatch(element, DomEvent::bubbling(EventKind::Change));
    }
    page.blur(element);
    assigned.is_ok()
}

/// Attaches a one-file list, falling back to a simulated drag-and-drop on the
/// nearest drop zone when the page refuses the assignment.
pub async fn set_file_value<P: Page + ?Sized>(page: &P, element: ElementId, file: &FileBlob) -> bool {
    match page.assign_files(element, std::slice::from_ref(file)) {
        Ok(()) => {
            page.dispatch(element, DomEvent::bubbling(EventKind::Input));
            page.dispatch(element, DomEvent::bubbling(EventKind::Change));
            tokio::time::sleep(SCROLL_CONFIRM_DELAY).await;
            page.scroll_into_view(element);
            true
        }
        Err(e) => {
            debug!("File assignment on {:?} rejected: {}", element, e);
            simulate_drop(page, element, file)
        }
    }
}

/// The drop zone enclosing `element`, else the first drop zone on the page.
pub fn find_drop_zone<P: Page + ?Sized>(page: &P, element: ElementId) -> Option<ElementId> {
    DROP_ZONE_SELECTORS
        .iter()
        .find_map(|selector| page.closest(element, selector))
        .or_else(|| {
            DROP_ZONE_SELECTORS
                .iter()
                .find_map(|selector| page.select_first(selector))
        })
}

/// dragenter → dragover → drop, each carrying the file.
fn simulate_drop<P: Page + ?Sized>(page: &P, element: ElementId, file: &FileBlob) -> bool {
    let Some(zone) = find_drop_zone(page, element) else {
        warn!("No drop zone for rejected file input {:?}", element);
        return false;
    };
    for kind in [EventKind::DragEnter, EventKind::DragOver, EventKind::Drop] {
        page.dispatch(zone, DomEvent::drag(kind, file.clone()));
    }
    true
}
