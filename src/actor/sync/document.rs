//! Documents that host the variables stylesheet.

use std::sync::Arc;

#[cfg(test)]
use parking_lot::Mutex;

use super::SyncError;
use crate::storage::Storage;

/// Somewhere a single, identified stylesheet can be written.
pub trait StyleRoot: Send + Sync {
    /// Set the text of style element `element_id`, creating it only if absent.
    fn apply(&self, element_id: &str, css: &str) -> Result<(), SyncError>;
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
struct StyleElement {
    id: String,
    text: String,
}

/// In-memory document with its nested frames.
#[cfg(test)]
pub struct StyleDocument {
    name: String,
    styles: Mutex<Vec<StyleElement>>,
    frames: Mutex<Vec<Arc<StyleDocument>>>,
}

#[cfg(test)]
impl StyleDocument {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            styles: Mutex::new(Vec::new()),
            frames: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_frame(&self, frame: Arc<StyleDocument>) {
        self.frames.lock().push(frame);
    }

    /// Text of the element with `id`, if present in this document.
    pub fn style_text(&self, id: &str) -> Option<String> {
        self.styles
            .lock()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.text.clone())
    }

    /// Number of elements carrying `id` in this document.
    pub fn count(&self, id: &str) -> usize {
        self.styles.lock().iter().filter(|s| s.id == id).count()
    }
}

#[cfg(test)]
impl StyleRoot for StyleDocument {
    fn apply(&self, element_id: &str, css: &str) -> Result<(), SyncError> {
        {
            let mut styles = self.styles.lock();
            match styles.iter_mut().find(|s| s.id == element_id) {
                Some(style) => style.text = css.to_string(),
                None => styles.push(StyleElement {
                    id: element_id.to_string(),
                    text: css.to_string(),
                }),
            }
        }
        let frames = self.frames.lock().clone();
        for frame in frames {
            frame.apply(element_id, css)?;
        }
        Ok(())
    }
}

/// File-backed document: the stylesheet lives at `<dir>/<element_id>.css`.
pub struct FileStyleRoot {
    storage: Arc<dyn Storage>,
    dir: String,
}

impl FileStyleRoot {
    pub fn new(storage: Arc<dyn Storage>, dir: impl Into<String>) -> Self {
        Self {
            storage,
            dir: dir.into(),
        }
    }

    pub fn path_for(&self, element_id: &str) -> String {
        let dir = self.dir.trim_end_matches('/');
        if dir.is_empty() {
            format!("{element_id}.css")
        } else {
            format!("{dir}/{element_id}.css")
        }
    }
}

impl StyleRoot for FileStyleRoot {
    fn apply(&self, element_id: &str, css: &str) -> Result<(), SyncError> {
        // unchanged content is not rewritten
        let path = self.path_for(element_id);
        if self.storage.read(&path)?.as_deref() == Some(css) {
            return Ok(());
        }
        self.storage.save(&path, css)?;
        Ok(())
    }
}
