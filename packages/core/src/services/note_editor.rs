//! Note Editor
//!
//! In-memory editing session for one note with debounced autosave.
//!
//! Every `update_content` call replaces the pending save, so a burst of
//! keystrokes produces a single write once the editor has been quiet for
//! the debounce period. `save_now` flushes immediately and is what callers
//! use when the user leaves the editor.
//!
//! A new note starts as an unsaved draft. Until the first edit nothing is
//! written, so opening and immediately closing a new note leaves no empty
//! record behind.
//!
//! Once a note exists in the store, a save only carries the title, body and
//! modified date onto the stored row. Pinning, lifecycle, parent and sort
//! order changed elsewhere while an edit was pending are kept, and a note
//! deleted in the meantime stays deleted.

use crate::models::{Node, NodeType, ValidationError};
use crate::services::error::NodeServiceError;
use crate::services::node_service::NodeService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Default quiet period before an edit is persisted
pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(750);

/// Editor working copy
#[derive(Debug)]
struct Draft {
    note: Node,
    dirty: bool,

    /// Whether a row for this note exists (or existed) in the store
    persisted: bool,
}

/// Editing session for a single note
pub struct NoteEditor {
    service: NodeService,
    draft: Arc<Mutex<Draft>>,
    debounce: Duration,
    pending: Option<JoinHandle<()>>,
}

impl NoteEditor {
    /// Open an existing note
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if no node has this id
    /// - `ValidationFailed` if the node is not a note
    pub async fn open(service: NodeService, id: &str) -> Result<Self, NodeServiceError> {
        let note = service
            .get_node(id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))?;

        if note.node_type != NodeType::Note {
            return Err(ValidationError::InvalidNodeType(format!(
                "{} is a {}, not a note",
                id, note.node_type
            ))
            .into());
        }

        Ok(Self::with_draft(service, note, true))
    }

    /// Start editing a new, unsaved note under `parent_id`
    pub async fn new_note(
        service: NodeService,
        parent_id: Option<&str>,
    ) -> Result<Self, NodeServiceError> {
        let note = service.create_note(parent_id).await?;
        Ok(Self::with_draft(service, note, false))
    }

    fn with_draft(service: NodeService, note: Node, persisted: bool) -> Self {
        Self {
            service,
            draft: Arc::new(Mutex::new(Draft {
                note,
                dirty: false,
                persisted,
            })),
            debounce: DEFAULT_AUTOSAVE_DEBOUNCE,
            pending: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Current working copy, including unsaved edits
    pub async fn note(&self) -> Node {
        self.draft.lock().await.note.clone()
    }

    /// Whether edits are waiting to be written
    pub async fn is_dirty(&self) -> bool {
        self.draft.lock().await.dirty
    }

    /// Replace the title and body and schedule a save
    pub async fn update_content(&mut self, title: &str, content: &str) {
        {
            let mut draft = self.draft.lock().await;
            draft.note.title = title.to_string();
            draft.note.content = Some(content.to_string());
            draft.dirty = true;
        }

        self.cancel_pending();

        let service = self.service.clone();
        let draft = Arc::clone(&self.draft);
        let debounce = self.debounce;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Err(e) = persist(&service, &draft).await {
                tracing::error!(error = %e, "Autosave failed");
            }
        }));
    }

    /// Cancel any scheduled save and write pending edits now
    ///
    /// # Returns
    ///
    /// The saved note, or `None` if there was nothing to write or the note
    /// has been deleted since it was opened
    pub async fn save_now(&mut self) -> Result<Option<Node>, NodeServiceError> {
        self.cancel_pending();
        persist(&self.service, &self.draft).await
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for NoteEditor {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Write the working copy if it has unsaved edits
async fn persist(
    service: &NodeService,
    draft: &Mutex<Draft>,
) -> Result<Option<Node>, NodeServiceError> {
    let mut draft = draft.lock().await;
    if !draft.dirty {
        return Ok(None);
    }

    let mut note = if draft.persisted {
        let id = draft.note.id.clone();
        let Some(mut stored) = service.get_node(&id).await? else {
            tracing::debug!(node_id = %id, "Note deleted, dropping edit");
            draft.dirty = false;
            return Ok(None);
        };
        stored.title = draft.note.title.clone();
        stored.content = draft.note.content.clone();
        stored
    } else {
        draft.note.clone()
    };

    note.modified_date = service.time_provider().now();
    service.upsert(note.clone()).await?;

    draft.note = note.clone();
    draft.dirty = false;
    draft.persisted = true;

    tracing::debug!(node_id = %note.id, "Saved note");
    Ok(Some(note))
}
