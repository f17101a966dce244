//! SlideKit Core Library
//!
//! Document store and canvas interaction engine for the SlideKit slide
//! editor: percentage-based slide documents, transactional undo/redo,
//! drag/resize gestures and snap guides.

pub mod config;
pub mod coords;
pub mod document;
pub mod editor;
pub mod input;
pub mod interaction;
pub mod layout;
pub mod render;
pub mod selection;
pub mod snap;
pub mod storage;
pub mod store;

pub use config::EditorConfig;
pub use coords::CanvasView;
pub use document::{Element, ElementKind, ElementStyle, Group, Presentation, Slide, Width};
pub use editor::{Editor, EditorError, EditorResult};
pub use input::{KeyEvent, Modifiers, MouseButton, PointerEvent, PointerTarget};
pub use interaction::{GestureMode, GestureOutcome, InteractionController};
pub use layout::{AlignKind, DistributeDirection};
pub use render::{HeadlessSurface, PreviewTransform, RenderSurface};
pub use selection::{ElementSnapshot, HandleKind};
pub use snap::{Guide, SnapEngine, SnapResult};
pub use storage::{AutoSaveManager, MemoryStorage, NoPersistence, Persistence, Storage};
pub use store::{DocumentStore, SetOptions, StatePath, StateValue, StoreError};
