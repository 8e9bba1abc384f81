pub mod canvas;
pub mod diagnostics;
pub mod engine;
pub mod parser;
pub mod value;

pub use canvas::{Block, BlockHandle, BlockKind, Canvas, CanvasSnapshot, RouteError, RoutedWrite};
pub use engine::{EngineError, RunOutcome, run, run_block};
pub use value::Value;
