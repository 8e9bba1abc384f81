//! The block canvas: an addressed collection of typed blocks with named,
//! writable ports. Routing (`roc target.port(value)`) resolves against block
//! names registered here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

use crate::value::Value;

/// Generational handle into the canvas.
/// Allows safe reuse of slots with use-after-free detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BlockHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    ThincCode,
    PythonCode,
    Table,
    Console,
    VarGlyph,
}

impl BlockKind {
    /// Ports a block of this kind exposes to routing.
    pub fn ports(&self) -> &'static [(&'static str, PortKind)] {
        match self {
            BlockKind::Console => &[("line", PortKind::Stream), ("clear", PortKind::Value)],
            BlockKind::Table => &[("rows", PortKind::Value), ("cell", PortKind::Value)],
            BlockKind::VarGlyph => &[("value", PortKind::Value)],
            BlockKind::ThincCode | BlockKind::PythonCode => &[("input", PortKind::Value)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Last write wins.
    Value,
    /// Writes append in order.
    Stream,
}

/// State of a single named port.
/// The revision counter bumps on every applied write so observers can
/// detect change without comparing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    Value { current: Value, revision: u64 },
    Stream { lines: Vec<Value>, revision: u64 },
}

impl PortState {
    fn new(kind: PortKind) -> Self {
        match kind {
            PortKind::Value => PortState::Value { current: Value::Unit, revision: 0 },
            PortKind::Stream => PortState::Stream { lines: Vec::new(), revision: 0 },
        }
    }

    pub fn revision(&self) -> u64 {
        match self {
            PortState::Value { revision, .. } | PortState::Stream { revision, .. } => *revision,
        }
    }
}

/// Anchor position of a block on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Anchor {
    pub row: u32,
    pub column: u32,
}

/// An addressable unit on a page: code, table, console, or variable display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: Ulid,
    /// Route target name, unique per canvas.
    pub name: String,
    pub kind: BlockKind,
    /// Content payload: source text for code blocks, notes otherwise.
    pub content: String,
    pub anchor: Anchor,
    ports: IndexMap<String, PortState>,
}

impl Block {
    pub fn new(kind: BlockKind, name: impl Into<String>) -> Self {
        let ports = kind
            .ports()
            .iter()
            .map(|(name, port_kind)| ((*name).to_owned(), PortState::new(*port_kind)))
            .collect();
        Self {
            id: Ulid::new(),
            name: name.into(),
            kind,
            content: String::new(),
            anchor: Anchor::default(),
            ports,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_anchor(mut self, row: u32, column: u32) -> Self {
        self.anchor = Anchor { row, column };
        self
    }

    pub fn port(&self, name: &str) -> Option<&PortState> {
        self.ports.get(name)
    }

    pub fn has_port(&self, name: &str) -> bool {
        self.ports.contains_key(name)
    }

    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(String::as_str)
    }

    /// Apply a single routed write to a port. The caller has already
    /// validated that the port exists.
    fn write(&mut self, port: &str, value: Value) {
        // Console `clear` resets the `line` stream as well.
        if self.kind == BlockKind::Console && port == "clear" {
            if let Some(PortState::Stream { lines, revision }) = self.ports.get_mut("line") {
                lines.clear();
                *revision += 1;
            }
        }
        match self.ports.get_mut(port) {
            Some(PortState::Value { current, revision }) => {
                *current = value;
                *revision += 1;
            }
            Some(PortState::Stream { lines, revision }) => {
                lines.push(value);
                *revision += 1;
            }
            None => unreachable!("write to unvalidated port '{port}'"),
        }
    }
}

/// A value update routed to a named port of a named block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedWrite {
    pub target: String,
    pub port: String,
    pub value: Value,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown target block '{name}'")]
    UnknownTarget { name: String },
    #[error("block '{block}' has no port '{port}'")]
    UnknownPort { block: String, port: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("a block named '{name}' already exists")]
    DuplicateName { name: String },
}

struct Slot {
    generation: u32,
    block: Option<Block>,
}

/// Ordered collection of blocks with generational slots and name lookup.
#[derive(Default)]
pub struct Canvas {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block, returning its handle. Names must be unique because
    /// routing resolves by name.
    pub fn insert(&mut self, block: Block) -> Result<BlockHandle, CanvasError> {
        if self.resolve(&block.name).is_some() {
            return Err(CanvasError::DuplicateName { name: block.name });
        }
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.block = Some(block);
            Ok(BlockHandle { index, generation: slot.generation })
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, block: Some(block) });
            Ok(BlockHandle { index, generation: 0 })
        }
    }

    /// Remove a block, making its slot available for reuse.
    /// Stale handles to the slot are invalidated by the generation bump.
    pub fn remove(&mut self, handle: BlockHandle) -> Option<Block> {
        if !self.is_valid(handle) {
            return None;
        }
        let slot = &mut self.slots[handle.index as usize];
        slot.generation += 1;
        self.free_list.push(handle.index);
        slot.block.take()
    }

    pub fn is_valid(&self, handle: BlockHandle) -> bool {
        (handle.index as usize) < self.slots.len()
            && self.slots[handle.index as usize].generation == handle.generation
            && self.slots[handle.index as usize].block.is_some()
    }

    pub fn get(&self, handle: BlockHandle) -> Option<&Block> {
        if self.is_valid(handle) {
            self.slots[handle.index as usize].block.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, handle: BlockHandle) -> Option<&mut Block> {
        if self.is_valid(handle) {
            self.slots[handle.index as usize].block.as_mut()
        } else {
            None
        }
    }

    /// Resolve a route target name to a handle.
    pub fn resolve(&self, name: &str) -> Option<BlockHandle> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let block = slot.block.as_ref()?;
            (block.name == name).then_some(BlockHandle {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.slots.iter().filter_map(|slot| slot.block.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.block.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a batch of routed writes atomically: every target and port is
    /// validated before any write lands, so a failing batch leaves the
    /// canvas untouched.
    pub fn apply(&mut self, writes: &[RoutedWrite]) -> Result<(), RouteError> {
        let mut resolved = Vec::with_capacity(writes.len());
        for write in writes {
            let handle = self
                .resolve(&write.target)
                .ok_or_else(|| RouteError::UnknownTarget { name: write.target.clone() })?;
            let block = self.get(handle).expect("resolved handle is valid");
            if !block.has_port(&write.port) {
                return Err(RouteError::UnknownPort {
                    block: write.target.clone(),
                    port: write.port.clone(),
                });
            }
            resolved.push(handle);
        }
        for (write, handle) in writes.iter().zip(resolved) {
            let block = self.get_mut(handle).expect("resolved handle is valid");
            block.write(&write.port, write.value.clone());
        }
        Ok(())
    }
}

/// Serializable canvas state, in slot order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub blocks: Vec<Block>,
}

impl CanvasSnapshot {
    pub fn capture(canvas: &Canvas) -> Self {
        Self { blocks: canvas.blocks().cloned().collect() }
    }

    pub fn restore(self) -> Result<Canvas, CanvasError> {
        let mut canvas = Canvas::new();
        for block in self.blocks {
            canvas.insert(block)?;
        }
        Ok(canvas)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_resolve_remove() {
        let mut canvas = Canvas::new();
        let console = canvas.insert(Block::new(BlockKind::Console, "console")).unwrap();
        let glyph = canvas.insert(Block::new(BlockKind::VarGlyph, "total")).unwrap();

        assert_eq!(canvas.resolve("console"), Some(console));
        assert_eq!(canvas.resolve("total"), Some(glyph));
        assert_eq!(canvas.len(), 2);

        canvas.remove(console);
        assert!(!canvas.is_valid(console));
        assert_eq!(canvas.resolve("console"), None);
    }

    #[test]
    fn stale_handle_detected_after_slot_reuse() {
        let mut canvas = Canvas::new();
        let first = canvas.insert(Block::new(BlockKind::Console, "console")).unwrap();
        canvas.remove(first);
        let second = canvas.insert(Block::new(BlockKind::Table, "table")).unwrap();

        assert_eq!(second.index, first.index);
        assert!(!canvas.is_valid(first));
        assert!(canvas.is_valid(second));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut canvas = Canvas::new();
        canvas.insert(Block::new(BlockKind::Console, "console")).unwrap();
        let error = canvas.insert(Block::new(BlockKind::Table, "console")).unwrap_err();
        assert_eq!(error, CanvasError::DuplicateName { name: "console".to_owned() });
    }

    #[test]
    fn value_port_last_write_wins() {
        let mut canvas = Canvas::new();
        canvas.insert(Block::new(BlockKind::VarGlyph, "total")).unwrap();

        let writes = vec![
            RoutedWrite {
                target: "total".to_owned(),
                port: "value".to_owned(),
                value: Value::Number(1.0),
            },
            RoutedWrite {
                target: "total".to_owned(),
                port: "value".to_owned(),
                value: Value::Number(2.0),
            },
        ];
        canvas.apply(&writes).unwrap();

        let handle = canvas.resolve("total").unwrap();
        let port = canvas.get(handle).unwrap().port("value").unwrap();
        assert_eq!(
            port,
            &PortState::Value { current: Value::Number(2.0), revision: 2 }
        );
    }

    #[test]
    fn console_line_appends_and_clear_resets() {
        let mut canvas = Canvas::new();
        canvas.insert(Block::new(BlockKind::Console, "console")).unwrap();

        canvas
            .apply(&[
                RoutedWrite {
                    target: "console".to_owned(),
                    port: "line".to_owned(),
                    value: Value::Text("first".to_owned()),
                },
                RoutedWrite {
                    target: "console".to_owned(),
                    port: "line".to_owned(),
                    value: Value::Text("second".to_owned()),
                },
            ])
            .unwrap();

        let handle = canvas.resolve("console").unwrap();
        match canvas.get(handle).unwrap().port("line").unwrap() {
            PortState::Stream { lines, revision } => {
                assert_eq!(lines.len(), 2);
                assert_eq!(*revision, 2);
            }
            other => panic!("Expected Stream port, got {other:?}"),
        }

        canvas
            .apply(&[RoutedWrite {
                target: "console".to_owned(),
                port: "clear".to_owned(),
                value: Value::Unit,
            }])
            .unwrap();

        match canvas.get(handle).unwrap().port("line").unwrap() {
            PortState::Stream { lines, revision } => {
                assert!(lines.is_empty());
                assert_eq!(*revision, 3);
            }
            other => panic!("Expected Stream port, got {other:?}"),
        }
    }

    #[test]
    fn failing_batch_applies_nothing() {
        let mut canvas = Canvas::new();
        canvas.insert(Block::new(BlockKind::VarGlyph, "total")).unwrap();

        let writes = vec![
            RoutedWrite {
                target: "total".to_owned(),
                port: "value".to_owned(),
                value: Value::Number(1.0),
            },
            RoutedWrite {
                target: "missing".to_owned(),
                port: "value".to_owned(),
                value: Value::Number(2.0),
            },
        ];
        let error = canvas.apply(&writes).unwrap_err();
        assert_eq!(error, RouteError::UnknownTarget { name: "missing".to_owned() });

        let handle = canvas.resolve("total").unwrap();
        let port = canvas.get(handle).unwrap().port("value").unwrap();
        assert_eq!(port.revision(), 0);
    }

    #[test]
    fn unknown_port_is_distinguishable() {
        let mut canvas = Canvas::new();
        canvas.insert(Block::new(BlockKind::VarGlyph, "total")).unwrap();

        let error = canvas
            .apply(&[RoutedWrite {
                target: "total".to_owned(),
                port: "line".to_owned(),
                value: Value::Unit,
            }])
            .unwrap_err();
        assert_eq!(
            error,
            RouteError::UnknownPort { block: "total".to_owned(), port: "line".to_owned() }
        );
    }

    #[test]
    fn snapshot_round_trip() {
        let mut canvas = Canvas::new();
        canvas
            .insert(
                Block::new(BlockKind::ThincCode, "script")
                    .with_content("roc total.value(1)")
                    .with_anchor(0, 0),
            )
            .unwrap();
        canvas.insert(Block::new(BlockKind::VarGlyph, "total").with_anchor(1, 0)).unwrap();

        let json = CanvasSnapshot::capture(&canvas).to_json().unwrap();
        let restored = CanvasSnapshot::from_json(&json).unwrap().restore().unwrap();

        assert_eq!(restored.len(), 2);
        let script = restored.get(restored.resolve("script").unwrap()).unwrap();
        assert_eq!(script.kind, BlockKind::ThincCode);
        assert_eq!(script.content, "roc total.value(1)");
    }
}
