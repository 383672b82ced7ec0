//! Scan tree: the ordered hierarchy of groups and leaves the scanner walks.
//!
//! Trees are immutable once built. A keyboard or prediction change produces
//! a new tree; the scanner re-locates its cursor by node identity
//! ([`ScanTree::locate`]) rather than by position.

use std::collections::BTreeMap;
use std::fmt;

use crate::prediction::PredictionCandidate;
use crate::settings::{ActionSettings, ConfigError, KeyboardSettings, Settings};

pub const PREDICTIONS_GROUP: &str = "predictions";
pub const ACTIONS_GROUP: &str = "actions";
/// Name of the `[keyboard]` table when it does not set one.
pub const DEFAULT_KEYBOARD: &str = "main";

/// Stable identity of a node, unique among its siblings.
///
/// Keyboard nodes are identified by position (`row:2`, `key:2:4`), prediction
/// leaves by their word (`word:like`), so a rebuilt tree with the same layout
/// and candidates yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What selecting a leaf does. Closed set, matched exhaustively by the
/// session orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafAction {
    /// Insert text at the cursor (a character, a space, a newline).
    InsertText(String),
    /// Replace the word fragment with the candidate in this prediction slot.
    InsertPrediction { slot: usize },
    /// Delete the character before the cursor.
    Delete,
    CursorLeft,
    CursorRight,
    /// Show the named keyboard in place of the current one.
    SwitchKeyboard(String),
    Speak,
    Save,
    Load,
    /// Archive the current text and start over.
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanNode {
    Group {
        id: NodeId,
        label: String,
        children: Vec<ScanNode>,
    },
    Leaf {
        id: NodeId,
        label: String,
        action: LeafAction,
    },
}

impl ScanNode {
    /// Build a group. Returns `None` for an empty child list: a group
    /// always has at least one child.
    pub fn group(id: NodeId, label: impl Into<String>, children: Vec<ScanNode>) -> Option<Self> {
        if children.is_empty() {
            return None;
        }
        Some(Self::Group {
            id,
            label: label.into(),
            children,
        })
    }

    pub fn leaf(id: NodeId, label: impl Into<String>, action: LeafAction) -> Self {
        Self::Leaf {
            id,
            label: label.into(),
            action,
        }
    }

    pub fn id(&self) -> &NodeId {
        match self {
            Self::Group { id, .. } | Self::Leaf { id, .. } => id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Group { label, .. } | Self::Leaf { label, .. } => label,
        }
    }

    pub fn children(&self) -> &[ScanNode] {
        match self {
            Self::Group { children, .. } => children,
            Self::Leaf { .. } => &[],
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

/// Path from the root to a node, as child indices. The root itself is never
/// highlighted, so a cursor path always has at least one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanPath(Vec<usize>);

impl ScanPath {
    /// The root's first child.
    pub fn first() -> Self {
        Self(vec![0])
    }

    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Index of the node within its group.
    pub fn last(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    pub fn set_last(&mut self, index: usize) {
        if let Some(last) = self.0.last_mut() {
            *last = index;
        }
    }

    /// Descend to the given child of the current node.
    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    /// Climb one level. Never leaves the path empty.
    pub fn pop(&mut self) -> bool {
        if self.0.len() > 1 {
            self.0.pop();
            true
        } else {
            false
        }
    }

    fn parent_indices(&self) -> &[usize] {
        match self.0.split_last() {
            Some((_, parent)) => parent,
            None => &[],
        }
    }
}

impl fmt::Display for ScanPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("root must be a group")]
    RootIsLeaf,
    #[error("duplicate node id among siblings: {0}")]
    DuplicateId(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanTree {
    root: ScanNode,
}

impl ScanTree {
    /// Wrap a root group, checking sibling id uniqueness at every level.
    pub fn new(root: ScanNode) -> Result<Self, TreeError> {
        if !root.is_group() {
            return Err(TreeError::RootIsLeaf);
        }
        check_unique_ids(&root)?;
        Ok(Self { root })
    }

    /// Assemble the speller tree: prediction group (when there are
    /// candidates) followed by the layout nodes, which are reused unchanged.
    pub fn build(layout: &[ScanNode], candidates: &[PredictionCandidate]) -> Result<Self, TreeError> {
        let mut children = Vec::with_capacity(layout.len() + 1);
        if let Some(group) = prediction_group(candidates) {
            children.push(group);
        }
        children.extend(layout.iter().cloned());
        let root = ScanNode::group(NodeId::new("root"), "", children).ok_or(TreeError::RootIsLeaf)?;
        Self::new(root)
    }

    pub fn root(&self) -> &ScanNode {
        &self.root
    }

    pub fn resolve(&self, path: &ScanPath) -> Option<&ScanNode> {
        resolve_indices(&self.root, path.indices())
    }

    /// Number of siblings in the group containing `path`'s node.
    pub fn group_len(&self, path: &ScanPath) -> Option<usize> {
        let parent = resolve_indices(&self.root, path.parent_indices())?;
        match parent {
            ScanNode::Group { children, .. } => Some(children.len()),
            ScanNode::Leaf { .. } => None,
        }
    }

    /// Node ids from the root's child down to `path`'s node.
    pub fn id_chain(&self, path: &ScanPath) -> Option<Vec<NodeId>> {
        let mut node = &self.root;
        let mut chain = Vec::with_capacity(path.depth());
        for &i in path.indices() {
            node = node.children().get(i)?;
            chain.push(node.id().clone());
        }
        Some(chain)
    }

    /// Find the path of the node reached by following `chain` by id.
    pub fn locate(&self, chain: &[NodeId]) -> Option<ScanPath> {
        if chain.is_empty() {
            return None;
        }
        let mut node = &self.root;
        let mut indices = Vec::with_capacity(chain.len());
        for id in chain {
            let (i, child) = node
                .children()
                .iter()
                .enumerate()
                .find(|(_, c)| c.id() == id)?;
            indices.push(i);
            node = child;
        }
        Some(ScanPath(indices))
    }
}

fn resolve_indices<'a>(root: &'a ScanNode, indices: &[usize]) -> Option<&'a ScanNode> {
    let mut node = root;
    for &i in indices {
        node = node.children().get(i)?;
    }
    Some(node)
}

fn check_unique_ids(node: &ScanNode) -> Result<(), TreeError> {
    let children = node.children();
    for (i, child) in children.iter().enumerate() {
        if children[..i].iter().any(|c| c.id() == child.id()) {
            return Err(TreeError::DuplicateId(child.id().clone()));
        }
        check_unique_ids(child)?;
    }
    Ok(())
}

fn prediction_group(candidates: &[PredictionCandidate]) -> Option<ScanNode> {
    let mut seen: Vec<&str> = Vec::with_capacity(candidates.len());
    let mut leaves = Vec::with_capacity(candidates.len());
    for (slot, c) in candidates.iter().enumerate() {
        if c.word.is_empty() || seen.contains(&c.word.as_str()) {
            continue;
        }
        seen.push(&c.word);
        leaves.push(ScanNode::leaf(
            NodeId::new(format!("word:{}", c.word)),
            c.word.clone(),
            LeafAction::InsertPrediction { slot },
        ));
    }
    ScanNode::group(NodeId::new(PREDICTIONS_GROUP), "predictions", leaves)
}

// ---------------------------------------------------------------------------
// Keyboard layout
// ---------------------------------------------------------------------------

/// One selectable key: what is shown and what it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub label: String,
    pub action: LeafAction,
}

impl KeySpec {
    /// Parse a key token from the settings file. Plain text inserts itself;
    /// `{name}` tokens name special keys.
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        if token.is_empty() {
            return Err(ConfigError::invalid("keyboard", "empty key token"));
        }
        let named = token
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'));
        let Some(name) = named else {
            return Ok(Self {
                label: token.to_string(),
                action: LeafAction::InsertText(token.to_string()),
            });
        };
        Self::named(name).ok_or_else(|| {
            ConfigError::invalid("keyboard", format!("unknown key token {token}"))
        })
    }

    /// Special keys by name, as used in `{name}` tokens and the action column.
    /// `switch:<keyboard>` names a keyboard switch; the target is checked by
    /// [`KeyboardSet::from_settings`].
    pub fn named(name: &str) -> Option<Self> {
        if let Some(target) = name.strip_prefix("switch:") {
            if target.is_empty() {
                return None;
            }
            return Some(Self {
                label: target.to_string(),
                action: LeafAction::SwitchKeyboard(target.to_string()),
            });
        }
        let (label, action) = match name {
            "space" => ("␣", LeafAction::InsertText(" ".to_string())),
            "newline" => ("⏎", LeafAction::InsertText("\n".to_string())),
            "delete" => ("⌫", LeafAction::Delete),
            "left" => ("◀", LeafAction::CursorLeft),
            "right" => ("▶", LeafAction::CursorRight),
            "speak" => ("speak", LeafAction::Speak),
            "save" => ("save", LeafAction::Save),
            "load" => ("load", LeafAction::Load),
            "clear" => ("clear", LeafAction::Clear),
            _ => return None,
        };
        Some(Self {
            label: label.to_string(),
            action,
        })
    }
}

/// Keyboard rows plus the action column, parsed from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardLayout {
    pub rows: Vec<Vec<KeySpec>>,
    pub actions: Vec<KeySpec>,
}

impl KeyboardLayout {
    pub fn from_settings(
        keyboard: &KeyboardSettings,
        actions: &ActionSettings,
    ) -> Result<Self, ConfigError> {
        let rows = keyboard
            .rows
            .iter()
            .map(|row| row.iter().map(|t| KeySpec::parse(t)).collect())
            .collect::<Result<Vec<Vec<KeySpec>>, _>>()?;
        let actions = actions
            .column
            .iter()
            .map(|name| {
                KeySpec::named(name).ok_or_else(|| {
                    ConfigError::invalid("actions.column", format!("unknown action {name}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows, actions })
    }

    /// Scan nodes for the layout: one group per row, then the action column.
    /// Empty rows and an empty action column produce no group.
    pub fn nodes(&self) -> Vec<ScanNode> {
        let mut nodes = Vec::with_capacity(self.rows.len() + 1);
        for (r, row) in self.rows.iter().enumerate() {
            let keys = row
                .iter()
                .enumerate()
                .map(|(c, k)| {
                    ScanNode::leaf(
                        NodeId::new(format!("key:{r}:{c}")),
                        k.label.clone(),
                        k.action.clone(),
                    )
                })
                .collect();
            let label: String = row.iter().map(|k| k.label.as_str()).collect();
            if let Some(group) = ScanNode::group(NodeId::new(format!("row:{r}")), label, keys) {
                nodes.push(group);
            }
        }
        let actions = self
            .actions
            .iter()
            .enumerate()
            .map(|(i, k)| {
                ScanNode::leaf(
                    NodeId::new(format!("action:{i}")),
                    k.label.clone(),
                    k.action.clone(),
                )
            })
            .collect();
        if let Some(group) = ScanNode::group(NodeId::new(ACTIONS_GROUP), "actions", actions) {
            nodes.push(group);
        }
        nodes
    }

    /// Keyboards this layout can switch to.
    pub fn switch_targets(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .flatten()
            .chain(&self.actions)
            .filter_map(|k| match &k.action {
                LeafAction::SwitchKeyboard(target) => Some(target.as_str()),
                _ => None,
            })
    }
}

/// All configured keyboards by name, plus the one shown at start.
///
/// Every keyboard shares the action column. Switch keys may only name
/// keyboards in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardSet {
    initial: String,
    layouts: BTreeMap<String, KeyboardLayout>,
}

impl KeyboardSet {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let initial = settings
            .keyboard
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_KEYBOARD.to_string());
        let mut layouts = BTreeMap::new();
        layouts.insert(
            initial.clone(),
            KeyboardLayout::from_settings(&settings.keyboard, &settings.actions)?,
        );
        for (name, keyboard) in &settings.keyboards {
            if keyboard.name.is_some() {
                return Err(ConfigError::invalid(
                    format!("keyboards.{name}.name"),
                    "only [keyboard] takes a name",
                ));
            }
            if layouts.contains_key(name) {
                return Err(ConfigError::invalid(
                    format!("keyboards.{name}"),
                    "same name as [keyboard]",
                ));
            }
            layouts.insert(
                name.clone(),
                KeyboardLayout::from_settings(keyboard, &settings.actions)?,
            );
        }
        for (name, layout) in &layouts {
            if let Some(target) = layout.switch_targets().find(|t| !layouts.contains_key(*t)) {
                return Err(ConfigError::invalid(
                    format!("keyboard {name}"),
                    format!("switch to unknown keyboard {target}"),
                ));
            }
        }
        Ok(Self { initial, layouts })
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn get(&self, name: &str) -> Option<&KeyboardLayout> {
        self.layouts.get(name)
    }

    pub fn initial_layout(&self) -> Option<&KeyboardLayout> {
        self.get(&self.initial)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }
}
