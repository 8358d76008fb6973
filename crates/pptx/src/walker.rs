//! Structural walk over slide XML.
//!
//! The reader and the writer both feed element open/close events through
//! a `SlideWalker`, so shape, paragraph and run indices are assigned by a
//! single piece of code. Indices count every element of the kind, empty or
//! not:
//!
//! - shapes: `sp`, `pic`, `grpSp`, `graphicFrame`, `cxnSp`, `contentPart`
//!   children of `spTree` (or of a group, for grouped shapes)
//! - paragraphs: `a:p` children of a shape's own `txBody`
//! - runs: `a:r` children of a paragraph (fields and breaks are not runs)

use deck_core::ShapeKind;

/// Location of a run's text element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunAddress {
    /// Shape index within `spTree`, followed by child indices within groups.
    pub shape_path: Vec<usize>,
    pub paragraph_index: usize,
    pub run_index: usize,
}

impl RunAddress {
    /// The top-level shape index, if the run is not inside a group.
    pub fn top_level_shape(&self) -> Option<usize> {
        match self.shape_path.as_slice() {
            [index] => Some(*index),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Frame {
    Other,
    ShapeTree { next_shape: usize },
    Shape {
        path: Vec<usize>,
        kind: ShapeKind,
        next_shape: usize,
    },
    TextBody { next_paragraph: usize },
    Paragraph { index: usize, next_run: usize },
    Run { index: usize },
    RunText(RunAddress),
}

/// What an opened element turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Other,
    Shape { path: Vec<usize>, kind: ShapeKind },
    TextBody,
    Paragraph { index: usize },
    Run { index: usize },
    RunText(RunAddress),
}

/// Tracks where in the shape tree the current element sits.
#[derive(Debug, Default)]
pub struct SlideWalker {
    stack: Vec<Frame>,
}

impl SlideWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an opened element by its local name.
    pub fn enter(&mut self, local: &[u8]) -> Node {
        let (frame, node) = self.classify(local);
        self.stack.push(frame);
        node
    }

    /// Register the end of the most recently opened element.
    pub fn leave(&mut self) -> Node {
        match self.stack.pop() {
            Some(Frame::Shape { path, kind, .. }) => Node::Shape { path, kind },
            Some(Frame::TextBody { .. }) => Node::TextBody,
            Some(Frame::Paragraph { index, .. }) => Node::Paragraph { index },
            Some(Frame::Run { index }) => Node::Run { index },
            Some(Frame::RunText(address)) => Node::RunText(address),
            _ => Node::Other,
        }
    }

    /// Whether the walker is inside a run's `a:t` element.
    pub fn in_run_text(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::RunText(_)))
    }

    fn classify(&mut self, local: &[u8]) -> (Frame, Node) {
        if local == b"t" && matches!(self.stack.last(), Some(Frame::Run { .. })) {
            let address = self.current_run_address();
            return (Frame::RunText(address.clone()), Node::RunText(address));
        }

        let shape_kind = ShapeKind::from_local_name(local);
        let in_shape_tree = self.in_shape_tree();

        match self.stack.last_mut() {
            Some(Frame::ShapeTree { next_shape }) if shape_kind.is_some() => {
                let index = *next_shape;
                *next_shape += 1;
                Self::shape(vec![index], shape_kind)
            }
            Some(Frame::Shape {
                path,
                kind: ShapeKind::Group,
                next_shape,
            }) if shape_kind.is_some() => {
                let mut child = path.clone();
                child.push(*next_shape);
                *next_shape += 1;
                Self::shape(child, shape_kind)
            }
            Some(Frame::Shape {
                kind: ShapeKind::AutoShape,
                ..
            }) if local == b"txBody" => (Frame::TextBody { next_paragraph: 0 }, Node::TextBody),
            Some(Frame::TextBody { next_paragraph }) if local == b"p" => {
                let index = *next_paragraph;
                *next_paragraph += 1;
                (
                    Frame::Paragraph { index, next_run: 0 },
                    Node::Paragraph { index },
                )
            }
            Some(Frame::Paragraph { next_run, .. }) if local == b"r" => {
                let index = *next_run;
                *next_run += 1;
                (Frame::Run { index }, Node::Run { index })
            }
            _ if local == b"spTree" && !in_shape_tree => {
                (Frame::ShapeTree { next_shape: 0 }, Node::Other)
            }
            _ => (Frame::Other, Node::Other),
        }
    }

    fn shape(path: Vec<usize>, kind: Option<ShapeKind>) -> (Frame, Node) {
        let kind = kind.unwrap_or(ShapeKind::AutoShape);
        (
            Frame::Shape {
                path: path.clone(),
                kind,
                next_shape: 0,
            },
            Node::Shape { path, kind },
        )
    }

    fn in_shape_tree(&self) -> bool {
        self.stack
            .iter()
            .any(|f| matches!(f, Frame::ShapeTree { .. }))
    }

    /// Address of the run on top of the stack (shape, text body, paragraph, run).
    fn current_run_address(&self) -> RunAddress {
        let mut address = RunAddress {
            shape_path: Vec::new(),
            paragraph_index: 0,
            run_index: 0,
        };
        for frame in self.stack.iter().rev() {
            match frame {
                Frame::Run { index } => address.run_index = *index,
                Frame::Paragraph { index, .. } => address.paragraph_index = *index,
                Frame::Shape { path, .. } => {
                    address.shape_path = path.clone();
                    break;
                }
                _ => {}
            }
        }
        address
    }
}
