//! Watch expressions, re-evaluated at every suspension. Tracks the
//! previous value so the debugger can report a change direction.

use crate::value::Value;

use super::eval::{self, DebugContext, EvalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Same,
}

impl Direction {
    pub fn glyph(self) -> &'static str {
        match self {
            Direction::Up => "\u{2191}",
            Direction::Down => "\u{2193}",
            Direction::Same => "=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Watch {
    pub expr: String,
    pub previous: Option<Value>,
    pub change_count: u32,
}

impl Watch {
    pub fn new(expr: String) -> Self {
        Watch {
            expr,
            previous: None,
            change_count: 0,
        }
    }
}

/// Result of re-evaluating a watch: either a directional report or an
/// evaluation error, which does not disable the watch.
#[derive(Debug, Clone)]
pub enum WatchReport {
    Value { current: Value, direction: Direction },
    Error(EvalError),
}

impl Watch {
    pub fn refresh(&mut self, ctx: &DebugContext) -> WatchReport {
        match eval::evaluate(&self.expr, ctx) {
            Ok(current) => {
                let direction = match &self.previous {
                    None => Direction::Same,
                    Some(prev) => {
                        if *prev != current {
                            self.change_count += 1;
                        }
                        compare_numeric_or_eq(prev, &current)
                    }
                };
                self.previous = Some(current.clone());
                WatchReport::Value { current, direction }
            }
            Err(e) => WatchReport::Error(e),
        }
    }
}

fn compare_numeric_or_eq(prev: &Value, current: &Value) -> Direction {
    match (prev.as_f64(), current.as_f64()) {
        (Some(a), Some(b)) => {
            if b > a {
                Direction::Up
            } else if b < a {
                Direction::Down
            } else {
                Direction::Same
            }
        }
        _ => {
            if prev == current {
                Direction::Same
            } else {
                Direction::Up
            }
        }
    }
}
