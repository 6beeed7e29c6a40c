//! Salvage for model output that stopped mid-document.
//!
//! A forward scan records every offset at which the text so far ends right
//! after a complete value, together with the closing brackets needed to
//! balance the containers still open there. Recovery tries those cut points
//! from the latest backwards until one decodes.

use std::collections::VecDeque;

use serde_json::Value;

/// How many of the latest cut points are kept during a scan.
const MAX_CUT_POINTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    Key,
    Colon,
    Value,
    Separator,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    container: Container,
    expect: Expect,
}

/// A prefix of the scanned text that ends right after a complete value.
#[derive(Debug, Clone, PartialEq)]
pub struct CutPoint {
    pub offset: usize,
    pub closers: String,
}

#[derive(Debug, Default)]
pub struct Scan {
    /// Oldest first.
    pub cut_points: VecDeque<CutPoint>,
    /// Length of the text that belongs to the document: everything before a
    /// dangling unterminated string literal, or the whole text.
    pub effective_len: usize,
}

/// A decoded prefix of a truncated document.
#[derive(Debug)]
pub struct Salvage {
    pub value: Value,
    pub retained_len: usize,
    pub effective_len: usize,
}

struct Scanner {
    stack: Vec<Frame>,
    cut_points: VecDeque<CutPoint>,
    root_done: bool,
}

impl Scanner {
    fn closers(&self) -> String {
        self.stack
            .iter()
            .rev()
            .map(|f| match f.container {
                Container::Object => '}',
                Container::Array => ']',
            })
            .collect()
    }

    fn record(&mut self, offset: usize) {
        if self.cut_points.len() == MAX_CUT_POINTS {
            self.cut_points.pop_front();
        }
        let closers = self.closers();
        self.cut_points.push_back(CutPoint { offset, closers });
    }

    /// True when the next token is an object key.
    fn at_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame {
                container: Container::Object,
                expect: Expect::Key
            })
        )
    }

    /// A key finished; the object now waits for `:`.
    fn key_done(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.expect = Expect::Colon;
        }
    }

    /// A value finished at `offset` (exclusive).
    fn value_done(&mut self, offset: usize) {
        match self.stack.last_mut() {
            Some(top) => {
                top.expect = Expect::Separator;
                self.record(offset);
            }
            None => {
                self.root_done = true;
                self.record(offset);
            }
        }
    }
}

/// Scans `text[..limit]` for cut points.
pub fn scan(text: &str, limit: usize) -> Scan {
    let bytes = text.as_bytes();
    let limit = limit.min(bytes.len());

    let mut scanner = Scanner {
        stack: Vec::new(),
        cut_points: VecDeque::new(),
        root_done: false,
    };
    // (start offset, is key)
    let mut string: Option<(usize, bool)> = None;
    let mut escaped = false;
    let mut literal: Option<bool> = None;

    let mut i = 0;
    while i < limit {
        let b = bytes[i];

        if let Some((_, is_key)) = string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                string = None;
                if is_key {
                    scanner.key_done();
                } else {
                    scanner.value_done(i + 1);
                }
            }
            i += 1;
            continue;
        }

        if let Some(is_key) = literal {
            if !is_delimiter(b) {
                i += 1;
                continue;
            }
            literal = None;
            if is_key {
                scanner.key_done();
            } else {
                scanner.value_done(i);
            }
        }

        if scanner.root_done && !b.is_ascii_whitespace() {
            break;
        }

        match b {
            b'"' => string = Some((i, scanner.at_key())),
            b'{' | b'[' => {
                let container = if b == b'{' {
                    Container::Object
                } else {
                    Container::Array
                };
                let expect = if container == Container::Object {
                    Expect::Key
                } else {
                    Expect::Value
                };
                let is_root = scanner.stack.is_empty();
                scanner.stack.push(Frame { container, expect });
                if is_root {
                    scanner.record(i + 1);
                }
            }
            b'}' | b']' => {
                let wanted = if b == b'}' {
                    Container::Object
                } else {
                    Container::Array
                };
                match scanner.stack.pop() {
                    Some(frame) if frame.container == wanted => scanner.value_done(i + 1),
                    _ => break,
                }
            }
            b':' => {
                if let Some(top) = scanner.stack.last_mut() {
                    top.expect = Expect::Value;
                }
            }
            b',' => {
                if let Some(top) = scanner.stack.last_mut() {
                    top.expect = match top.container {
                        Container::Object => Expect::Key,
                        Container::Array => Expect::Value,
                    };
                }
            }
            b if b.is_ascii_whitespace() => {}
            _ => literal = Some(scanner.at_key()),
        }
        i += 1;
    }

    let effective_len = match string {
        Some((start, _)) => start,
        None => text.len(),
    };

    Scan {
        cut_points: scanner.cut_points,
        effective_len,
    }
}

/// Tries cut points from the latest backwards and returns the first prefix
/// that decodes once its open containers are closed.
pub fn salvage(text: &str, limit: usize) -> Option<Salvage> {
    let scan = scan(text, limit);

    scan.cut_points.iter().rev().find_map(|cut| {
        let candidate = format!("{}{}", &text[..cut.offset], cut.closers);
        serde_json::from_str::<Value>(&candidate)
            .ok()
            .map(|value| Salvage {
                value,
                retained_len: cut.offset,
                effective_len: scan.effective_len,
            })
    })
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b',' | b'}' | b']' | b':')
}
