//! Incremental splitter for `<thinking>`/`<think>` blocks in model text.
//!
//! Tags may be split across chunk boundaries, so a possible partial tag at
//! the end of a chunk is held back until the next chunk decides it.

const OPEN_TAGS: [(&str, &str); 2] = [("<thinking>", "</thinking>"), ("<think>", "</think>")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Answer(String),
    Reasoning(String),
}

#[derive(Debug, Default)]
pub struct ThinkingSplitter {
    pending: String,
    /// Close tag of the block we are inside, if any.
    close_tag: Option<&'static str>,
    /// Drop leading whitespace of the answer right after a block closes.
    trim_next_answer: bool,
}

impl ThinkingSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<Segment> {
        self.pending.push_str(chunk);
        let mut out = Vec::new();

        loop {
            match self.close_tag {
                None => {
                    let open = OPEN_TAGS
                        .iter()
                        .filter_map(|(open, close)| {
                            self.pending.find(open).map(|pos| (pos, *open, *close))
                        })
                        .min_by_key(|(pos, _, _)| *pos);

                    if let Some((pos, open, close)) = open {
                        let before: String = self.pending.drain(..pos).collect();
                        self.push_answer(before, &mut out);
                        self.pending.drain(..open.len());
                        self.close_tag = Some(close);
                        continue;
                    }

                    let keep = partial_suffix_len(&self.pending, OPEN_TAGS.iter().map(|(o, _)| *o));
                    let ready: String = self.pending.drain(..self.pending.len() - keep).collect();
                    self.push_answer(ready, &mut out);
                    break;
                }
                Some(close) => {
                    if let Some(pos) = self.pending.find(close) {
                        let inside: String = self.pending.drain(..pos).collect();
                        push_reasoning(inside, &mut out);
                        self.pending.drain(..close.len());
                        self.close_tag = None;
                        self.trim_next_answer = true;
                        continue;
                    }

                    let keep = partial_suffix_len(&self.pending, std::iter::once(close));
                    let ready: String = self.pending.drain(..self.pending.len() - keep).collect();
                    push_reasoning(ready, &mut out);
                    break;
                }
            }
        }

        out
    }

    /// Flush whatever is held back. An unclosed block stays reasoning.
    pub fn finish(&mut self) -> Vec<Segment> {
        let rest = std::mem::take(&mut self.pending);
        let mut out = Vec::new();
        if self.close_tag.take().is_some() {
            push_reasoning(rest, &mut out);
        } else {
            self.push_answer(rest, &mut out);
        }
        out
    }

    fn push_answer(&mut self, mut text: String, out: &mut Vec<Segment>) {
        if self.trim_next_answer {
            let trimmed = text.trim_start();
            if trimmed.is_empty() {
                return;
            }
            text = trimmed.to_string();
            self.trim_next_answer = false;
        }
        if !text.is_empty() {
            out.push(Segment::Answer(text));
        }
    }
}

fn push_reasoning(text: String, out: &mut Vec<Segment>) {
    if !text.is_empty() {
        out.push(Segment::Reasoning(text));
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of a tag.
fn partial_suffix_len<'a>(text: &str, tags: impl Iterator<Item = &'a str> + Clone) -> usize {
    let longest = tags.clone().map(str::len).max().unwrap_or(0);
    (1..longest.min(text.len() + 1))
        .rev()
        .find(|&k| {
            let start = text.len() - k;
            text.is_char_boundary(start) && tags.clone().any(|t| t.starts_with(&text[start..]))
        })
        .unwrap_or(0)
}
